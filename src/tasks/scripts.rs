//! Script bundling: concatenate the entries in order, then minify

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::blocking;
use crate::runner::{Task, TaskContext, TaskKind, TaskReport};
use crate::server::ReloadMessage;
use crate::utils::write_file;

pub struct ScriptsTask;

#[async_trait]
impl Task for ScriptsTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Scripts
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let entries = ctx.config.script_entries();
        let output = ctx.config.scripts_output();

        let source = concat_scripts(&entries)?;
        let minified = blocking(move || Ok(minify_script(&source))).await?;

        write_file(&output, &minified)?;

        let mut report = TaskReport::new();
        report.wrote(output.clone());

        ctx.notify(ReloadMessage::Reload {
            reason: format!("{} rebuilt", ctx.display_path(&output)),
        });

        Ok(report)
    }
}

/// Join scripts with a newline between them
fn concat_scripts(entries: &[PathBuf]) -> Result<String> {
    let mut bundle = String::new();

    for (i, entry) in entries.iter().enumerate() {
        let source = fs::read_to_string(entry)
            .with_context(|| format!("Failed to read script: {}", entry.display()))?;

        if i > 0 {
            bundle.push('\n');
        }
        bundle.push_str(&source);
    }

    Ok(bundle)
}

/// Strip comments and whitespace. Tokens are emitted unchanged, so the
/// script keeps its exact behaviour.
fn minify_script(source: &str) -> String {
    minifier::js::minify(source).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use boa_engine::{Context, Source};
    use std::sync::Arc;

    #[test]
    fn test_concat_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.js");
        let b = dir.path().join("b.js");
        fs::write(&a, "var a = 1;").unwrap();
        fs::write(&b, "var b = 2;").unwrap();

        assert_eq!(concat_scripts(&[a, b]).unwrap(), "var a = 1;\nvar b = 2;");
    }

    fn eval(source: &str) -> f64 {
        let mut context = Context::default();
        context
            .eval(Source::from_bytes(source))
            .unwrap()
            .as_number()
            .unwrap()
    }

    #[test]
    fn test_minify_shrinks_source() {
        let source = "function add(first, second) {\n  // sum\n  return first + second;\n}\n\nconsole.log(add(1, 2));\n";
        let minified = minify_script(source);

        assert!(minified.len() < source.len());
        assert!(minified.contains("console.log"));
        assert!(!minified.contains("// sum"));
    }

    #[test]
    fn test_minified_script_behaves_the_same() {
        let source = r#"
// constructors must stay constructible
function Point(x) {
  this.x = x;
}

/* arguments is only bound in real functions */
function count() {
  return arguments.length;
}

class Counter {
  constructor(n) {
    this._n = n;
  }

  get value() {
    return this._n;
  }
}

var label = "a  b";
new Point(4).x + count(1, 2) * 10 + new Counter(3).value * 100 + label.length * 1000;
"#;
        let minified = minify_script(source);

        assert!(minified.len() < source.len());
        assert!(minified.contains("function Point"));
        assert!(minified.contains("get value"));
        assert_eq!(eval(source), 4324.0);
        assert_eq!(eval(&minified), 4324.0);
    }

    #[tokio::test]
    async fn test_task_writes_min_js() {
        let dir = tempfile::tempdir().unwrap();
        let js = dir.path().join("app/js");
        fs::create_dir_all(&js).unwrap();
        fs::write(js.join("main.js"), "const greeting = 'hi';\nconsole.log(greeting);\n").unwrap();

        let ctx = TaskContext::new(Arc::new(Config::with_root(dir.path())));
        let mut rx = ctx.subscribe();
        let report = ScriptsTask.run(&ctx).await.unwrap();

        assert_eq!(report.outputs, vec![js.join("main.min.js")]);
        assert!(js.join("main.min.js").is_file());
        assert!(matches!(rx.try_recv(), Ok(ReloadMessage::Reload { .. })));
    }

    #[tokio::test]
    async fn test_missing_entry_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TaskContext::new(Arc::new(Config::with_root(dir.path())));

        let err = ScriptsTask.run(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("main.js"));
    }
}
