//! HTML page assembly
//!
//! Pages pull in shared fragments with directive lines:
//!
//! ```text
//! <!--= include header.html -->     always inserted
//! <!--= require nav.html -->        inserted once per page
//! //= include partials/*.html       globs expand in sorted order
//! ```
//!
//! Targets resolve against the including file's folder first, then each
//! include path in order. Included content takes the directive's
//! indentation and is expanded recursively.

use std::collections::HashSet;
use std::fs;
use std::iter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, warn};

use crate::runner::{Task, TaskContext, TaskKind, TaskReport};
use crate::server::ReloadMessage;
use crate::utils::{extension, glob_files, is_glob, list_files, write_file};

static DIRECTIVE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*)(?://|/\*|#|<!--)\s*=\s*(include|require)\s+(.+?)\s*$").unwrap()
});

pub struct PagesTask;

#[async_trait]
impl Task for PagesTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Pages
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let config = &ctx.config;
        let expander = IncludeExpander::new(config.include_paths());
        let output_dir = config.pages_output();

        let mut report = TaskReport::new();
        let mut failed = Vec::new();

        for page in list_files(&config.pages_source())? {
            if !matches!(extension(&page).as_str(), "html" | "htm") {
                continue;
            }

            let Some(name) = page.file_name() else {
                continue;
            };
            let output = output_dir.join(name);

            match expander.expand_file(&page).and_then(|html| write_file(&output, html)) {
                Ok(()) => report.wrote(output),
                Err(e) => {
                    error!("Failed to assemble {}: {:#}", ctx.display_path(&page), e);
                    failed.push(name.to_string_lossy().to_string());
                }
            }
        }

        if !report.outputs.is_empty() {
            ctx.notify(ReloadMessage::Reload {
                reason: "pages rebuilt".to_string(),
            });
        }

        if !failed.is_empty() {
            anyhow::bail!("{} page(s) failed: {}", failed.len(), failed.join(", "));
        }

        Ok(report)
    }
}

/// Expands include directives
pub struct IncludeExpander {
    include_paths: Vec<PathBuf>,
}

/// Per-page bookkeeping
#[derive(Default)]
struct Expansion {
    /// Files currently being expanded, outermost first
    stack: Vec<PathBuf>,

    /// Files already inserted into this page
    inserted: HashSet<PathBuf>,
}

impl IncludeExpander {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self { include_paths }
    }

    /// Expand every directive in `path`
    pub fn expand_file(&self, path: &Path) -> Result<String> {
        self.expand(path, &mut Expansion::default())
    }

    fn expand(&self, path: &Path, state: &mut Expansion) -> Result<String> {
        let canonical = fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve {}", path.display()))?;

        if state.stack.contains(&canonical) {
            let chain: Vec<String> = state
                .stack
                .iter()
                .chain(iter::once(&canonical))
                .map(|p| p.display().to_string())
                .collect();
            anyhow::bail!("Include cycle: {}", chain.join(" -> "));
        }

        let source = fs::read_to_string(&canonical)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let base_dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();

        state.stack.push(canonical);
        let mut out = String::with_capacity(source.len());

        for line in source.split_inclusive('\n') {
            let content = line.trim_end_matches(['\n', '\r']);
            let newline = &line[content.len()..];

            let Some(cap) = DIRECTIVE_REGEX.captures(content) else {
                out.push_str(line);
                continue;
            };

            let indent = &cap[1];
            let require_once = &cap[2] == "require";
            let target = directive_target(&cap[3]);

            let files = self.resolve(target, &base_dir)?;
            if files.is_empty() {
                warn!("{}: include `{}` not found", path.display(), target);
                continue;
            }

            for file in files {
                let key = fs::canonicalize(&file)
                    .with_context(|| format!("Failed to resolve {}", file.display()))?;
                let first_time = state.inserted.insert(key);
                if require_once && !first_time {
                    continue;
                }

                let included = self.expand(&file, state)?;
                push_indented(&mut out, included.trim_end_matches(['\n', '\r']), indent);
                out.push_str(if newline.is_empty() { "\n" } else { newline });
            }
        }

        state.stack.pop();

        if !source.ends_with('\n') && out.ends_with('\n') {
            out.pop();
        }

        Ok(out)
    }

    /// Files a directive target refers to, in include order
    fn resolve(&self, target: &str, base_dir: &Path) -> Result<Vec<PathBuf>> {
        let search = iter::once(base_dir).chain(self.include_paths.iter().map(PathBuf::as_path));

        for dir in search {
            let matches = if is_glob(target) {
                glob_files(dir, target)?
            } else {
                let candidate = dir.join(target);
                if candidate.is_file() {
                    vec![candidate]
                } else {
                    Vec::new()
                }
            };

            if !matches.is_empty() {
                return Ok(matches);
            }
        }

        Ok(Vec::new())
    }
}

/// Strip comment terminators and quotes around a directive target
fn directive_target(raw: &str) -> &str {
    let trimmed = raw
        .trim()
        .trim_end_matches("-->")
        .trim_end_matches("*/")
        .trim();

    trimmed.trim_matches(|c| c == '"' || c == '\'')
}

fn push_indented(out: &mut String, content: &str, indent: &str) {
    for (i, line) in content.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if !line.is_empty() {
            out.push_str(indent);
        }
        out.push_str(line);
    }
}
