//! Watch mode
//!
//! ```text
//! notify debouncer (thread) ──► mpsc ──► rules ──► spawn task / reload
//! ```
//!
//! A change that arrives while its task is running marks the task for one
//! more run instead of starting a second copy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use globset::GlobMatcher;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::config::Config;
use crate::runner::{run_task, Task, TaskContext, TaskKind, TaskReport};
use crate::server::ReloadMessage;
use crate::tasks::task_for;
use crate::utils::{glob_matcher, relative_slash_path};

/// What a matching change triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Run(TaskKind),
    Reload,
}

struct WatchRule {
    matcher: GlobMatcher,
    action: WatchAction,
}

/// Site-relative globs mapped to actions
pub struct WatchRules {
    rules: Vec<WatchRule>,
}

impl WatchRules {
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut patterns = Vec::new();

        let styles_dir = Path::new(&config.styles.entry)
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        patterns.push((under(&styles_dir, "**/*.scss"), WatchAction::Run(TaskKind::Styles)));

        patterns.push((under(&config.images.source, "**"), WatchAction::Run(TaskKind::Images)));

        for entry in &config.scripts.entries {
            patterns.push((entry.clone(), WatchAction::Run(TaskKind::Scripts)));
        }

        patterns.push((under(&config.pages.source, "**"), WatchAction::Run(TaskKind::Pages)));
        for include in &config.pages.include_paths {
            patterns.push((under(include, "**"), WatchAction::Run(TaskKind::Pages)));
        }

        patterns.push((under(&config.pages.output, "*.html"), WatchAction::Reload));

        let rules = patterns
            .into_iter()
            .map(|(pattern, action)| {
                Ok(WatchRule {
                    matcher: glob_matcher(&pattern)?,
                    action,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Actions for one site-relative path
    pub fn actions_for(&self, relative: &str) -> Vec<WatchAction> {
        let mut actions = Vec::new();
        for rule in &self.rules {
            if rule.matcher.is_match(relative) && !actions.contains(&rule.action) {
                actions.push(rule.action);
            }
        }
        actions
    }
}

fn under(dir: &str, pattern: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() || dir == "." {
        pattern.to_string()
    } else {
        format!("{}/{}", dir, pattern)
    }
}

/// Tasks currently running, each with a "run again" flag
#[derive(Default)]
struct InFlight {
    tasks: Mutex<HashMap<TaskKind, bool>>,
}

impl InFlight {
    /// Returns true when the caller should start the task
    fn try_start(&self, kind: TaskKind) -> bool {
        let mut tasks = self.tasks.lock();
        match tasks.get_mut(&kind) {
            Some(rerun) => {
                *rerun = true;
                false
            }
            None => {
                tasks.insert(kind, false);
                true
            }
        }
    }

    /// Returns true when the task must run once more
    fn finish(&self, kind: TaskKind) -> bool {
        let mut tasks = self.tasks.lock();
        match tasks.get_mut(&kind) {
            Some(rerun) if *rerun => {
                *rerun = false;
                true
            }
            _ => {
                tasks.remove(&kind);
                false
            }
        }
    }
}

pub struct WatchTask;

#[async_trait]
impl Task for WatchTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Watch
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let site = ctx.config.site_dir();
        let canonical_site = std::fs::canonicalize(&site).unwrap_or_else(|_| site.clone());
        let rules = WatchRules::from_config(&ctx.config)?;
        let in_flight = Arc::new(InFlight::default());

        let mut changes = spawn_watcher(&site, Duration::from_millis(ctx.config.watch.debounce_ms))?;

        eprintln!(
            "  {} Watching {}",
            "↻".yellow(),
            ctx.display_path(&site).cyan()
        );

        while let Some(paths) = changes.recv().await {
            let mut batch: Vec<(WatchAction, PathBuf)> = Vec::new();

            for path in paths {
                let Some(relative) = relative_slash_path(&site, &path)
                    .or_else(|| relative_slash_path(&canonical_site, &path))
                else {
                    continue;
                };

                for action in rules.actions_for(&relative) {
                    if !batch.iter().any(|(a, _)| *a == action) {
                        batch.push((action, path.clone()));
                    }
                }
            }

            for (action, path) in batch {
                eprintln!(
                    "  {} File changed: {}",
                    "↻".yellow(),
                    ctx.display_path(&path).dimmed()
                );

                match action {
                    WatchAction::Reload => ctx.notify(ReloadMessage::Reload {
                        reason: format!("{} changed", ctx.display_path(&path)),
                    }),
                    WatchAction::Run(kind) => {
                        if in_flight.try_start(kind) {
                            spawn_task(kind, ctx.clone(), in_flight.clone());
                        } else {
                            debug!("'{}' already running, queued one more run", kind);
                        }
                    }
                }
            }
        }

        Ok(TaskReport::new())
    }
}

/// Run a task until no further change was queued for it.
/// Failures are logged by the runner; watching continues.
fn spawn_task(kind: TaskKind, ctx: TaskContext, in_flight: Arc<InFlight>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let task = task_for(kind);
        loop {
            let _ = run_task(task.as_ref(), &ctx).await;
            if !in_flight.finish(kind) {
                break;
            }
        }
    })
}

/// Start a debounced recursive watcher on its own thread
fn spawn_watcher(root: &Path, debounce: Duration) -> Result<mpsc::UnboundedReceiver<Vec<PathBuf>>> {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(debounce, tx).context("Failed to create file watcher")?;

    debouncer
        .watcher()
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    let (changes_tx, changes_rx) = mpsc::unbounded_channel();

    // The debouncer is moved into the thread to keep it alive
    std::thread::spawn(move || {
        let _debouncer = debouncer;

        loop {
            match rx.recv() {
                Ok(Ok(events)) => {
                    let paths = events.into_iter().map(|event| event.path).collect();
                    if changes_tx.send(paths).is_err() {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    error!("Watch error: {:?}", e);
                }
                Err(_) => {
                    break;
                }
            }
        }
    });

    Ok(changes_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Instant;

    fn site_ctx(root: &Path) -> TaskContext {
        let scss = root.join("app/scss");
        fs::create_dir_all(&scss).unwrap();
        fs::write(scss.join("style.scss"), "$c: red; body { color: $c; }").unwrap();
        TaskContext::new(Arc::new(Config::with_root(root)))
    }

    fn rules() -> WatchRules {
        WatchRules::from_config(&Config::default()).unwrap()
    }

    #[test]
    fn test_sources_map_to_tasks() {
        let rules = rules();

        assert_eq!(rules.actions_for("scss/style.scss"), vec![WatchAction::Run(TaskKind::Styles)]);
        assert_eq!(rules.actions_for("scss/parts/_grid.scss"), vec![WatchAction::Run(TaskKind::Styles)]);
        assert_eq!(rules.actions_for("images/src/hero.png"), vec![WatchAction::Run(TaskKind::Images)]);
        assert_eq!(rules.actions_for("js/main.js"), vec![WatchAction::Run(TaskKind::Scripts)]);
        assert_eq!(rules.actions_for("pages/about.html"), vec![WatchAction::Run(TaskKind::Pages)]);
        assert_eq!(rules.actions_for("components/nav.html"), vec![WatchAction::Run(TaskKind::Pages)]);
        assert_eq!(rules.actions_for("index.html"), vec![WatchAction::Reload]);
    }

    #[test]
    fn test_outputs_do_not_retrigger() {
        let rules = rules();

        for output in ["css/style.min.css", "js/main.min.js", "images/hero.avif", "images/sprite.svg", "fonts/Inter.woff2"] {
            assert!(rules.actions_for(output).is_empty(), "{}", output);
        }
    }

    #[test]
    fn test_in_flight_coalesces_changes() {
        let in_flight = InFlight::default();

        assert!(in_flight.try_start(TaskKind::Styles));
        assert!(!in_flight.try_start(TaskKind::Styles));
        assert!(!in_flight.try_start(TaskKind::Styles));
        assert!(in_flight.try_start(TaskKind::Pages));

        // two queued changes collapse into one extra run
        assert!(in_flight.finish(TaskKind::Styles));
        assert!(!in_flight.finish(TaskKind::Styles));
        assert!(in_flight.try_start(TaskKind::Styles));
    }

    #[test]
    fn test_under_handles_site_root() {
        assert_eq!(under(".", "*.html"), "*.html");
        assert_eq!(under("pages/", "**"), "pages/**");
    }

    #[tokio::test]
    async fn test_queued_change_runs_task_once_more() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = site_ctx(dir.path());
        let mut messages = ctx.subscribe();
        let in_flight = Arc::new(InFlight::default());

        assert!(in_flight.try_start(TaskKind::Styles));
        assert!(!in_flight.try_start(TaskKind::Styles));
        assert!(!in_flight.try_start(TaskKind::Styles));

        spawn_task(TaskKind::Styles, ctx.clone(), in_flight.clone()).await.unwrap();

        let mut runs = 0;
        while let Ok(message) = messages.try_recv() {
            assert!(matches!(message, ReloadMessage::Css { .. }));
            runs += 1;
        }
        assert_eq!(runs, 2);
        assert!(in_flight.tasks.lock().is_empty());
        assert!(dir.path().join("app/css/style.min.css").is_file());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scss_change_rebuilds_stylesheet() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = site_ctx(dir.path());
        let output = dir.path().join("app/css/style.min.css");

        let watch_ctx = ctx.clone();
        let watcher = tokio::spawn(async move { WatchTask.run(&watch_ctx).await });
        tokio::time::sleep(Duration::from_millis(500)).await;

        fs::write(
            dir.path().join("app/scss/style.scss"),
            "$c: #123456; body { color: $c; }",
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let css = loop {
            if let Ok(css) = fs::read_to_string(&output) {
                if css.contains("#123456") {
                    break css;
                }
            }
            assert!(Instant::now() < deadline, "style.min.css was not rebuilt");
            tokio::time::sleep(Duration::from_millis(50)).await;
        };

        watcher.abort();
        assert!(!css.contains('\n'));
    }
}
