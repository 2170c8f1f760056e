//! Task composition
//!
//! Tasks are flat, named units of work. A [`Plan`] composes them with
//! series and parallel combinators:
//!
//! - `Series` runs children in order and stops at the first failure
//! - `Parallel` starts every child, waits for all of them, and fails with
//!   the names of the children that failed

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;
use futures_util::future::{join_all, BoxFuture};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::server::ReloadMessage;
use crate::tasks;
use crate::utils::{format_duration, format_size, relative_path};

/// Errors raised by the runner itself
#[derive(Debug, Error)]
pub enum TaskError {
    /// No task is registered under this name
    #[error("unknown task `{0}` (run `assetpipe list` to see available tasks)")]
    UnknownTask(String),

    /// One or more children of a parallel plan failed
    #[error("{} task(s) failed: {}", .0.len(), .0.join(", "))]
    Failed(Vec<String>),
}

/// Every runnable task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Styles,
    Scripts,
    Images,
    Sprite,
    Fonts,
    Pages,
    Clean,
    Copy,
    Watch,
    Serve,
}

impl TaskKind {
    /// All tasks in listing order
    pub const ALL: [TaskKind; 10] = [
        TaskKind::Styles,
        TaskKind::Scripts,
        TaskKind::Images,
        TaskKind::Sprite,
        TaskKind::Fonts,
        TaskKind::Pages,
        TaskKind::Clean,
        TaskKind::Copy,
        TaskKind::Watch,
        TaskKind::Serve,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TaskKind::Styles => "styles",
            TaskKind::Scripts => "scripts",
            TaskKind::Images => "images",
            TaskKind::Sprite => "sprite",
            TaskKind::Fonts => "fonts",
            TaskKind::Pages => "pages",
            TaskKind::Clean => "clean",
            TaskKind::Copy => "copy",
            TaskKind::Watch => "watch",
            TaskKind::Serve => "serve",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TaskKind::Styles => "Compile SCSS into a prefixed, minified stylesheet",
            TaskKind::Scripts => "Concatenate and minify scripts",
            TaskKind::Images => "Convert images to AVIF/WebP and optimize originals",
            TaskKind::Sprite => "Stack SVG icons into a single sprite",
            TaskKind::Fonts => "Convert fonts to WOFF, TTF and WOFF2",
            TaskKind::Pages => "Assemble HTML pages from includes",
            TaskKind::Clean => "Remove the distribution folder",
            TaskKind::Copy => "Copy built assets into the distribution folder",
            TaskKind::Watch => "Rerun tasks when sources change",
            TaskKind::Serve => "Serve the site folder with live reload",
        }
    }

    /// Long-running tasks never finish on their own
    pub fn is_long_running(self) -> bool {
        matches!(self, TaskKind::Watch | TaskKind::Serve)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskKind {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "styles" => TaskKind::Styles,
            "scripts" => TaskKind::Scripts,
            "images" => TaskKind::Images,
            "sprite" => TaskKind::Sprite,
            "fonts" => TaskKind::Fonts,
            "pages" => TaskKind::Pages,
            "clean" => TaskKind::Clean,
            "copy" => TaskKind::Copy,
            "watch" | "watching" => TaskKind::Watch,
            "serve" | "browser-sync" => TaskKind::Serve,
            other => return Err(TaskError::UnknownTask(other.to_string())),
        };
        Ok(kind)
    }
}

/// What a finished task produced
#[derive(Debug, Default)]
pub struct TaskReport {
    /// Files written by the task
    pub outputs: Vec<PathBuf>,

    /// Inputs skipped because their outputs were up to date
    pub skipped: usize,
}

impl TaskReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrote(&mut self, path: PathBuf) {
        self.outputs.push(path);
    }

    pub fn merge(&mut self, other: TaskReport) {
        self.outputs.extend(other.outputs);
        self.skipped += other.skipped;
    }
}

/// State shared by every task of a run
#[derive(Clone)]
pub struct TaskContext {
    /// Project configuration
    pub config: Arc<Config>,

    /// Live-reload broadcast channel
    reload_tx: broadcast::Sender<ReloadMessage>,
}

impl TaskContext {
    pub fn new(config: Arc<Config>) -> Self {
        let (reload_tx, _) = broadcast::channel::<ReloadMessage>(100);
        Self { config, reload_tx }
    }

    /// Tell connected browsers about a change.
    /// Nobody listening is not an error.
    pub fn notify(&self, message: ReloadMessage) {
        if self.reload_tx.send(message).is_err() {
            debug!("No live-reload clients connected");
        }
    }

    pub fn reload_sender(&self) -> broadcast::Sender<ReloadMessage> {
        self.reload_tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.reload_tx.subscribe()
    }

    /// Path relative to the project root, for display
    pub fn display_path(&self, path: &std::path::Path) -> String {
        relative_path(&self.config.root, path).unwrap_or_else(|| path.display().to_string())
    }
}

/// A runnable task
#[async_trait]
pub trait Task: Send + Sync {
    /// Which task this is
    fn kind(&self) -> TaskKind;

    /// Run the task once
    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport>;
}

/// A composition of tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Task(TaskKind),
    Series(Vec<Plan>),
    Parallel(Vec<Plan>),
}

impl Plan {
    /// Everything at once: build all assets, serve, and watch
    pub fn default_plan() -> Self {
        Plan::Parallel(
            [
                TaskKind::Styles,
                TaskKind::Images,
                TaskKind::Scripts,
                TaskKind::Pages,
                TaskKind::Sprite,
                TaskKind::Fonts,
                TaskKind::Serve,
                TaskKind::Watch,
            ]
            .into_iter()
            .map(Plan::Task)
            .collect(),
        )
    }

    /// Fresh distribution folder
    pub fn build_plan() -> Self {
        Plan::Series(vec![Plan::Task(TaskKind::Clean), Plan::Task(TaskKind::Copy)])
    }

    /// Resolve an exported name to a plan
    pub fn from_name(name: &str) -> Result<Self, TaskError> {
        match name {
            "default" | "dev" => Ok(Plan::default_plan()),
            "build" => Ok(Plan::build_plan()),
            other => other.parse().map(Plan::Task),
        }
    }

    /// Human-readable name for logs
    pub fn label(&self) -> String {
        match self {
            Plan::Task(kind) => kind.name().to_string(),
            Plan::Series(steps) => format!("series({})", join_labels(steps)),
            Plan::Parallel(steps) => format!("parallel({})", join_labels(steps)),
        }
    }

    /// Execute the plan
    pub fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match self {
                Plan::Task(kind) => run_task(tasks::task_for(*kind).as_ref(), ctx)
                    .await
                    .map(|_| ()),
                Plan::Series(steps) => {
                    for step in steps {
                        step.run(ctx).await?;
                    }
                    Ok(())
                }
                Plan::Parallel(steps) => {
                    let results = join_all(steps.iter().map(|step| step.run(ctx))).await;

                    let failed: Vec<String> = steps
                        .iter()
                        .zip(results)
                        .filter_map(|(step, result)| result.err().map(|_| step.label()))
                        .collect();

                    if failed.is_empty() {
                        Ok(())
                    } else {
                        Err(TaskError::Failed(failed).into())
                    }
                }
            }
        })
    }
}

fn join_labels(steps: &[Plan]) -> String {
    steps.iter().map(Plan::label).collect::<Vec<_>>().join(", ")
}

/// Run one task with start/finish logging
pub async fn run_task(task: &dyn Task, ctx: &TaskContext) -> Result<TaskReport> {
    let kind = task.kind();
    let start = Instant::now();

    info!("Starting '{}'...", kind);

    match task.run(ctx).await {
        Ok(report) => {
            let elapsed = format_duration(start.elapsed());

            if !kind.is_long_running() {
                eprintln!(
                    "  {} {} {} {}",
                    "✓".green(),
                    kind.name().cyan(),
                    format!("{} file(s)", report.outputs.len()).dimmed(),
                    elapsed.dimmed()
                );
            }

            for output in &report.outputs {
                let size = std::fs::metadata(output)
                    .map(|meta| format_size(meta.len() as usize))
                    .unwrap_or_default();
                debug!("  wrote {} {}", ctx.display_path(output), size);
            }

            if report.skipped > 0 {
                debug!("'{}' skipped {} up-to-date file(s)", kind, report.skipped);
            }

            info!("Finished '{}' after {}", kind, elapsed);
            Ok(report)
        }
        Err(e) => {
            error!("'{}' errored after {}: {:#}", kind, format_duration(start.elapsed()), e);
            eprintln!("  {} {} {:#}", "✗".red(), kind.name().red().bold(), e);
            Err(e)
        }
    }
}
