//! Asset tasks
//!
//! One module per task. Each task reads from the site directory, delegates
//! the actual transformation to a library, and writes its outputs back.

mod dist;
mod fonts;
mod images;
mod pages;
mod scripts;
mod sprite;
mod styles;
mod watch;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::runner::{Task, TaskContext, TaskKind, TaskReport};
use crate::server::DevServer;

pub use dist::{expand_manifest, CleanTask, CopyTask};
pub use fonts::{FontError, FontsTask, Outlines};
pub use images::ImagesTask;
pub use pages::{IncludeExpander, PagesTask};
pub use scripts::ScriptsTask;
pub use sprite::{build_sprite, SpriteTask};
pub use styles::{compile_stylesheet, StylesTask};
pub use watch::{WatchAction, WatchRules, WatchTask};

/// Look up the implementation of a task
pub fn task_for(kind: TaskKind) -> Arc<dyn Task> {
    match kind {
        TaskKind::Styles => Arc::new(StylesTask),
        TaskKind::Scripts => Arc::new(ScriptsTask),
        TaskKind::Images => Arc::new(ImagesTask),
        TaskKind::Sprite => Arc::new(SpriteTask),
        TaskKind::Fonts => Arc::new(FontsTask),
        TaskKind::Pages => Arc::new(PagesTask),
        TaskKind::Clean => Arc::new(CleanTask),
        TaskKind::Copy => Arc::new(CopyTask),
        TaskKind::Watch => Arc::new(WatchTask),
        TaskKind::Serve => Arc::new(ServeTask),
    }
}

/// Serve the site directory with live reload
pub struct ServeTask;

#[async_trait]
impl Task for ServeTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Serve
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        DevServer::new(ctx.clone()).start().await?;
        Ok(TaskReport::new())
    }
}

/// Run CPU-bound work on the blocking pool
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}
