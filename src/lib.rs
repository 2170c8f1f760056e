//! assetpipe library
//!
//! Asset tasks, their composition into plans, and the live-reload server.

pub mod cli;
pub mod config;
pub mod runner;
pub mod server;
pub mod tasks;
pub mod utils;

pub use cli::Cli;
pub use config::Config;
pub use runner::{Plan, Task, TaskContext, TaskKind};
