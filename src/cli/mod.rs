//! Command-line interface for assetpipe
//!
//! Every task is a subcommand of its own, next to the composed plans:
//! - `default` (or no subcommand): build all assets, serve and watch
//! - `build`: fresh distribution folder
//! - `list`: show available tasks
//! - `init`: project scaffolding

mod init;
mod serve;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use crate::config::{Config, CONFIG_FILE};
use crate::runner::{Plan, TaskContext, TaskKind};
use crate::utils::format_duration;

pub use init::InitCommand;
pub use serve::ServeArgs;

/// assetpipe - build the assets of a static site
#[derive(Parser, Debug)]
#[command(name = "assetpipe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to assetpipe.toml config file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build every asset, then serve the site and watch for changes
    #[command(alias = "dev")]
    Default(ServeArgs),

    /// Compile SCSS into a prefixed, minified stylesheet
    Styles,

    /// Concatenate and minify scripts
    Scripts,

    /// Convert images to AVIF/WebP and optimize originals
    Images,

    /// Stack SVG icons into a single sprite
    Sprite,

    /// Convert fonts to WOFF, TTF and WOFF2
    Fonts,

    /// Assemble HTML pages from includes
    Pages,

    /// Remove the distribution folder
    Clean,

    /// Copy built assets into the distribution folder
    Copy,

    /// Rerun tasks when sources change
    #[command(alias = "watching")]
    Watch,

    /// Serve the site folder with live reload
    #[command(alias = "browser-sync")]
    Serve(ServeArgs),

    /// Recreate the distribution folder from the built assets
    Build,

    /// List available tasks
    List,

    /// Initialize a new project
    Init(InitCommand),
}

impl Commands {
    /// Exported task or plan name this command runs
    fn plan_name(&self) -> Option<&'static str> {
        let kind = match self {
            Commands::Default(_) => return Some("default"),
            Commands::Build => return Some("build"),
            Commands::List | Commands::Init(_) => return None,
            Commands::Styles => TaskKind::Styles,
            Commands::Scripts => TaskKind::Scripts,
            Commands::Images => TaskKind::Images,
            Commands::Sprite => TaskKind::Sprite,
            Commands::Fonts => TaskKind::Fonts,
            Commands::Pages => TaskKind::Pages,
            Commands::Clean => TaskKind::Clean,
            Commands::Copy => TaskKind::Copy,
            Commands::Watch => TaskKind::Watch,
            Commands::Serve(_) => TaskKind::Serve,
        };
        Some(kind.name())
    }

    fn serve_args(&self) -> Option<&ServeArgs> {
        match self {
            Commands::Default(args) | Commands::Serve(args) => Some(args),
            _ => None,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        let default = Commands::Default(ServeArgs::default());
        let command = self.command.as_ref().unwrap_or(&default);

        match command {
            Commands::List => {
                print_tasks();
                Ok(())
            }
            Commands::Init(cmd) => cmd.execute().await,
            command => match command.plan_name() {
                Some(name) => {
                    let plan = Plan::from_name(name)?;
                    self.run_plan(plan, command.serve_args()).await
                }
                None => Ok(()),
            },
        }
    }

    async fn run_plan(&self, plan: Plan, serve: Option<&ServeArgs>) -> Result<()> {
        info!("Loading configuration from {}", self.config);
        let mut config = Config::load_or_default(&self.config)?;

        if let Some(args) = serve {
            args.apply(&mut config.server);
        }

        let ctx = TaskContext::new(Arc::new(config));
        let label = plan.label();
        let start = Instant::now();

        plan.run(&ctx).await?;

        eprintln!(
            "\n{} Finished {} in {}\n",
            "✓".green().bold(),
            label.cyan(),
            format_duration(start.elapsed())
        );

        Ok(())
    }
}

fn print_tasks() {
    eprintln!("{}", "Tasks:".bold());
    for kind in TaskKind::ALL {
        eprintln!("  {:<10} {}", kind.name().cyan(), kind.description().dimmed());
    }

    eprintln!("\n{}", "Plans:".bold());
    eprintln!(
        "  {:<10} {}",
        "default".cyan(),
        "styles, images, scripts, pages, sprite, fonts, serve and watch in parallel".dimmed()
    );
    eprintln!("  {:<10} {}", "build".cyan(), "clean, then copy".dimmed());
}

/// Print the assetpipe banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "assetpipe".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_default() {
        let cli = Cli::try_parse_from(["assetpipe"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, CONFIG_FILE);
    }

    #[test]
    fn test_aliases_resolve_to_tasks() {
        let cli = Cli::try_parse_from(["assetpipe", "browser-sync", "--port", "4000"]).unwrap();
        let Some(Commands::Serve(args)) = &cli.command else {
            panic!("expected serve, got {:?}", cli.command);
        };
        assert_eq!(args.port, Some(4000));

        let cli = Cli::try_parse_from(["assetpipe", "watching"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Watch)));
    }

    #[test]
    fn test_commands_map_to_plans() {
        let plan = |command: &Commands| command.plan_name().map(|name| Plan::from_name(name).unwrap());

        assert_eq!(plan(&Commands::Build), Some(Plan::build_plan()));

        let command = Commands::Default(ServeArgs::default());
        assert_eq!(plan(&command), Some(Plan::default_plan()));
        assert!(command.serve_args().is_some());

        assert_eq!(plan(&Commands::Fonts), Some(Plan::Task(TaskKind::Fonts)));
        assert!(Commands::Fonts.serve_args().is_none());
        assert!(plan(&Commands::List).is_none());
    }
}
