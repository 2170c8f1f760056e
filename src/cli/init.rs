//! Project initialization command

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config::{Config, CONFIG_FILE};
use crate::utils::{relative_slash_path, write_file};

const STYLE_SCSS: &str = r#"$text: #213547;
$accent: #646cff;

body {
  margin: 0;
  font-family: Inter, system-ui, sans-serif;
  color: $text;

  a {
    color: $accent;
  }
}
"#;

const MAIN_JS: &str = r#"document.addEventListener('DOMContentLoaded', function () {
  document.documentElement.classList.add('js');
});
"#;

const HEADER_HTML: &str = r#"<header>
  <a href="/">Home</a>
</header>
"#;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>My Site</title>
    <link rel="stylesheet" href="css/style.min.css" />
  </head>
  <body>
    <!--= include header.html -->
    <script src="js/main.min.js"></script>
  </body>
</html>
"#;

/// Initialize a new project
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Project directory
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Overwrite an existing assetpipe.toml
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub async fn execute(&self) -> Result<()> {
        let project_dir = self.dir.as_path();
        let config_path = project_dir.join(CONFIG_FILE);

        if config_path.exists() && !self.force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                config_path.display()
            );
        }

        eprintln!("{} Initializing new project...\n", "→".blue());

        fs::create_dir_all(project_dir).context("Failed to create project directory")?;

        let config = Config::with_root(project_dir);
        let rendered = format!("# assetpipe configuration\n\n{}", config.to_toml()?);
        fs::write(&config_path, rendered)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        eprintln!("  {} Created {}", "✓".green(), CONFIG_FILE.cyan());

        scaffold(&config)?;

        eprintln!("\n{} Project initialized successfully!\n", "✓".green().bold());

        eprintln!("  Next steps:");
        if project_dir != Path::new(".") {
            eprintln!("    {} cd {}", "→".dimmed(), project_dir.display().to_string().cyan());
        }
        eprintln!("    {} assetpipe", "→".dimmed());
        eprintln!();

        Ok(())
    }
}

/// Create the source folders and starter files the default tasks read.
/// Existing files are left alone.
fn scaffold(config: &Config) -> Result<()> {
    let mut files = vec![
        (config.styles_entry(), STYLE_SCSS),
        (config.pages_source().join("index.html"), INDEX_HTML),
    ];
    if let Some(script) = config.script_entries().into_iter().next() {
        files.push((script, MAIN_JS));
    }
    if let Some(components) = config.include_paths().into_iter().next() {
        files.push((components.join("header.html"), HEADER_HTML));
    }

    for (path, contents) in files {
        if path.exists() {
            continue;
        }
        write_file(&path, contents)?;
        eprintln!("  {} Created {}", "✓".green(), display(config, &path).cyan());
    }

    for dir in [config.images_source(), config.fonts_source()] {
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        eprintln!("  {} Created {}/", "✓".green(), display(config, &dir).cyan());
    }

    Ok(())
}

fn display(config: &Config, path: &Path) -> String {
    relative_slash_path(&config.root, path).unwrap_or_else(|| path.display().to_string())
}
