//! Stylesheet compilation
//!
//! SCSS is compiled with grass, then lightningcss adds vendor prefixes for
//! the configured browser targets and minifies the result.

use std::path::Path;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use tracing::debug;

use super::blocking;
use crate::runner::{Task, TaskContext, TaskKind, TaskReport};
use crate::server::ReloadMessage;
use crate::utils::{relative_slash_path, write_file};

pub struct StylesTask;

#[async_trait]
impl Task for StylesTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Styles
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let config = &ctx.config;
        let entry = config.styles_entry();
        let output = config.styles_output();

        if !entry.is_file() {
            anyhow::bail!("Stylesheet entry not found: {}", entry.display());
        }

        let browsers = config.styles.browsers.clone();
        let minify = config.styles.minify;
        let css = blocking(move || compile_stylesheet(&entry, &browsers, minify)).await?;

        write_file(&output, &css)?;

        let mut report = TaskReport::new();
        report.wrote(output.clone());

        let path = relative_slash_path(&config.site_dir(), &output)
            .unwrap_or_else(|| output.display().to_string());
        ctx.notify(ReloadMessage::Css { path });

        Ok(report)
    }
}

/// Compile a SCSS entry into prefixed CSS
pub fn compile_stylesheet(entry: &Path, browsers: &[String], minify: bool) -> Result<String> {
    debug!("Compiling stylesheet: {}", entry.display());

    let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
    if let Some(dir) = entry.parent() {
        options = options.load_path(dir);
    }

    let css = grass::from_path(entry, &options)
        .map_err(|e| anyhow!("Failed to compile {}: {}", entry.display(), e))?;

    let filename = entry.display().to_string();
    let mut sheet = StyleSheet::parse(
        &css,
        ParserOptions {
            filename: filename.clone(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| anyhow!("Failed to parse compiled CSS from {}: {}", filename, e))?;

    let targets = Targets {
        browsers: resolve_browsers(browsers)?,
        ..Targets::default()
    };

    sheet
        .minify(MinifyOptions {
            targets: targets.clone(),
            ..MinifyOptions::default()
        })
        .map_err(|e| anyhow!("Failed to process {}: {}", filename, e))?;

    let result = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("Failed to print {}: {}", filename, e))?;

    Ok(result.code)
}

fn resolve_browsers(queries: &[String]) -> Result<Option<Browsers>> {
    if queries.is_empty() {
        return Ok(None);
    }

    Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| anyhow!("Invalid browser query {:?}: {}", queries, e))
}
