//! Distribution folder: clean, then copy the built assets

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use crate::runner::{Task, TaskContext, TaskKind, TaskReport};
use crate::utils::{glob_matcher, is_glob, relative_slash_path};

/// Remove the distribution folder
pub struct CleanTask;

#[async_trait]
impl Task for CleanTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Clean
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let dist = ctx.config.dist_dir();

        fs::create_dir_all(&dist)
            .with_context(|| format!("Failed to create {}", dist.display()))?;
        fs::remove_dir_all(&dist)
            .with_context(|| format!("Failed to remove {}", dist.display()))?;

        Ok(TaskReport::new())
    }
}

/// Copy manifest files from the site folder into the distribution folder
pub struct CopyTask;

#[async_trait]
impl Task for CopyTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Copy
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let site = ctx.config.site_dir();
        let dist = ctx.config.dist_dir();
        let files = expand_manifest(&site, &ctx.config.build.files)?;

        let progress = ProgressBar::new(files.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("  {spinner} dist [{bar:30}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut report = TaskReport::new();
        for file in files {
            let relative = file.strip_prefix(&site).unwrap_or(&file);
            let target = dist.join(relative);

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::copy(&file, &target).with_context(|| {
                format!("Failed to copy {} to {}", file.display(), target.display())
            })?;

            report.wrote(target);
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok(report)
    }
}

/// Resolve an ordered include/exclude glob list against `base`.
///
/// Includes add matching files in walk order; `!` entries remove matches
/// selected so far, so a later include can bring a file back. A literal
/// (non-glob) include that matches nothing is an error.
pub fn expand_manifest(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut all = Vec::new();
    if base.is_dir() {
        for entry in WalkDir::new(base).min_depth(1).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", base.display()))?;
            if entry.file_type().is_file() {
                if let Some(rel) = relative_slash_path(base, entry.path()) {
                    all.push((rel, entry.into_path()));
                }
            }
        }
    }

    let mut selected: Vec<(String, PathBuf)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for pattern in patterns {
        if let Some(excluded) = pattern.strip_prefix('!') {
            let matcher = glob_matcher(excluded)?;
            selected.retain(|(rel, _)| !matcher.is_match(rel));
            seen.retain(|rel| !matcher.is_match(rel));
            continue;
        }

        let matcher = glob_matcher(pattern)?;
        let mut matched = false;

        for (rel, path) in &all {
            if matcher.is_match(rel) {
                matched = true;
                if seen.insert(rel.clone()) {
                    selected.push((rel.clone(), path.clone()));
                }
            }
        }

        if !matched && !is_glob(pattern) {
            anyhow::bail!("File not found: {} (in {})", pattern, base.display());
        }
    }

    Ok(selected.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, path.display().to_string()).unwrap();
    }

    fn relative(base: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| relative_slash_path(base, f).unwrap())
            .collect()
    }

    fn built_site(root: &Path) -> PathBuf {
        let app = root.join("app");
        for file in [
            "css/style.min.css",
            "js/main.js",
            "js/main.min.js",
            "images/hero.avif",
            "images/icon.svg",
            "images/sprite.svg",
            "images/src/hero.png",
            "fonts/Inter.woff2",
            "index.html",
            "pages/index.html",
            "scss/style.scss",
        ] {
            touch(&app.join(file));
        }
        app
    }

    #[test]
    fn test_default_manifest_selection() {
        let dir = tempfile::tempdir().unwrap();
        let app = built_site(dir.path());

        let files = expand_manifest(&app, &Config::default().build.files).unwrap();

        assert_eq!(
            relative(&app, &files),
            vec![
                "css/style.min.css",
                "images/hero.avif",
                "images/sprite.svg",
                "fonts/Inter.woff2",
                "js/main.min.js",
                "index.html",
                "pages/index.html",
            ]
        );
    }

    #[test]
    fn test_missing_literal_entry_fails() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        touch(&app.join("index.html"));

        let err = expand_manifest(&app, &["css/style.min.css".to_string()]).unwrap_err();
        assert!(err.to_string().contains("css/style.min.css"));

        assert!(expand_manifest(&app, &["fonts/*.*".to_string()]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_plan_replaces_dist() {
        let dir = tempfile::tempdir().unwrap();
        built_site(dir.path());
        touch(&dir.path().join("dist/stale.txt"));

        let ctx = TaskContext::new(Arc::new(Config::with_root(dir.path())));
        crate::runner::Plan::build_plan().run(&ctx).await.unwrap();

        let dist = dir.path().join("dist");
        assert!(!dist.join("stale.txt").exists());
        assert!(dist.join("css/style.min.css").is_file());
        assert!(dist.join("images/sprite.svg").is_file());
        assert!(!dist.join("images/icon.svg").exists());
        assert!(!dist.join("images/src").exists());
        assert!(!dist.join("js/main.js").exists());
    }

    #[tokio::test]
    async fn test_clean_without_dist_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TaskContext::new(Arc::new(Config::with_root(dir.path())));

        CleanTask.run(&ctx).await.unwrap();
        assert!(!dir.path().join("dist").exists());
    }
}
