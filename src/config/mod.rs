//! Configuration handling for assetpipe
//!
//! Parses and manages assetpipe.toml configuration files. Every key is
//! optional; a project without a config file runs on the defaults.

mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use schema::*;

/// Name of the config file looked up by default
pub const CONFIG_FILE: &str = "assetpipe.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source and distribution folders
    #[serde(default)]
    pub paths: PathsConfig,

    /// Stylesheet compilation
    #[serde(default)]
    pub styles: StylesConfig,

    /// Script minification
    #[serde(default)]
    pub scripts: ScriptsConfig,

    /// Image conversion
    #[serde(default)]
    pub images: ImagesConfig,

    /// SVG sprite
    #[serde(default)]
    pub sprite: SpriteConfig,

    /// Font conversion
    #[serde(default)]
    pub fonts: FontsConfig,

    /// HTML page assembly
    #[serde(default)]
    pub pages: PagesConfig,

    /// Development server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// File watching
    #[serde(default)]
    pub watch: WatchConfig,

    /// Distribution build
    #[serde(default)]
    pub build: BuildConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let canonical_path = absolute(path.as_ref())?;

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", canonical_path.display()))?;

        config.root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        config.validate()?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults rooted next to `path`
    /// when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let canonical_path = absolute(path.as_ref())?;

        if canonical_path.exists() {
            return Self::load(&canonical_path);
        }

        debug!("No config at {}, using defaults", canonical_path.display());

        let root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self::with_root(root))
    }

    /// Default configuration rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Render this configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        let required = [
            ("paths.site", &self.paths.site),
            ("paths.dist", &self.paths.dist),
            ("styles.entry", &self.styles.entry),
            ("styles.output", &self.styles.output),
            ("scripts.output", &self.scripts.output),
            ("images.source", &self.images.source),
            ("images.output", &self.images.output),
            ("sprite.source", &self.sprite.source),
            ("sprite.output", &self.sprite.output),
            ("fonts.source", &self.fonts.source),
            ("fonts.output", &self.fonts.output),
            ("pages.source", &self.pages.source),
            ("pages.output", &self.pages.output),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("`{}` must not be empty", key);
            }
        }

        if self.scripts.entries.is_empty() {
            anyhow::bail!("`scripts.entries` must name at least one script");
        }

        if !(1..=100).contains(&self.images.avif_quality) {
            anyhow::bail!(
                "`images.avif_quality` must be between 1 and 100, got {}",
                self.images.avif_quality
            );
        }

        if !(1..=10).contains(&self.images.avif_speed) {
            anyhow::bail!(
                "`images.avif_speed` must be between 1 and 10, got {}",
                self.images.avif_speed
            );
        }

        if !(1..=100).contains(&self.images.jpeg_quality) {
            anyhow::bail!(
                "`images.jpeg_quality` must be between 1 and 100, got {}",
                self.images.jpeg_quality
            );
        }

        if self.server.port == 0 {
            anyhow::bail!("`server.port` must be nonzero");
        }

        if !self.build.files.iter().any(|f| !f.starts_with('!')) {
            anyhow::bail!("`build.files` must contain at least one include pattern");
        }

        Ok(())
    }

    /// Absolute site directory
    pub fn site_dir(&self) -> PathBuf {
        self.root.join(&self.paths.site)
    }

    /// Absolute distribution directory
    pub fn dist_dir(&self) -> PathBuf {
        self.root.join(&self.paths.dist)
    }

    /// Resolve a path relative to the site directory
    pub fn site_path(&self, relative: &str) -> PathBuf {
        match relative.trim_end_matches('/') {
            "" | "." => self.site_dir(),
            relative => self.site_dir().join(relative),
        }
    }

    pub fn styles_entry(&self) -> PathBuf {
        self.site_path(&self.styles.entry)
    }

    pub fn styles_output(&self) -> PathBuf {
        self.site_path(&self.styles.output)
    }

    pub fn script_entries(&self) -> Vec<PathBuf> {
        self.scripts
            .entries
            .iter()
            .map(|entry| self.site_path(entry))
            .collect()
    }

    pub fn scripts_output(&self) -> PathBuf {
        self.site_path(&self.scripts.output)
    }

    pub fn images_source(&self) -> PathBuf {
        self.site_path(&self.images.source)
    }

    pub fn images_output(&self) -> PathBuf {
        self.site_path(&self.images.output)
    }

    pub fn sprite_source(&self) -> PathBuf {
        self.site_path(&self.sprite.source)
    }

    pub fn sprite_output(&self) -> PathBuf {
        self.sprite_source().join(&self.sprite.output)
    }

    pub fn fonts_source(&self) -> PathBuf {
        self.site_path(&self.fonts.source)
    }

    pub fn fonts_output(&self) -> PathBuf {
        self.site_path(&self.fonts.output)
    }

    pub fn pages_source(&self) -> PathBuf {
        self.site_path(&self.pages.source)
    }

    pub fn pages_output(&self) -> PathBuf {
        self.site_path(&self.pages.output)
    }

    /// Include search path for page assembly, in lookup order
    pub fn include_paths(&self) -> Vec<PathBuf> {
        self.pages
            .include_paths
            .iter()
            .map(|p| self.site_path(p))
            .collect()
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
