//! Configuration schema definitions

use serde::{Deserialize, Serialize};

/// Source and distribution folders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Site directory: sources live here and most outputs land here
    #[serde(default = "default_site_dir")]
    pub site: String,

    /// Distribution directory written by `build`
    #[serde(default = "default_dist_dir")]
    pub dist: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            site: default_site_dir(),
            dist: default_dist_dir(),
        }
    }
}

fn default_site_dir() -> String {
    "app".to_string()
}

fn default_dist_dir() -> String {
    "dist".to_string()
}

fn default_true() -> bool {
    true
}

/// Stylesheet compilation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// SCSS entry, relative to the site dir
    #[serde(default = "default_styles_entry")]
    pub entry: String,

    /// Compiled stylesheet, relative to the site dir
    #[serde(default = "default_styles_output")]
    pub output: String,

    /// Browserslist queries used for vendor prefixing
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,

    /// Minify the compiled stylesheet
    #[serde(default = "default_true")]
    pub minify: bool,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entry: default_styles_entry(),
            output: default_styles_output(),
            browsers: default_browsers(),
            minify: true,
        }
    }
}

fn default_styles_entry() -> String {
    "scss/style.scss".to_string()
}

fn default_styles_output() -> String {
    "css/style.min.css".to_string()
}

fn default_browsers() -> Vec<String> {
    vec!["last 10 versions".to_string()]
}

/// Script minification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Scripts concatenated in order, relative to the site dir
    #[serde(default = "default_script_entries")]
    pub entries: Vec<String>,

    /// Minified bundle, relative to the site dir
    #[serde(default = "default_script_output")]
    pub output: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            entries: default_script_entries(),
            output: default_script_output(),
        }
    }
}

fn default_script_entries() -> Vec<String> {
    vec!["js/main.js".to_string()]
}

fn default_script_output() -> String {
    "js/main.min.js".to_string()
}

/// Image conversion and optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Source images, relative to the site dir
    #[serde(default = "default_images_source")]
    pub source: String,

    /// Output folder, relative to the site dir
    #[serde(default = "default_images_output")]
    pub output: String,

    /// AVIF quality (1-100)
    #[serde(default = "default_avif_quality")]
    pub avif_quality: u8,

    /// AVIF encoder speed (1 slowest - 10 fastest)
    #[serde(default = "default_avif_speed")]
    pub avif_speed: u8,

    /// JPEG re-encode quality for optimized copies (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            source: default_images_source(),
            output: default_images_output(),
            avif_quality: default_avif_quality(),
            avif_speed: default_avif_speed(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_images_source() -> String {
    "images/src".to_string()
}

fn default_images_output() -> String {
    "images".to_string()
}

fn default_avif_quality() -> u8 {
    50
}

fn default_avif_speed() -> u8 {
    6
}

fn default_jpeg_quality() -> u8 {
    75
}

/// SVG sprite generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteConfig {
    /// Folder holding the icons, relative to the site dir
    #[serde(default = "default_images_output")]
    pub source: String,

    /// Sprite file name, written inside the source folder
    #[serde(default = "default_sprite_output")]
    pub output: String,

    /// Also write an HTML preview page under `stack/`
    #[serde(default = "default_true")]
    pub example: bool,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            source: default_images_output(),
            output: default_sprite_output(),
            example: true,
        }
    }
}

fn default_sprite_output() -> String {
    "sprite.svg".to_string()
}

/// Font conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontsConfig {
    /// Source fonts, relative to the site dir
    #[serde(default = "default_fonts_source")]
    pub source: String,

    /// Output folder, relative to the site dir
    #[serde(default = "default_fonts_output")]
    pub output: String,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            source: default_fonts_source(),
            output: default_fonts_output(),
        }
    }
}

fn default_fonts_source() -> String {
    "fonts/src".to_string()
}

fn default_fonts_output() -> String {
    "fonts".to_string()
}

/// HTML page assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagesConfig {
    /// Page templates, relative to the site dir
    #[serde(default = "default_pages_source")]
    pub source: String,

    /// Extra folders searched for includes, relative to the site dir
    #[serde(default = "default_include_paths")]
    pub include_paths: Vec<String>,

    /// Output folder, relative to the site dir
    #[serde(default = "default_pages_output")]
    pub output: String,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            source: default_pages_source(),
            include_paths: default_include_paths(),
            output: default_pages_output(),
        }
    }
}

fn default_pages_source() -> String {
    "pages".to_string()
}

fn default_include_paths() -> Vec<String> {
    vec!["components".to_string()]
}

fn default_pages_output() -> String {
    ".".to_string()
}

/// Development server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to run the server on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Open the browser on start
    #[serde(default = "default_true")]
    pub open: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open: true,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3000
}

/// File watching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce window for file events, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    100
}

/// Distribution build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Ordered glob manifest relative to the site dir.
    /// Entries starting with `!` exclude matches of the entries before them.
    #[serde(default = "default_build_files")]
    pub files: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            files: default_build_files(),
        }
    }
}

fn default_build_files() -> Vec<String> {
    [
        "css/style.min.css",
        "images/*.*",
        "!images/*.svg",
        "images/sprite.svg",
        "fonts/*.*",
        "js/main.min.js",
        "**/*.html",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
