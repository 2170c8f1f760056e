//! Font conversion
//!
//! ```text
//! fonts/src/*.{ttf,otf,woff} ──► fonts/<stem>.woff
//!                            └─► fonts/<stem>.ttf    (TrueType outlines only)
//! fonts/*.ttf ──────────────────► fonts/<stem>.woff2
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;
use woff::{version1, version2};

use super::blocking;
use crate::runner::{Task, TaskContext, TaskKind, TaskReport};
use crate::utils::{extension, file_stem, list_files, write_file};

const FLAVOR_TRUETYPE: u32 = 0x0001_0000;
const FLAVOR_APPLE: u32 = u32::from_be_bytes(*b"true");
const FLAVOR_CFF: u32 = u32::from_be_bytes(*b"OTTO");

/// Highest Brotli quality, as the woff2 reference encoder uses.
const WOFF2_QUALITY: usize = 11;

/// Malformed or unsupported font data
#[derive(Debug, Error)]
pub enum FontError {
    #[error("unrecognized font signature {0:#010x}")]
    BadSignature(u32),

    #[error("font data truncated: {0} bytes")]
    Truncated(usize),

    #[error("failed to encode {format}")]
    Encode { format: &'static str },

    #[error("failed to decode WOFF data")]
    Decode,
}

/// Outline format of an SFNT font, read from its first four bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outlines {
    TrueType,
    Cff,
}

impl Outlines {
    pub fn detect(sfnt: &[u8]) -> Result<Self, FontError> {
        let flavor = sfnt
            .get(0..4)
            .map(|bytes| u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .ok_or(FontError::Truncated(sfnt.len()))?;

        match flavor {
            FLAVOR_TRUETYPE | FLAVOR_APPLE => Ok(Self::TrueType),
            FLAVOR_CFF => Ok(Self::Cff),
            other => Err(FontError::BadSignature(other)),
        }
    }
}

pub struct FontsTask;

#[async_trait]
impl Task for FontsTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Fonts
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let source_dir = ctx.config.fonts_source();
        let output_dir = ctx.config.fonts_output();

        blocking(move || {
            let mut report = TaskReport::new();

            for source in list_files(&source_dir)? {
                report.merge(convert_source(&source, &output_dir)?);
            }

            for ttf in list_files(&output_dir)? {
                if extension(&ttf) != "ttf" {
                    continue;
                }

                let sfnt = load_font(&ttf)?;
                let output = output_dir.join(format!("{}.woff2", file_stem(&ttf)));
                let bytes = encode_woff2(&sfnt)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                write_file(&output, bytes)?;
                report.wrote(output);
            }

            Ok(report)
        })
        .await
    }
}

/// Read a `.ttf`, `.otf` or `.woff` file as raw SFNT data
fn load_font(path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path).with_context(|| format!("Failed to read font: {}", path.display()))?;

    let sfnt = match extension(path).as_str() {
        "woff" => version1::decompress(&data).ok_or(FontError::Decode),
        _ => Ok(data),
    };

    sfnt.with_context(|| format!("Failed to parse font: {}", path.display()))
}

fn encode_woff(sfnt: &[u8]) -> Result<Vec<u8>, FontError> {
    version1::compress(sfnt, 1, 0).ok_or(FontError::Encode { format: "WOFF" })
}

fn encode_woff2(sfnt: &[u8]) -> Result<Vec<u8>, FontError> {
    // The glyf transform rejects some outlines; those get plain tables.
    version2::compress(sfnt, String::new(), WOFF2_QUALITY, true)
        .or_else(|| version2::compress(sfnt, String::new(), WOFF2_QUALITY, false))
        .ok_or(FontError::Encode { format: "WOFF2" })
}

/// First stage: one source font into WOFF (and TTF when possible)
fn convert_source(source: &Path, output_dir: &Path) -> Result<TaskReport> {
    let mut report = TaskReport::new();

    if !matches!(extension(source).as_str(), "ttf" | "otf" | "woff") {
        warn!("Skipping unsupported font file: {}", source.display());
        return Ok(report);
    }

    let sfnt = load_font(source)?;
    let outlines =
        Outlines::detect(&sfnt).with_context(|| format!("Failed to parse font: {}", source.display()))?;
    let stem = file_stem(source);

    let woff_path = output_dir.join(format!("{}.woff", stem));
    let bytes = encode_woff(&sfnt).with_context(|| format!("Failed to write {}", woff_path.display()))?;
    write_file(&woff_path, bytes)?;
    report.wrote(woff_path);

    match outlines {
        Outlines::TrueType => {
            let ttf_path = output_dir.join(format!("{}.ttf", stem));
            write_file(&ttf_path, &sfnt)?;
            report.wrote(ttf_path);
        }
        Outlines::Cff => warn!("{} has CFF outlines; no TTF written", source.display()),
    }

    Ok(report)
}
