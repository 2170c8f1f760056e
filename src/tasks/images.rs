//! Image conversion
//!
//! For every source image three outputs are produced next to each other:
//!
//! ```text
//! images/src/hero.png ──► images/hero.avif   (not for SVG)
//!                     ├─► images/hero.webp   (rasters only)
//!                     └─► images/hero.png    (optimized copy)
//! ```
//!
//! Outputs that are at least as new as their source are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use super::blocking;
use crate::runner::{Task, TaskContext, TaskKind, TaskReport};
use crate::utils::{extension, file_stem, is_stale, list_files, write_file};

pub struct ImagesTask;

#[async_trait]
impl Task for ImagesTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Images
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let sources = list_files(&ctx.config.images_source())?;
        let settings = EncodeSettings {
            output_dir: ctx.config.images_output(),
            avif_quality: ctx.config.images.avif_quality,
            avif_speed: ctx.config.images.avif_speed,
            jpeg_quality: ctx.config.images.jpeg_quality,
        };

        blocking(move || {
            let progress = ProgressBar::new(sources.len() as u64);
            progress.set_style(
                ProgressStyle::with_template("  {spinner} images [{bar:30}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            let mut report = TaskReport::new();
            for source in &sources {
                progress.set_message(file_stem(source));
                report.merge(settings.process(source)?);
                progress.inc(1);
            }

            progress.finish_and_clear();
            Ok(report)
        })
        .await
    }
}

/// Formats the image crate can decode
fn is_raster(ext: &str) -> bool {
    matches!(ext, "png" | "jpg" | "jpeg" | "gif" | "webp")
}

struct EncodeSettings {
    output_dir: PathBuf,
    avif_quality: u8,
    avif_speed: u8,
    jpeg_quality: u8,
}

impl EncodeSettings {
    /// Produce every stale output for one source
    fn process(&self, source: &Path) -> Result<TaskReport> {
        let ext = extension(source);
        let stem = file_stem(source);
        let file_name = source
            .file_name()
            .ok_or_else(|| anyhow!("Image path has no file name: {}", source.display()))?;

        let raster = is_raster(&ext);
        let avif = self.output_dir.join(format!("{}.avif", stem));
        let webp = self.output_dir.join(format!("{}.webp", stem));
        let copy = self.output_dir.join(file_name);

        let mut report = TaskReport::new();
        let mut decoded: Option<DynamicImage> = None;

        if raster && is_stale(source, &avif) {
            let image = decode(source, &mut decoded)?;
            write_file(&avif, self.encode_avif(image)?)?;
            report.wrote(avif);
        } else if raster {
            report.skipped += 1;
        }

        // A WebP source is its own WebP output; the optimized copy covers it.
        if raster && ext != "webp" {
            if is_stale(source, &webp) {
                let image = decode(source, &mut decoded)?;
                write_file(&webp, encode_webp(image)?)?;
                report.wrote(webp);
            } else {
                report.skipped += 1;
            }
        }

        if is_stale(source, &copy) {
            let original = fs::read(source)
                .with_context(|| format!("Failed to read image: {}", source.display()))?;
            let optimized = match ext.as_str() {
                "png" => optimize_png(&original, source)?,
                "jpg" | "jpeg" => {
                    let image = decode(source, &mut decoded)?;
                    smallest(original, self.encode_jpeg(image)?)
                }
                _ => original,
            };
            write_file(&copy, optimized)?;
            report.wrote(copy);
        } else {
            report.skipped += 1;
        }

        Ok(report)
    }

    fn encode_avif(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let encoder = AvifEncoder::new_with_speed_quality(&mut buf, self.avif_speed, self.avif_quality);
        DynamicImage::ImageRgba8(image.to_rgba8())
            .write_with_encoder(encoder)
            .context("Failed to encode AVIF")?;
        Ok(buf)
    }

    fn encode_jpeg(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality);
        DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(encoder)
            .context("Failed to encode JPEG")?;
        Ok(buf)
    }
}

/// Decode once, on first use
fn decode<'a>(source: &Path, slot: &'a mut Option<DynamicImage>) -> Result<&'a DynamicImage> {
    if slot.is_none() {
        debug!("Decoding {}", source.display());
        let image = image::open(source)
            .with_context(|| format!("Failed to decode image: {}", source.display()))?;
        *slot = Some(image);
    }

    slot.as_ref()
        .ok_or_else(|| anyhow!("Image not decoded: {}", source.display()))
}

fn encode_webp(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = WebPEncoder::new_lossless(&mut buf);
    DynamicImage::ImageRgba8(image.to_rgba8())
        .write_with_encoder(encoder)
        .context("Failed to encode WebP")?;
    Ok(buf)
}

fn optimize_png(data: &[u8], source: &Path) -> Result<Vec<u8>> {
    let optimized = oxipng::optimize_from_memory(data, &oxipng::Options::from_preset(2))
        .map_err(|e| anyhow!("Failed to optimize {}: {}", source.display(), e))?;

    Ok(smallest(data.to_vec(), optimized))
}

fn smallest(original: Vec<u8>, candidate: Vec<u8>) -> Vec<u8> {
    if candidate.len() < original.len() {
        candidate
    } else {
        original
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;

    fn site_with_sources(root: &Path) -> PathBuf {
        let src = root.join("app/images/src");
        fs::create_dir_all(&src).unwrap();

        RgbaImage::from_pixel(8, 8, Rgba([200, 30, 30, 255]))
            .save(src.join("hero.png"))
            .unwrap();
        fs::write(
            src.join("logo.svg"),
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 1 1"><rect width="1" height="1"/></svg>"#,
        )
        .unwrap();

        src
    }

    fn names(report: &TaskReport) -> Vec<String> {
        let mut names: Vec<String> = report
            .outputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_produces_avif_webp_and_copies() {
        let dir = tempfile::tempdir().unwrap();
        site_with_sources(dir.path());
        let ctx = TaskContext::new(Arc::new(Config::with_root(dir.path())));

        let report = ImagesTask.run(&ctx).await.unwrap();

        assert_eq!(
            names(&report),
            vec!["hero.avif", "hero.png", "hero.webp", "logo.svg"]
        );

        let images = dir.path().join("app/images");
        let webp = fs::read(images.join("hero.webp")).unwrap();
        assert_eq!(&webp[0..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
        assert!(image::open(images.join("hero.png")).is_ok());
        assert!(fs::read_to_string(images.join("logo.svg")).unwrap().contains("<rect"));
    }

    #[tokio::test]
    async fn test_up_to_date_outputs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        site_with_sources(dir.path());
        let ctx = TaskContext::new(Arc::new(Config::with_root(dir.path())));

        ImagesTask.run(&ctx).await.unwrap();
        let second = ImagesTask.run(&ctx).await.unwrap();

        assert!(second.outputs.is_empty());
        assert_eq!(second.skipped, 4);
    }

    #[tokio::test]
    async fn test_undecodable_raster_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("app/images/src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("broken.png"), b"not a png").unwrap();
        let ctx = TaskContext::new(Arc::new(Config::with_root(dir.path())));

        let err = ImagesTask.run(&ctx).await.unwrap_err();
        assert!(format!("{:#}", err).contains("broken.png"));
    }

    #[tokio::test]
    async fn test_missing_source_dir_is_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TaskContext::new(Arc::new(Config::with_root(dir.path())));

        let report = ImagesTask.run(&ctx).await.unwrap();
        assert!(report.outputs.is_empty());
    }

    #[test]
    fn test_smallest_prefers_original_on_tie() {
        assert_eq!(smallest(vec![1, 2], vec![3, 4]), vec![1, 2]);
        assert_eq!(smallest(vec![1, 2, 3], vec![4]), vec![4]);
    }
}
