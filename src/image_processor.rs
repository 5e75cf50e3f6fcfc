//! # Image Thumbnail Module
//!
//! Produces the proxy of an image record with the `image` crate.
//!
//! ## Pipeline:
//! 1. Decode the original (format guessed from the content)
//! 2. Fit it inside the configured bounding box keeping the aspect ratio;
//!    images already inside the box are never upscaled
//! 3. Re-encode to the container of the proxy path:
//!    - **JPEG**: configured quality (default 75)
//!    - **PNG**: best compression with adaptive filtering when `optimize_images`
//!    - anything else: the format's default encoder
//! 4. Write to a temporary file next to the proxy and rename it into place
//!
//! Decoding is CPU bound, so `render` moves the work onto the blocking pool.

use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use crate::utils::archive_temp_file;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat, ImageOutputFormat};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Largest size inside `max_width` x `max_height` with the same aspect ratio
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, max_width);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, max_height);
    (new_width, new_height)
}

struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Handles image thumbnails
#[derive(Debug, Clone)]
pub struct ImageThumbnailer {
    max_width: u32,
    max_height: u32,
    jpeg_quality: u8,
    optimize: bool,
}

impl ImageThumbnailer {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            max_width: config.image_max_width,
            max_height: config.image_max_height,
            jpeg_quality: config.jpeg_quality,
            optimize: config.optimize_images,
        }
    }

    /// Write the thumbnail of `source` to `proxy` without blocking the runtime
    pub async fn render(&self, source: &Path, proxy: &Path) -> Result<PathBuf, ArchiveError> {
        let thumbnailer = self.clone();
        let source = source.to_path_buf();
        let proxy = proxy.to_path_buf();

        // The blocking thread cannot be stopped; if this future is dropped
        // (timeout, cancellation) it must at least not publish the proxy.
        let abandoned = Arc::new(AtomicBool::new(false));
        let _guard = AbandonOnDrop(abandoned.clone());

        tokio::task::spawn_blocking(move || {
            thumbnailer.render_inner(&source, &proxy, Some(&abandoned))?;
            Ok::<_, ArchiveError>(proxy)
        })
        .await
        .map_err(|e| ArchiveError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }

    /// Decode, resize and encode; returns the proxy dimensions
    fn render_inner(
        &self,
        source: &Path,
        proxy: &Path,
        abandoned: Option<&AtomicBool>,
    ) -> Result<(u32, u32), ArchiveError> {
        let img = ImageReader::open(source)?.with_guessed_format()?.decode()?;

        let (width, height) = (img.width(), img.height());
        let (new_width, new_height) = fit_within(width, height, self.max_width, self.max_height);
        debug!(
            "Resizing {}: {}x{} -> {}x{}",
            source.display(),
            width,
            height,
            new_width,
            new_height
        );

        let thumbnail = if (new_width, new_height) == (width, height) {
            img
        } else {
            img.resize_exact(new_width, new_height, FilterType::Lanczos3)
        };

        let format = ImageFormat::from_path(proxy)?;
        let dir = proxy
            .parent()
            .ok_or_else(|| ArchiveError::InvalidPath(proxy.to_path_buf()))?;

        let mut temp = archive_temp_file(dir, "")?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            self.encode(&thumbnail, format, &mut writer)?;
            writer.flush()?;
        }
        if abandoned.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            return Err(ArchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "thumbnail abandoned",
            )));
        }
        temp.persist(proxy).map_err(|e| ArchiveError::Io(e.error))?;

        Ok((new_width, new_height))
    }

    fn encode<W: Write + std::io::Seek>(
        &self,
        img: &DynamicImage,
        format: ImageFormat,
        writer: &mut W,
    ) -> Result<(), ArchiveError> {
        match format {
            ImageFormat::Jpeg => {
                let rgb = img.to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(writer, self.jpeg_quality);
                encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
            }
            ImageFormat::Png => {
                let (compression, filter) = if self.optimize {
                    (CompressionType::Best, PngFilter::Adaptive)
                } else {
                    (CompressionType::Default, PngFilter::Sub)
                };
                let img = match img.color() {
                    ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => img.clone(),
                    _ => DynamicImage::ImageRgba8(img.to_rgba8()),
                };
                PngEncoder::new_with_quality(writer, compression, filter).write_image(
                    img.as_bytes(),
                    img.width(),
                    img.height(),
                    img.color(),
                )?;
            }
            other => {
                img.write_to(writer, ImageOutputFormat::from(other))?;
            }
        }
        Ok(())
    }
}
