//! Compression under a byte ceiling.
//!
//! The pipeline is: decode, flatten alpha, cap the longer edge, then encode
//! JPEG at decreasing quality. If the lowest quality is still too large the
//! image is shrunk by 20% and the quality ladder runs again.

use crate::exif::has_exif;
use crate::{detect_format, extract_metadata, fit_within, flatten_alpha, ImageError, ImageFormat, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat};
use std::io::Cursor;

/// Smallest longer edge the downscale loop will go to before giving up.
const MIN_EDGE: u32 = 64;
const DOWNSCALE_FACTOR: f64 = 0.8;

/// Options for [`compress_image`].
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Byte ceiling for the encoded output
    pub max_bytes: usize,
    /// Cap for the longer edge in pixels
    pub max_dimension: u32,
    /// First JPEG quality tried (1-100)
    pub initial_quality: u8,
    /// Lowest JPEG quality tried before downscaling
    pub min_quality: u8,
    /// Quality decrement between attempts
    pub quality_step: u8,
    /// Background used when flattening transparency
    pub background: [u8; 3],
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            max_bytes: 200 * 1024,
            max_dimension: 1200,
            initial_quality: 70,
            min_quality: 30,
            quality_step: 10,
            background: [255, 255, 255],
        }
    }
}

/// Result of a compression run.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    /// Encoded bytes
    pub data: Vec<u8>,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// JPEG quality used, `None` when the input was passed through untouched
    pub quality: Option<u8>,
    /// Size of the input in bytes
    pub original_bytes: usize,
    /// Output format
    pub format: ImageFormat,
}

impl CompressedImage {
    /// Fraction of the original size saved, in percent.
    pub fn savings_percent(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.data.len() as f64 / self.original_bytes as f64) * 100.0
    }

    /// Whether the input was returned unchanged.
    pub fn is_passthrough(&self) -> bool {
        self.quality.is_none()
    }
}

/// Compress a photo so it fits both `max_bytes` and `max_dimension`.
///
/// JPEG input that already satisfies both limits and has no EXIF block is
/// returned as-is. Every other decodable input is re-encoded as JPEG, which
/// drops EXIF (GPS included) from the stored photo.
pub fn compress_image(data: &[u8], options: &CompressOptions) -> Result<CompressedImage> {
    let format = detect_format(data)?;
    if !format.is_decodable() {
        return Err(ImageError::UnsupportedFormat(format));
    }

    if format == ImageFormat::Jpeg {
        if let Some(meta) = extract_metadata(data) {
            if meta.fits(options.max_dimension, options.max_bytes) && !has_exif(data) {
                tracing::debug!(bytes = data.len(), "Photo already within limits");
                return Ok(CompressedImage {
                    data: data.to_vec(),
                    width: meta.width,
                    height: meta.height,
                    quality: None,
                    original_bytes: data.len(),
                    format,
                });
            }
        }
    }

    let decoded = image::load_from_memory(data)?;
    let flat = flatten_alpha(&decoded, options.background);

    let (width, height) = fit_within(flat.width(), flat.height(), options.max_dimension);
    let mut current = if (width, height) != (flat.width(), flat.height()) {
        flat.resize_exact(width, height, FilterType::Lanczos3)
    } else {
        flat
    };

    let mut smallest = usize::MAX;

    loop {
        let mut quality = options.initial_quality.clamp(1, 100);
        let floor = options.min_quality.clamp(1, quality);

        loop {
            let encoded = encode_jpeg(&current, quality)?;
            tracing::trace!(
                quality,
                width = current.width(),
                height = current.height(),
                bytes = encoded.len(),
                "JPEG attempt"
            );

            if encoded.len() <= options.max_bytes {
                tracing::debug!(
                    original = data.len(),
                    compressed = encoded.len(),
                    quality,
                    "Compressed photo"
                );
                return Ok(CompressedImage {
                    data: encoded,
                    width: current.width(),
                    height: current.height(),
                    quality: Some(quality),
                    original_bytes: data.len(),
                    format: ImageFormat::Jpeg,
                });
            }

            smallest = smallest.min(encoded.len());
            if quality <= floor {
                break;
            }
            quality = quality.saturating_sub(options.quality_step.max(1)).max(floor);
        }

        let next_w = (current.width() as f64 * DOWNSCALE_FACTOR).round() as u32;
        let next_h = (current.height() as f64 * DOWNSCALE_FACTOR).round() as u32;
        if next_w.max(next_h) < MIN_EDGE || next_w == 0 || next_h == 0 {
            return Err(ImageError::SizeCeiling {
                max_bytes: options.max_bytes,
                smallest,
            });
        }
        current = current.resize_exact(next_w, next_h, FilterType::Lanczos3);
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageOutputFormat::Jpeg(quality))?;
    Ok(buffer.into_inner())
}
