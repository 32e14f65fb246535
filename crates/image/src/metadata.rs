//! Header-only image metadata.
//!
//! Dimensions are read straight from the container headers so a 12 MP phone
//! photo can be described without decoding it.

use crate::{detect_format, ImageFormat};
use serde::{Deserialize, Serialize};

/// Image metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
    /// File size in bytes
    pub size_bytes: usize,
}

impl ImageMetadata {
    /// Length of the longer edge in pixels.
    pub fn longest_edge(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Whether the image already satisfies both upload limits.
    pub fn fits(&self, max_dimension: u32, max_bytes: usize) -> bool {
        self.longest_edge() <= max_dimension && self.size_bytes <= max_bytes
    }
}

/// Extract metadata from image data.
///
/// Returns `None` for formats whose headers are not parsed here.
pub fn extract_metadata(data: &[u8]) -> Option<ImageMetadata> {
    let format = detect_format(data).ok()?;

    let (width, height) = match format {
        ImageFormat::Jpeg => extract_jpeg_dimensions(data)?,
        ImageFormat::Png => extract_png_dimensions(data)?,
        ImageFormat::Gif => extract_gif_dimensions(data)?,
        _ => return None,
    };

    Some(ImageMetadata {
        width,
        height,
        format,
        size_bytes: data.len(),
    })
}

/// Scale `(width, height)` so the longer edge is at most `max_edge`,
/// keeping the aspect ratio. Never upscales.
///
/// # Example
/// ```
/// use sow_image::fit_within;
///
/// assert_eq!(fit_within(4000, 3000, 1200), (1200, 900));
/// assert_eq!(fit_within(3000, 4000, 1200), (900, 1200));
/// assert_eq!(fit_within(800, 600, 1200), (800, 600));
/// ```
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if max_edge == 0 || longest <= max_edge {
        return (width, height);
    }

    let ratio = max_edge as f64 / longest as f64;
    let scale = |v: u32| ((v as f64 * ratio).round() as u32).clamp(1, max_edge);

    if width >= height {
        (max_edge, scale(height))
    } else {
        (scale(width), max_edge)
    }
}

fn extract_jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    // Skip SOI marker
    let mut i = 2;

    while i + 4 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }

        let marker = data[i + 1];

        // SOF markers contain dimensions
        if matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF) {
            if i + 9 < data.len() {
                let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
                let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
                return Some((width, height));
            }
        }

        if marker == 0xD8 || marker == 0xD9 || (0xD0..=0xD7).contains(&marker) {
            i += 2;
        } else if i + 3 < data.len() {
            let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
            i += 2 + length;
        } else {
            break;
        }
    }

    None
}

fn extract_png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    // 8-byte signature, then IHDR: length, "IHDR", width, height
    if data.len() < 24 || &data[12..16] != b"IHDR" {
        return None;
    }

    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);

    Some((width, height))
}

fn extract_gif_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 10 {
        return None;
    }

    let width = u16::from_le_bytes([data[6], data[7]]) as u32;
    let height = u16::from_le_bytes([data[8], data[9]]) as u32;

    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_within_landscape() {
        assert_eq!(fit_within(4032, 3024, 1200), (1200, 900));
    }

    #[test]
    fn test_fit_within_portrait() {
        assert_eq!(fit_within(3024, 4032, 1200), (900, 1200));
    }

    #[test]
    fn test_fit_within_never_upscales() {
        assert_eq!(fit_within(640, 480, 1200), (640, 480));
        assert_eq!(fit_within(1200, 1200, 1200), (1200, 1200));
    }

    #[test]
    fn test_fit_within_extreme_aspect() {
        let (w, h) = fit_within(10_000, 10, 1200);
        assert_eq!(w, 1200);
        assert_eq!(h, 1);
    }

    #[test]
    fn test_png_header_dimensions() {
        let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&1920u32.to_be_bytes());
        data.extend_from_slice(&1080u32.to_be_bytes());

        let meta = extract_metadata(&data).unwrap();
        assert_eq!((meta.width, meta.height), (1920, 1080));
        assert_eq!(meta.longest_edge(), 1920);
        assert!(!meta.fits(1200, 200 * 1024));
    }

    #[test]
    fn test_gif_header_dimensions() {
        let data = b"GIF89a\x20\x03\x58\x02";
        let meta = extract_metadata(data).unwrap();
        assert_eq!((meta.width, meta.height), (800, 600));
        assert!(meta.fits(1200, 200 * 1024));
    }
}
