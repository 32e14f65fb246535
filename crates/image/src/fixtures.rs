//! Synthetic photos for tests and benchmarks.

use crate::exif::{gps_tiff_payload, splice_exif};
use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb, Rgba};
use sow_geo::Coordinate;
use std::io::Cursor;

/// A smooth gradient JPEG of `width`×`height` with no metadata.
pub fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    encode(DynamicImage::ImageRgb8(img), ImageOutputFormat::Jpeg(85))
}

/// [`gradient_jpeg`] carrying `coord` as EXIF GPS.
pub fn jpeg_with_gps(coord: Coordinate, width: u32, height: u32) -> Vec<u8> {
    splice_exif(&gradient_jpeg(width, height), &gps_tiff_payload(&coord))
}

/// A high-entropy JPEG at quality 95, hard to compress like a real
/// foliage shot.
pub fn noisy_photo(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x9E37_79B9;
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        // xorshift32
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [a, b, c, _] = state.to_le_bytes();
        Rgb([
            a / 2 + (x % 128) as u8,
            b / 2 + (y % 128) as u8,
            c / 2 + ((x + y) % 128) as u8,
        ])
    });
    encode(DynamicImage::ImageRgb8(img), ImageOutputFormat::Jpeg(95))
}

/// A PNG whose left half is fully transparent.
pub fn transparent_png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([34, 139, 34, 255])
        }
    });
    encode(DynamicImage::ImageRgba8(img), ImageOutputFormat::Png)
}

fn encode(img: DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format)
        .expect("encoding an in-memory fixture cannot fail");
    buffer.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{extract_gps, extract_metadata};

    #[test]
    fn test_fixture_roundtrips_gps() {
        let data = jpeg_with_gps(Coordinate::new(22.6273, 120.3014), 64, 48);
        let meta = extract_metadata(&data).unwrap();
        assert_eq!((meta.width, meta.height), (64, 48));

        let coord = extract_gps(&data).unwrap();
        assert!((coord.latitude - 22.6273).abs() < 1e-5);
    }
}
