//! Alpha flattening before JPEG encoding.

use image::{DynamicImage, ImageBuffer, Rgb, Rgba};

/// Whether the decoded image carries an alpha channel.
pub fn has_alpha_channel(img: &DynamicImage) -> bool {
    img.color().has_alpha()
}

/// Composite `img` over a solid background and drop the alpha channel.
///
/// JPEG has no transparency, so transparent PNG/WebP/GIF uploads are flattened
/// onto `background` instead of rendering as black.
pub fn flatten_alpha(img: &DynamicImage, background: [u8; 3]) -> DynamicImage {
    if !has_alpha_channel(img) {
        return DynamicImage::ImageRgb8(img.to_rgb8());
    }

    let rgba = img.to_rgba8();
    let mut output = ImageBuffer::new(rgba.width(), rgba.height());

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;

        let alpha = a as f32 / 255.0;
        let blend = |channel: u8, bg: u8| {
            (channel as f32 * alpha + bg as f32 * (1.0 - alpha)).round() as u8
        };

        output.put_pixel(
            x,
            y,
            Rgb([blend(r, background[0]), blend(g, background[1]), blend(b, background[2])]),
        );
    }

    DynamicImage::ImageRgb8(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparent_pixel_takes_background() {
        let mut rgba = ImageBuffer::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0u8, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([10u8, 20, 30, 255]));
        let img = DynamicImage::ImageRgba8(rgba);
        assert!(has_alpha_channel(&img));

        let flat = flatten_alpha(&img, [255, 255, 255]);
        assert!(!has_alpha_channel(&flat));

        let rgb = flat.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_half_transparent_blends() {
        let mut rgba = ImageBuffer::new(1, 1);
        rgba.put_pixel(0, 0, Rgba([0u8, 0, 0, 128]));
        let flat = flatten_alpha(&DynamicImage::ImageRgba8(rgba), [255, 255, 255]);

        let Rgb([r, _, _]) = *flat.to_rgb8().get_pixel(0, 0);
        assert!((125..=129).contains(&r), "got {r}");
    }

    #[test]
    fn test_opaque_image_passes_through() {
        let rgb = ImageBuffer::from_pixel(3, 3, Rgb([1u8, 2, 3]));
        let flat = flatten_alpha(&DynamicImage::ImageRgb8(rgb), [255, 255, 255]);
        assert_eq!(flat.to_rgb8().get_pixel(2, 2), &Rgb([1, 2, 3]));
    }
}
