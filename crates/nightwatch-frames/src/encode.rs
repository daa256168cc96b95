//! JPEG encoding for frames sent to AI providers and for stored thumbnails.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageEncoder};

use crate::error::{Error, Result};

/// JPEG quality used for frames sent to AI providers.
pub const FRAME_JPEG_QUALITY: u8 = 85;
/// Long-side cap for frames sent to AI providers.
pub const FRAME_MAX_DIMENSION: u32 = 1280;

/// JPEG quality used for stored event thumbnails.
pub const THUMBNAIL_JPEG_QUALITY: u8 = 70;
/// Width cap for stored event thumbnails.
pub const THUMBNAIL_MAX_WIDTH: u32 = 320;

fn resize_to_long_side(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let long_side = width.max(height);
    if long_side <= max_dimension {
        return img.clone();
    }
    let ratio = f64::from(max_dimension) / f64::from(long_side);
    let new_width = (f64::from(width) * ratio).round() as u32;
    let new_height = (f64::from(height) * ratio).round() as u32;
    img.resize(new_width.max(1), new_height.max(1), image::imageops::FilterType::Lanczos3)
}

fn resize_to_width(img: &DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_width {
        return img.clone();
    }
    let ratio = f64::from(max_width) / f64::from(width);
    let new_height = (f64::from(height) * ratio).round() as u32;
    img.resize(max_width, new_height.max(1), image::imageops::FilterType::Lanczos3)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| Error::Decode {
            index: 0,
            message: format!("JPEG encode failed: {e}"),
        })?;
    Ok(buffer)
}

/// Encodes a frame for AI analysis: resized so its long side is at most
/// [`FRAME_MAX_DIMENSION`], JPEG-encoded at [`FRAME_JPEG_QUALITY`].
pub fn encode_frame(img: &DynamicImage) -> Result<Vec<u8>> {
    let resized = resize_to_long_side(img, FRAME_MAX_DIMENSION);
    encode_jpeg(&resized, FRAME_JPEG_QUALITY)
}

/// Encodes a frame for thumbnail storage: resized to at most
/// [`THUMBNAIL_MAX_WIDTH`] wide, JPEG-encoded at [`THUMBNAIL_JPEG_QUALITY`].
pub fn encode_thumbnail(img: &DynamicImage) -> Result<Vec<u8>> {
    let resized = resize_to_width(img, THUMBNAIL_MAX_WIDTH);
    encode_jpeg(&resized, THUMBNAIL_JPEG_QUALITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn sample(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([100, 150, 200])))
    }

    #[test]
    fn frame_encoding_caps_long_side_and_produces_valid_jpeg() {
        let img = sample(2560, 1440);
        let jpeg = encode_frame(&img).unwrap();
        assert!(!jpeg.is_empty());
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), FRAME_MAX_DIMENSION);
        assert!(decoded.height() < 1440);
    }

    #[test]
    fn small_frame_is_not_upscaled() {
        let img = sample(640, 480);
        let jpeg = encode_frame(&img).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 640);
        assert_eq!(decoded.height(), 480);
    }

    #[test]
    fn thumbnail_encoding_caps_width() {
        let img = sample(1920, 1080);
        let jpeg = encode_thumbnail(&img).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), THUMBNAIL_MAX_WIDTH);
    }
}
