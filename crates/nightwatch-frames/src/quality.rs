//! Frame quality scoring: blur detection via Laplacian variance, and
//! empty/single-color detection via grayscale standard deviation.

use image::{GenericImageView, GrayImage};

/// Laplacian-variance threshold below which a frame is considered too
/// blurry for AI analysis.
pub const BLUR_THRESHOLD: f64 = 100.0;

/// Grayscale standard-deviation threshold below which a frame is
/// considered empty or single-color.
pub const EMPTY_STD_THRESHOLD: f64 = 10.0;

const LAPLACIAN_KERNEL: [[i32; 3]; 3] = [[0, 1, 0], [1, -4, 1], [0, 1, 0]];

/// Applies a discrete 3x3 Laplacian kernel to a grayscale image and returns
/// the variance of the response — a standard sharpness proxy. Higher is
/// sharper.
#[must_use]
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut responses = Vec::with_capacity(((width - 2) * (height - 2)) as usize);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sum = 0i32;
            for (ky, row) in LAPLACIAN_KERNEL.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    if *weight == 0 {
                        continue;
                    }
                    let px = gray.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1).0[0];
                    sum += i32::from(px) * weight;
                }
            }
            responses.push(f64::from(sum));
        }
    }

    variance(&responses)
}

/// Standard deviation of pixel intensities in a grayscale image. Low values
/// indicate a blank, saturated or single-color frame.
#[must_use]
pub fn grayscale_std_dev(gray: &GrayImage) -> f64 {
    let values: Vec<f64> = gray.pixels().map(|p| f64::from(p.0[0])).collect();
    variance(&values).sqrt()
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Whether a decoded frame passes both quality checks: not too blurry, and
/// not empty/single-color.
#[must_use]
pub fn is_usable(gray: &GrayImage) -> bool {
    laplacian_variance(gray) >= BLUR_THRESHOLD && grayscale_std_dev(gray) >= EMPTY_STD_THRESHOLD
}

/// Quality score used to rank frames when none, or not enough, pass
/// [`is_usable`]. Uses the same Laplacian variance as the blur check so
/// "best available" ranking and "is this blurry" share one measurement.
#[must_use]
pub fn quality_score(gray: &GrayImage) -> f64 {
    laplacian_variance(gray)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn solid(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    fn checkerboard(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    #[test]
    fn solid_frame_has_zero_variance_and_is_unusable() {
        let img = solid(64, 64, 128);
        assert_eq!(laplacian_variance(&img), 0.0);
        assert_eq!(grayscale_std_dev(&img), 0.0);
        assert!(!is_usable(&img));
    }

    #[test]
    fn high_contrast_pattern_is_sharp_and_usable() {
        let img = checkerboard(64, 64);
        assert!(laplacian_variance(&img) > BLUR_THRESHOLD);
        assert!(grayscale_std_dev(&img) > EMPTY_STD_THRESHOLD);
        assert!(is_usable(&img));
    }

    #[test]
    fn sharper_image_scores_higher_than_blurrier_one() {
        let sharp = checkerboard(32, 32);
        let mostly_flat = solid(32, 32, 100);
        assert!(quality_score(&sharp) > quality_score(&mostly_flat));
    }
}
