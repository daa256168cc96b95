//! Structural-similarity based frame deduplication.
//!
//! Implements SSIM over grayscale frames downsampled to a fixed comparison
//! size. Local statistics are computed with a uniform windowed mean rather
//! than a literal Gaussian kernel — close enough to the reference measure
//! for a similarity threshold and considerably simpler to hand-roll without
//! a computer-vision dependency.

use image::{imageops::FilterType, GrayImage};

/// SSIM threshold above which two frames are considered near-duplicates.
pub const SIMILARITY_THRESHOLD: f64 = 0.95;

/// Side length frames are resized to before SSIM comparison.
pub const COMPARISON_DIM: u32 = 256;

const WINDOW: i64 = 5; // 11x11 window, matching the reference kernel size.

fn windowed_mean(values: &[f64], width: usize, height: usize, x: usize, y: usize) -> f64 {
    let mut sum = 0.0;
    let mut count = 0.0;
    for dy in -WINDOW..=WINDOW {
        let ny = y as i64 + dy;
        if ny < 0 || ny >= height as i64 {
            continue;
        }
        for dx in -WINDOW..=WINDOW {
            let nx = x as i64 + dx;
            if nx < 0 || nx >= width as i64 {
                continue;
            }
            sum += values[ny as usize * width + nx as usize];
            count += 1.0;
        }
    }
    sum / count
}

/// Computes SSIM between two grayscale images of equal dimensions.
/// Returns a value in `[0.0, 1.0]`, where `1.0` means identical.
#[must_use]
pub fn ssim(a: &GrayImage, b: &GrayImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let (width, height) = a.dimensions();
    let (width, height) = (width as usize, height as usize);

    let img1: Vec<f64> = a.pixels().map(|p| f64::from(p.0[0])).collect();
    let img2: Vec<f64> = b.pixels().map(|p| f64::from(p.0[0])).collect();

    const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
    const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

    let sq1: Vec<f64> = img1.iter().map(|v| v * v).collect();
    let sq2: Vec<f64> = img2.iter().map(|v| v * v).collect();
    let prod: Vec<f64> = img1.iter().zip(&img2).map(|(v1, v2)| v1 * v2).collect();

    let mut ssim_sum = 0.0;
    let mut samples = 0.0;

    for y in 0..height {
        for x in 0..width {
            let mu1 = windowed_mean(&img1, width, height, x, y);
            let mu2 = windowed_mean(&img2, width, height, x, y);

            let mu1_sq = mu1 * mu1;
            let mu2_sq = mu2 * mu2;
            let mu1_mu2 = mu1 * mu2;

            let sigma1_sq = windowed_mean(&sq1, width, height, x, y) - mu1_sq;
            let sigma2_sq = windowed_mean(&sq2, width, height, x, y) - mu2_sq;
            let sigma12 = windowed_mean(&prod, width, height, x, y) - mu1_mu2;

            let numerator = (2.0 * mu1_mu2 + C1) * (2.0 * sigma12 + C2);
            let denominator = (mu1_sq + mu2_sq + C1) * (sigma1_sq + sigma2_sq + C2);
            ssim_sum += numerator / denominator;
            samples += 1.0;
        }
    }

    (ssim_sum / samples).clamp(0.0, 1.0)
}

/// Resizes a grayscale frame to the standard comparison dimensions.
#[must_use]
pub fn prepare_for_comparison(gray: &GrayImage) -> GrayImage {
    image::imageops::resize(gray, COMPARISON_DIM, COMPARISON_DIM, FilterType::Triangle)
}

/// Whether two (already comparison-sized) frames are near-duplicates.
#[must_use]
pub fn is_similar(a: &GrayImage, b: &GrayImage, threshold: f64) -> bool {
    ssim(a, b) > threshold
}

/// Filters consecutive near-duplicate frames, always keeping the first.
/// `frames` must already be resized to [`COMPARISON_DIM`] (see
/// [`prepare_for_comparison`]); `indices` carries the original frame index
/// for each entry so the filtered output can be matched back to its source.
#[must_use]
pub fn filter_similar_frames(frames: &[GrayImage], indices: &[u32]) -> Vec<u32> {
    debug_assert_eq!(frames.len(), indices.len());
    if frames.is_empty() {
        return Vec::new();
    }

    let mut kept_indices = vec![indices[0]];
    let mut last_kept = &frames[0];

    for (frame, index) in frames.iter().zip(indices).skip(1) {
        if !is_similar(frame, last_kept, SIMILARITY_THRESHOLD) {
            kept_indices.push(*index);
            last_kept = frame;
        }
    }

    kept_indices
}
