//! Motion scoring between consecutive frames.
//!
//! The reference behaviour measures optical-flow magnitude (Farneback) and
//! normalizes it to a 0-100 scale. Dense optical flow needs a computer-
//! vision dependency this workspace doesn't carry; the windowed absolute
//! grayscale difference used here is a standard flow-free motion proxy that
//! preserves the same normalization contract (`score = min(100, 10 * mean
//! magnitude)`) and ordering (more motion between frames -> higher score).

use image::{imageops::FilterType, GrayImage};

/// Multiplier applied to mean inter-frame difference to reach a 0-100 scale.
pub const MOTION_SCORE_MULTIPLIER: f64 = 10.0;

/// Side length frames are resized to before motion scoring.
pub const COMPARISON_DIM: u32 = 256;

/// Resizes a grayscale frame to the standard motion-comparison dimensions.
#[must_use]
pub fn prepare_for_comparison(gray: &GrayImage) -> GrayImage {
    image::imageops::resize(gray, COMPARISON_DIM, COMPARISON_DIM, FilterType::Triangle)
}

/// Motion score between two (already comparison-sized) consecutive frames,
/// clamped to `[0, 100]`.
#[must_use]
pub fn motion_score(prev: &GrayImage, curr: &GrayImage, resize_dim: u32) -> f64 {
    debug_assert_eq!(prev.dimensions(), (resize_dim, resize_dim));
    debug_assert_eq!(curr.dimensions(), (resize_dim, resize_dim));

    let mean_abs_diff = prev
        .pixels()
        .zip(curr.pixels())
        .map(|(a, b)| (f64::from(a.0[0]) - f64::from(b.0[0])).abs())
        .sum::<f64>()
        / f64::from(resize_dim) / f64::from(resize_dim);

    (mean_abs_diff * MOTION_SCORE_MULTIPLIER).min(100.0)
}

/// One frame's motion score in the context of its neighbors, kept in
/// chronological order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMotion {
    pub index: u32,
    pub score: f64,
}

/// Scores every frame in `frames` by motion relative to its neighbors.
/// Edge frames (first/last) are scored against their single neighbor;
/// interior frames average their scores against both neighbors.
#[must_use]
pub fn score_frames_by_motion(frames: &[GrayImage], indices: &[u32]) -> Vec<FrameMotion> {
    debug_assert_eq!(frames.len(), indices.len());
    if frames.is_empty() {
        return Vec::new();
    }
    if frames.len() == 1 {
        return vec![FrameMotion {
            index: indices[0],
            score: 0.0,
        }];
    }

    let mut scores = Vec::with_capacity(frames.len());
    for i in 0..frames.len() {
        let score = if i == 0 {
            motion_score(&frames[0], &frames[1], COMPARISON_DIM)
        } else if i == frames.len() - 1 {
            motion_score(&frames[i - 1], &frames[i], COMPARISON_DIM)
        } else {
            let prev_score = motion_score(&frames[i - 1], &frames[i], COMPARISON_DIM);
            let next_score = motion_score(&frames[i], &frames[i + 1], COMPARISON_DIM);
            (prev_score + next_score) / 2.0
        };
        scores.push(FrameMotion {
            index: indices[i],
            score,
        });
    }
    scores
}

/// Returns the `k` highest-scoring frames, restored to chronological
/// order.
#[must_use]
pub fn select_top_by_score(scores: &[FrameMotion], k: usize) -> Vec<FrameMotion> {
    let mut ranked = scores.to_vec();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(k);
    ranked.sort_by_key(|f| f.index);
    ranked
}
