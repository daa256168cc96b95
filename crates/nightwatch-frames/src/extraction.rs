//! Orchestrates the end-to-end extraction pipeline for one clip: probe,
//! extract candidate frames, apply quality filtering and the replacement
//! policy, then encode the survivors as JPEG.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::encode::encode_frame;
use crate::error::{Error, Result};
use crate::ffmpeg::{probe_clip, extract_frame_at};
use crate::quality::{is_usable, quality_score};
use crate::selection::{apply_replacement_policy, clamp_frame_count, evenly_spaced_indices, ScoredFrame};

/// One frame ready to hand to a vision provider, alongside its offset into
/// the source clip.
#[derive(Debug, Clone)]
pub struct ExtractedFrame {
    pub jpeg: Vec<u8>,
    pub timestamp_ms: u64,
}

/// Extracts and quality-filters `frame_count` frames (clamped into
/// `[MIN_FRAME_COUNT, MAX_FRAME_COUNT]`) from `clip_path`, ready for
/// multi-frame AI analysis.
///
/// Never fails the caller's pipeline on a single unusable frame — only on
/// clips that can't be probed or that produce no usable candidates at all.
pub async fn extract_frames(clip_path: &Path, frame_count: u32, filter_blur: bool) -> Result<Vec<ExtractedFrame>> {
    extract_frames_at_offset(clip_path, frame_count, filter_blur, 0).await
}

/// Shifts every sampled index forward by `round(offset_ms * fps / 1000)`
/// frames. An offset past the end of the clip falls back to zero with a
/// warning rather than failing.
fn apply_offset(indices: Vec<u32>, shift: u32, total_frames: u32) -> Vec<u32> {
    if shift == 0 {
        return indices;
    }
    if shift >= total_frames {
        warn!(shift, total_frames, "extraction offset beyond clip length, using offset 0");
        return indices;
    }
    let mut shifted: Vec<u32> = indices
        .into_iter()
        .map(|i| (i + shift).min(total_frames - 1))
        .collect();
    shifted.dedup();
    shifted
}

/// [`extract_frames`] with a millisecond start offset into the clip.
pub async fn extract_frames_at_offset(
    clip_path: &Path,
    frame_count: u32,
    filter_blur: bool,
    offset_ms: u64,
) -> Result<Vec<ExtractedFrame>> {
    let frame_count = clamp_frame_count(frame_count);
    let info = probe_clip(clip_path).await?;
    if info.total_frames == 0 {
        return Err(Error::Empty(clip_path.to_string_lossy().to_string()));
    }

    let fps = if info.duration_secs > 0.0 {
        f64::from(info.total_frames) / info.duration_secs
    } else {
        30.0
    };

    let shift = (offset_ms as f64 * fps / 1000.0).round() as u32;
    let indices = apply_offset(
        evenly_spaced_indices(info.total_frames, frame_count),
        shift,
        info.total_frames,
    );
    if indices.is_empty() {
        return Err(Error::Empty(clip_path.to_string_lossy().to_string()));
    }

    let dest_dir = tempfile_dir(clip_path)?;
    let mut candidates = Vec::with_capacity(indices.len());
    for &index in &indices {
        let timestamp_secs = f64::from(index) / fps;
        match extract_frame_at(clip_path, timestamp_secs, dest_dir.path(), index).await {
            Ok(img) => {
                let gray = img.to_luma8();
                let jpeg = encode_frame(&img)?;
                candidates.push((
                    ScoredFrame {
                        index,
                        quality_score: quality_score(&gray),
                        jpeg,
                        usable: is_usable(&gray),
                    },
                    (timestamp_secs * 1000.0).round() as u64,
                ));
            }
            Err(err) => {
                warn!(?err, index, "failed to extract candidate frame, skipping");
            }
        }
    }

    if candidates.is_empty() {
        return Err(Error::Empty(clip_path.to_string_lossy().to_string()));
    }

    let timestamps: std::collections::HashMap<u32, u64> =
        candidates.iter().map(|(f, ts)| (f.index, *ts)).collect();
    let scored: Vec<ScoredFrame> = candidates.into_iter().map(|(f, _)| f).collect();

    let kept = if filter_blur {
        apply_replacement_policy(scored, frame_count)
    } else {
        scored
    };

    debug!(kept = kept.len(), requested = frame_count, "frame extraction complete");
    info!(clip = %clip_path.display(), kept = kept.len(), "extracted frames from clip");

    Ok(kept
        .into_iter()
        .map(|f| ExtractedFrame {
            timestamp_ms: timestamps.get(&f.index).copied().unwrap_or(0),
            jpeg: f.jpeg,
        })
        .collect())
}

fn tempfile_dir(clip_path: &Path) -> Result<tempfile::TempDir> {
    tempfile::tempdir().map_err(|e| Error::Extract {
        path: clip_path.to_string_lossy().to_string(),
        index: 0,
        message: format!("failed to create temp dir: {e}"),
    })
}
