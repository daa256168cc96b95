//! Evenly-spaced frame index selection and the usable/unusable replacement
//! policy applied after quality filtering.

/// Minimum frames ever returned from a clip, when available.
pub const MIN_FRAME_COUNT: u32 = 3;
/// Maximum frames a caller may request per clip.
pub const MAX_FRAME_COUNT: u32 = 20;

/// Clamps a requested frame count into `[MIN_FRAME_COUNT, MAX_FRAME_COUNT]`.
#[must_use]
pub fn clamp_frame_count(requested: u32) -> u32 {
    requested.clamp(MIN_FRAME_COUNT, MAX_FRAME_COUNT)
}

/// Calculates evenly spaced frame indices across a clip of `total_frames`
/// frames. The first and last frame are always included; intermediate
/// frames are spread using `round(i * (total_frames - 1) / (frame_count - 1))`.
///
/// Returns every frame index when `frame_count >= total_frames`, and an
/// empty vector when either input is zero.
#[must_use]
pub fn evenly_spaced_indices(total_frames: u32, frame_count: u32) -> Vec<u32> {
    if total_frames == 0 || frame_count == 0 {
        return Vec::new();
    }
    if frame_count >= total_frames {
        return (0..total_frames).collect();
    }
    if frame_count == 1 {
        return vec![0];
    }

    (0..frame_count)
        .map(|i| (u64::from(i) * u64::from(total_frames - 1) / u64::from(frame_count - 1)) as u32)
        .collect()
}

/// One candidate frame carried through quality filtering: its original
/// index (for restoring temporal order), a sharpness/empty-ness quality
/// score, and the encoded JPEG bytes.
#[derive(Debug, Clone)]
pub struct ScoredFrame {
    pub index: u32,
    pub quality_score: f64,
    pub jpeg: Vec<u8>,
    pub usable: bool,
}

/// Applies the usable/unusable replacement policy:
///
/// - If `usable_count >= frame_count`, return the first `frame_count`
///   usable frames (by original index).
/// - If there are no usable frames at all, return the top
///   `max(frame_count, MIN_FRAME_COUNT)` frames by quality score.
/// - Otherwise, keep every usable frame and top up with the best unusable
///   frames until reaching `max(frame_count, MIN_FRAME_COUNT)`, then
///   restore temporal order.
#[must_use]
pub fn apply_replacement_policy(frames: Vec<ScoredFrame>, frame_count: u32) -> Vec<ScoredFrame> {
    let target = frame_count.max(MIN_FRAME_COUNT) as usize;

    let (mut usable, mut unusable): (Vec<ScoredFrame>, Vec<ScoredFrame>) =
        frames.into_iter().partition(|f| f.usable);

    if usable.len() >= frame_count as usize {
        usable.sort_by_key(|f| f.index);
        usable.truncate(frame_count as usize);
        return usable;
    }

    if usable.is_empty() {
        let mut all = unusable;
        all.sort_by(|a, b| b.quality_score.total_cmp(&a.quality_score));
        all.truncate(target);
        all.sort_by_key(|f| f.index);
        return all;
    }

    let needed = target.saturating_sub(usable.len());
    if needed > 0 {
        unusable.sort_by(|a, b| b.quality_score.total_cmp(&a.quality_score));
        usable.extend(unusable.into_iter().take(needed));
    }
    usable.sort_by_key(|f| f.index);
    usable
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evenly_spaced_matches_known_example() {
        // 300 total frames, 5 requested -> [0, 74, 149, 224, 299].
        assert_eq!(
            evenly_spaced_indices(300, 5),
            vec![0, 74, 149, 224, 299]
        );
    }

    #[test]
    fn requesting_more_frames_than_available_returns_all() {
        assert_eq!(evenly_spaced_indices(3, 10), vec![0, 1, 2]);
    }

    #[test]
    fn single_frame_request_returns_first_frame_only() {
        assert_eq!(evenly_spaced_indices(100, 1), vec![0]);
    }

    #[test]
    fn zero_inputs_return_empty() {
        assert_eq!(evenly_spaced_indices(0, 5), Vec::<u32>::new());
        assert_eq!(evenly_spaced_indices(100, 0), Vec::<u32>::new());
    }

    #[test]
    fn clamp_keeps_values_in_range() {
        assert_eq!(clamp_frame_count(1), MIN_FRAME_COUNT);
        assert_eq!(clamp_frame_count(100), MAX_FRAME_COUNT);
        assert_eq!(clamp_frame_count(7), 7);
    }

    fn frame(index: u32, score: f64, usable: bool) -> ScoredFrame {
        ScoredFrame {
            index,
            quality_score: score,
            jpeg: vec![index as u8],
            usable,
        }
    }

    #[test]
    fn all_usable_returns_first_n_in_order() {
        let frames = vec![frame(0, 200.0, true), frame(1, 150.0, true), frame(2, 300.0, true)];
        let kept = apply_replacement_policy(frames, 2);
        assert_eq!(kept.iter().map(|f| f.index).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn all_unusable_returns_best_by_quality() {
        let frames = vec![
            frame(0, 5.0, false),
            frame(1, 50.0, false),
            frame(2, 20.0, false),
            frame(3, 90.0, false),
        ];
        let kept = apply_replacement_policy(frames, 2);
        assert_eq!(kept.len(), 2);
        // best two by score: index 3 (90.0), index 1 (50.0); restored to index order
        assert_eq!(kept.iter().map(|f| f.index).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn partial_usable_tops_up_with_best_unusable_and_restores_order() {
        let frames = vec![
            frame(0, 5.0, false),
            frame(1, 200.0, true),
            frame(2, 80.0, false),
            frame(3, 10.0, false),
        ];
        let kept = apply_replacement_policy(frames, 3);
        // target = max(3, MIN_FRAME_COUNT) = 3; usable has 1, needs 2 more
        // best two unusable by score: index 2 (80.0), index 3 (10.0)
        assert_eq!(
            kept.iter().map(|f| f.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn minimum_floor_applies_even_for_small_requests() {
        let frames = vec![frame(0, 5.0, false), frame(1, 10.0, false), frame(2, 15.0, false)];
        // frame_count below MIN_FRAME_COUNT should still target MIN_FRAME_COUNT
        let kept = apply_replacement_policy(frames, 1);
        assert_eq!(kept.len(), 3);
    }
}
