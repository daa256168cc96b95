//! Property tests for frame index selection: first/last inclusion, strict
//! ordering and exact cardinality over arbitrary clip lengths.

use nightwatch_frames::selection::{clamp_frame_count, evenly_spaced_indices, MAX_FRAME_COUNT, MIN_FRAME_COUNT};
use proptest::prelude::*;

proptest! {
    #[test]
    fn selection_always_brackets_the_clip(total in 2u32..5000, count in 2u32..64) {
        prop_assume!(count <= total);
        let indices = evenly_spaced_indices(total, count);
        prop_assert_eq!(indices.len(), count as usize);
        prop_assert_eq!(indices[0], 0);
        prop_assert_eq!(*indices.last().unwrap(), total - 1);
    }

    #[test]
    fn indices_are_strictly_increasing(total in 2u32..5000, count in 2u32..64) {
        prop_assume!(count <= total);
        let indices = evenly_spaced_indices(total, count);
        for pair in indices.windows(2) {
            prop_assert!(pair[0] < pair[1], "indices not strictly increasing: {:?}", indices);
        }
    }

    #[test]
    fn oversized_requests_return_every_frame(total in 1u32..200, extra in 0u32..50) {
        let indices = evenly_spaced_indices(total, total + extra);
        prop_assert_eq!(indices, (0..total).collect::<Vec<_>>());
    }

    #[test]
    fn clamp_is_idempotent_and_in_range(requested in 0u32..10_000) {
        let clamped = clamp_frame_count(requested);
        prop_assert!((MIN_FRAME_COUNT..=MAX_FRAME_COUNT).contains(&clamped));
        prop_assert_eq!(clamp_frame_count(clamped), clamped);
    }
}
