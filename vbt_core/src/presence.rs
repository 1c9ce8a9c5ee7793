//! Stage 1: is there a usable human pose in this frame at all?
//!
//! Deliberately a low bar. Nothing here may look at the tracking-point
//! selection or at any particular landmark.

use vbt_traits::PoseFrame;

/// `true` when the frame exists, has keypoints, and at least one of them
/// reaches `min_usable_score`.
pub fn check_frame_usable(frame: Option<&PoseFrame>, min_usable_score: f32) -> bool {
    match frame {
        Some(f) => f.keypoints.iter().any(|k| k.score >= min_usable_score),
        None => false,
    }
}

/// Keypoints passing the strict per-landmark threshold. Diagnostic only.
pub fn count_valid_keypoints(frame: Option<&PoseFrame>, min_keypoint_score: f32) -> usize {
    frame.map_or(0, |f| {
        f.keypoints
            .iter()
            .filter(|k| k.score >= min_keypoint_score)
            .count()
    })
}
