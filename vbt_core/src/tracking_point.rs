//! Stage 3: resolve the coach-selected landmark to a live position.
//!
//! Only consulted once stage 2 reports stability; it never feeds back into
//! the stability computation.

use serde::Serialize;
use vbt_traits::{Point, PoseFrame};

/// Why the tracking point did or did not resolve on a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrackingStatus {
    Trackable { score: f32 },
    /// Stage 2 has not passed; nothing else was checked.
    NotStable,
    NoSelection,
    /// The selected landmark is not in this frame.
    Missing,
    LowConfidence { score: f32 },
}

/// Stage 3 verdict plus the resolved position when it passed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trackability {
    pub status: TrackingStatus,
    pub position: Option<Point>,
}

impl Trackability {
    fn fail(status: TrackingStatus) -> Self {
        Self {
            status,
            position: None,
        }
    }

    #[inline]
    pub fn is_trackable(&self) -> bool {
        matches!(self.status, TrackingStatus::Trackable { .. })
    }

    /// Score of the selected keypoint, when it was found.
    pub fn score(&self) -> Option<f32> {
        match self.status {
            TrackingStatus::Trackable { score } | TrackingStatus::LowConfidence { score } => {
                Some(score)
            }
            _ => None,
        }
    }
}

pub fn check_frame_trackable(
    frame: Option<&PoseFrame>,
    selection: Option<&str>,
    frame_stable: bool,
    confidence_threshold: f32,
) -> Trackability {
    if !frame_stable {
        return Trackability::fail(TrackingStatus::NotStable);
    }
    let Some(name) = selection else {
        return Trackability::fail(TrackingStatus::NoSelection);
    };
    let Some(kp) = frame.and_then(|f| f.keypoint(name)) else {
        return Trackability::fail(TrackingStatus::Missing);
    };
    if kp.score < confidence_threshold {
        return Trackability::fail(TrackingStatus::LowConfidence { score: kp.score });
    }
    Trackability {
        status: TrackingStatus::Trackable { score: kp.score },
        position: Some(kp.position()),
    }
}
