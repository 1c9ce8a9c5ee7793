//! Keypoint model: one [`PoseFrame`] per camera frame.

use serde::{Deserialize, Serialize};

/// Normalized 2-D position; both axes are expected in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in normalized frame units.
    #[inline]
    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A named anatomical landmark with position and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Landmark name, e.g. `right_wrist`.
    pub name: String,
    pub x: f32,
    pub y: f32,
    /// Detector confidence in `[0, 1]`.
    pub score: f32,
}

impl Keypoint {
    pub fn new(name: impl Into<String>, x: f32, y: f32, score: f32) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            score,
        }
    }

    #[inline]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Every keypoint detected in a single camera frame.
///
/// Frames are immutable once produced; the pipeline only borrows them for
/// the duration of one `process_frame` call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseFrame {
    /// Monotonic frame sequence number assigned by the source.
    pub seq: u64,
    /// Capture timestamp in milliseconds since the start of the session.
    pub timestamp_ms: u64,
    pub keypoints: Vec<Keypoint>,
}

impl PoseFrame {
    pub fn new(seq: u64, timestamp_ms: u64, keypoints: Vec<Keypoint>) -> Self {
        Self {
            seq,
            timestamp_ms,
            keypoints,
        }
    }

    /// Look up a keypoint by name. Names are unique within a frame; the
    /// first match wins if a source violates that.
    pub fn keypoint(&self, name: &str) -> Option<&Keypoint> {
        self.keypoints.iter().find(|k| k.name == name)
    }

    /// Highest confidence among all keypoints, `None` for an empty frame.
    pub fn max_score(&self) -> Option<f32> {
        self.keypoints
            .iter()
            .map(|k| k.score)
            .fold(None, |acc, s| Some(acc.map_or(s, |a: f32| a.max(s))))
    }
}

/// Outcome of asking a pose source for the next frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// A frame was produced (it may still contain no keypoints).
    Pose(PoseFrame),
    /// The detector ran but produced nothing for this frame.
    Missed,
    /// The source is exhausted; no further frames will arrive.
    EndOfStream,
}

impl Detection {
    /// Borrow the frame if one was produced.
    pub fn frame(&self) -> Option<&PoseFrame> {
        match self {
            Detection::Pose(f) => Some(f),
            _ => None,
        }
    }
}
