//! In-memory pose sources.

use std::collections::VecDeque;
use std::time::Duration;
use vbt_traits::{Detection, PoseFrame, PoseSource};

/// Replays a recorded detection sequence, then reports end of stream.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    pending: VecDeque<Detection>,
    /// Full sequence kept only when looping.
    original: Option<Vec<Detection>>,
}

impl ReplaySource {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            pending: detections.into(),
            original: None,
        }
    }

    /// Replay forever. An empty sequence still ends immediately.
    pub fn looping(detections: Vec<Detection>) -> Self {
        Self {
            pending: detections.clone().into(),
            original: Some(detections),
        }
    }

    pub fn from_frames(frames: impl IntoIterator<Item = PoseFrame>) -> Self {
        Self::new(frames.into_iter().map(Detection::Pose).collect())
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl PoseSource for ReplaySource {
    fn next_frame(
        &mut self,
        _timeout: Duration,
    ) -> Result<Detection, Box<dyn std::error::Error + Send + Sync>> {
        if self.pending.is_empty() {
            if let Some(all) = self.original.as_ref().filter(|v| !v.is_empty()) {
                self.pending.extend(all.iter().cloned());
            }
        }
        Ok(self.pending.pop_front().unwrap_or(Detection::EndOfStream))
    }
}
