//! Synthetic pose sources for tests, benches and demos.

use crate::source::ReplaySource;
use std::time::Duration;
use vbt_traits::{Detection, Keypoint, PoseFrame, PoseSource};

/// Upright lifter with a static torso and one wrist moving vertically in
/// cosine cycles, starting and ending at the bottom.
#[derive(Debug, Clone)]
pub struct SyntheticLift {
    reps: u32,
    rest_frames: u32,
    frames_per_rep: u32,
    amplitude: f32,
    frame_ms: u64,
    wrist_score: f32,
    dropout: Option<(u64, u64)>,
}

impl SyntheticLift {
    pub const POINT: &'static str = "right_wrist";

    pub fn new(reps: u32) -> Self {
        Self {
            reps,
            rest_frames: 10,
            frames_per_rep: 30,
            amplitude: 0.15,
            frame_ms: 33,
            wrist_score: 0.9,
            dropout: None,
        }
    }

    /// Static frames before the first rep and after the last one.
    pub fn with_rest_frames(mut self, n: u32) -> Self {
        self.rest_frames = n;
        self
    }

    pub fn with_frames_per_rep(mut self, n: u32) -> Self {
        self.frames_per_rep = n.max(4);
        self
    }

    pub fn with_wrist_score(mut self, s: f32) -> Self {
        self.wrist_score = s;
        self
    }

    /// Replace frames `start..start + len` (0-based) with missed detections.
    pub fn with_dropout(mut self, start: u64, len: u64) -> Self {
        self.dropout = Some((start, len));
        self
    }

    fn frame(&self, seq: u64, wrist_y: f32) -> PoseFrame {
        PoseFrame::new(
            seq,
            seq * self.frame_ms,
            vec![
                Keypoint::new("nose", 0.5, 0.2, 0.9),
                Keypoint::new("left_shoulder", 0.4, 0.35, 0.9),
                Keypoint::new("right_shoulder", 0.6, 0.35, 0.9),
                Keypoint::new("left_hip", 0.42, 0.65, 0.9),
                Keypoint::new("right_hip", 0.58, 0.65, 0.9),
                Keypoint::new(Self::POINT, 0.7, wrist_y, self.wrist_score),
            ],
        )
    }

    /// Every detection, without the trailing end-of-stream marker.
    pub fn detections(&self) -> Vec<Detection> {
        let bottom = 0.5 + self.amplitude;
        let mut ys = Vec::new();
        ys.extend(std::iter::repeat_n(bottom, self.rest_frames as usize));
        for _ in 0..self.reps {
            for k in 0..self.frames_per_rep {
                let phase = std::f32::consts::TAU * k as f32 / self.frames_per_rep as f32;
                ys.push(0.5 + self.amplitude * phase.cos());
            }
        }
        ys.extend(std::iter::repeat_n(bottom, self.rest_frames as usize));

        ys.into_iter()
            .enumerate()
            .map(|(i, y)| {
                let seq = i as u64;
                match self.dropout {
                    Some((start, len)) if (start..start + len).contains(&seq) => Detection::Missed,
                    _ => Detection::Pose(self.frame(seq, y)),
                }
            })
            .collect()
    }

    pub fn into_source(self) -> ReplaySource {
        ReplaySource::new(self.detections())
    }
}

/// Source whose every read fails after `delay`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSource {
    pub delay: Duration,
}

impl PoseSource for FailingSource {
    fn next_frame(
        &mut self,
        _timeout: Duration,
    ) -> Result<Detection, Box<dyn std::error::Error + Send + Sync>> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Err(Box::new(std::io::Error::other("camera unavailable")))
    }
}
