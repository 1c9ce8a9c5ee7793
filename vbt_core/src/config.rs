//! Configuration types for the pipeline.
//!
//! These are the runtime structs consumed by `PipelineBuilder`. They are
//! separate from the TOML-deserialized schema in `vbt_config`; see
//! `conversions` for the mapping.

/// Stage 1 thresholds.
#[derive(Debug, Clone)]
pub struct PresenceCfg {
    /// A frame is usable when any keypoint reaches this score.
    pub min_usable_score: f32,
    /// Strict per-keypoint threshold. Only used for diagnostics and scale
    /// inference, never for the usable/stable decision.
    pub min_keypoint_score: f32,
}

impl Default for PresenceCfg {
    fn default() -> Self {
        Self {
            min_usable_score: 0.3,
            min_keypoint_score: 0.6,
        }
    }
}

/// Stage 2 accumulation parameters.
#[derive(Debug, Clone)]
pub struct StabilityCfg {
    pub required_stable_frames: u32,
    /// Subtracted from the counter on each unusable frame.
    pub decay_rate: u32,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            required_stable_frames: 5,
            decay_rate: 1,
        }
    }
}

/// Stage 3 threshold.
#[derive(Debug, Clone)]
pub struct TrackingCfg {
    /// Looser than `min_keypoint_score` on purpose.
    pub confidence_threshold: f32,
}

impl Default for TrackingCfg {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
        }
    }
}

/// Two keypoints a known distance apart, e.g. shoulder to hip.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSegment {
    pub from: String,
    pub to: String,
    pub meters: f32,
}

/// Stage 4 and 5 thresholds plus the unit conversion for velocity.
#[derive(Debug, Clone)]
pub struct FilterCfg {
    /// Normalized displacement (fraction of frame extent).
    pub movement_threshold: f32,
    pub velocity_threshold_mps: f32,
    /// Fallback conversion from normalized units to meters.
    pub meters_per_unit: f32,
    /// When set and both endpoints are confidently visible, overrides
    /// `meters_per_unit` for that frame.
    pub reference_segment: Option<ReferenceSegment>,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            movement_threshold: 0.02,
            velocity_threshold_mps: 0.05,
            meters_per_unit: 1.0,
            reference_segment: None,
        }
    }
}

/// When a `start_recording` issued in READY takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingStartPolicy {
    /// Arm in READY; enter RECORDING as soon as TRACKING is reached.
    #[default]
    AwaitTracking,
    /// Enter RECORDING straight from READY.
    Immediate,
}

/// What pose loss does to an active recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoseLossPolicy {
    /// Keep reps recorded so far and re-arm; recording resumes on reacquisition.
    #[default]
    Pause,
    /// Drop the recording entirely.
    Abort,
}

/// State machine policy knobs.
#[derive(Debug, Clone)]
pub struct SessionCfg {
    /// Consecutive unusable frames that count as pose loss.
    pub pose_loss_frames: u32,
    pub recording_start: RecordingStartPolicy,
    pub pose_loss_while_recording: PoseLossPolicy,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            pose_loss_frames: 10,
            recording_start: RecordingStartPolicy::AwaitTracking,
            pose_loss_while_recording: PoseLossPolicy::Pause,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepDirection {
    /// Concentric phase moves up the frame (y decreasing).
    #[default]
    Up,
    Down,
}

/// Repetition counter parameters.
#[derive(Debug, Clone)]
pub struct RepCfg {
    pub enabled: bool,
    pub min_displacement: f32,
    pub direction: RepDirection,
}

impl Default for RepCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            min_displacement: 0.05,
            direction: RepDirection::Up,
        }
    }
}
