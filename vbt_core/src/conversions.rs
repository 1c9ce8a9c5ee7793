//! `From` implementations bridging `vbt_config` types to `vbt_core` types.

use crate::config::{
    FilterCfg, PoseLossPolicy, PresenceCfg, RecordingStartPolicy, ReferenceSegment, RepCfg,
    RepDirection, SessionCfg, StabilityCfg, TrackingCfg,
};
use crate::diagnostics::NullSink;
use crate::pipeline::PipelineBuilder;

// ── Presence / stability / tracking ─────────────────────────────────────────

impl From<&vbt_config::PresenceCfg> for PresenceCfg {
    fn from(c: &vbt_config::PresenceCfg) -> Self {
        Self {
            min_usable_score: c.min_usable_score,
            min_keypoint_score: c.min_keypoint_score,
        }
    }
}

impl From<&vbt_config::StabilityCfg> for StabilityCfg {
    fn from(c: &vbt_config::StabilityCfg) -> Self {
        Self {
            required_stable_frames: c.required_stable_frames,
            decay_rate: c.decay_rate,
        }
    }
}

impl From<&vbt_config::TrackingCfg> for TrackingCfg {
    fn from(c: &vbt_config::TrackingCfg) -> Self {
        Self {
            confidence_threshold: c.confidence_threshold,
        }
    }
}

// ── Filters ──────────────────────────────────────────────────────────────────

impl From<&vbt_config::ReferenceSegment> for ReferenceSegment {
    fn from(c: &vbt_config::ReferenceSegment) -> Self {
        Self {
            from: c.from.clone(),
            to: c.to.clone(),
            meters: c.meters,
        }
    }
}

impl From<&vbt_config::FiltersCfg> for FilterCfg {
    fn from(c: &vbt_config::FiltersCfg) -> Self {
        Self {
            movement_threshold: c.movement_threshold,
            velocity_threshold_mps: c.velocity_threshold_mps,
            meters_per_unit: c.meters_per_unit,
            reference_segment: c.reference_segment.as_ref().map(ReferenceSegment::from),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

impl From<vbt_config::RecordingStart> for RecordingStartPolicy {
    fn from(c: vbt_config::RecordingStart) -> Self {
        match c {
            vbt_config::RecordingStart::AwaitTracking => Self::AwaitTracking,
            vbt_config::RecordingStart::Immediate => Self::Immediate,
        }
    }
}

impl From<vbt_config::PoseLossWhileRecording> for PoseLossPolicy {
    fn from(c: vbt_config::PoseLossWhileRecording) -> Self {
        match c {
            vbt_config::PoseLossWhileRecording::Pause => Self::Pause,
            vbt_config::PoseLossWhileRecording::Abort => Self::Abort,
        }
    }
}

impl From<&vbt_config::SessionCfg> for SessionCfg {
    fn from(c: &vbt_config::SessionCfg) -> Self {
        Self {
            pose_loss_frames: c.pose_loss_frames,
            recording_start: c.recording_start.into(),
            pose_loss_while_recording: c.pose_loss_while_recording.into(),
        }
    }
}

// ── Reps ─────────────────────────────────────────────────────────────────────

impl From<vbt_config::RepDirection> for RepDirection {
    fn from(c: vbt_config::RepDirection) -> Self {
        match c {
            vbt_config::RepDirection::Up => Self::Up,
            vbt_config::RepDirection::Down => Self::Down,
        }
    }
}

impl From<&vbt_config::RepsCfg> for RepCfg {
    fn from(c: &vbt_config::RepsCfg) -> Self {
        Self {
            enabled: c.enabled,
            min_displacement: c.min_displacement,
            direction: c.direction.into(),
        }
    }
}

// ── Whole config ─────────────────────────────────────────────────────────────

impl From<&vbt_config::Config> for PipelineBuilder<NullSink> {
    fn from(c: &vbt_config::Config) -> Self {
        let mut b = PipelineBuilder::default()
            .with_presence((&c.presence).into())
            .with_stability((&c.stability).into())
            .with_tracking((&c.tracking).into())
            .with_filters((&c.filters).into())
            .with_session((&c.session).into())
            .with_reps((&c.reps).into());
        if let Some(point) = &c.tracking.point {
            b = b.with_tracking_point(point.clone());
        }
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_enums_map() {
        let cfg = vbt_config::load_toml(
            "[session]\nrecording_start = \"immediate\"\npose_loss_while_recording = \"abort\"",
        )
        .expect("parse");
        let s: SessionCfg = (&cfg.session).into();
        assert_eq!(s.recording_start, RecordingStartPolicy::Immediate);
        assert_eq!(s.pose_loss_while_recording, PoseLossPolicy::Abort);
        assert_eq!(s.pose_loss_frames, 10);
    }

    #[test]
    fn builder_from_config_carries_tracking_point() {
        let cfg = vbt_config::load_toml("[tracking]\npoint = \"left_wrist\"").expect("parse");
        let pipeline = PipelineBuilder::from(&cfg).build().expect("build");
        assert_eq!(pipeline.tracking_point(), Some("left_wrist"));
    }
}
