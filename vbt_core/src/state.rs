//! Tracking state machine.
//!
//! Consumes the per-frame validation flags and resolves exactly one
//! `PipelineState` per frame. Every transition is total: no state waits on
//! anything the machine cannot observe itself.

use crate::config::{PoseLossPolicy, RecordingStartPolicy, SessionCfg};
use serde::Serialize;

/// Authoritative pipeline state, ordered so callers can gate on
/// `state >= PipelineState::Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    #[default]
    Initializing,
    Stabilizing,
    Ready,
    Tracking,
    Recording,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::Stabilizing => "STABILIZING",
            Self::Ready => "READY",
            Self::Tracking => "TRACKING",
            Self::Recording => "RECORDING",
        }
    }
}

impl core::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five independent per-frame verdicts, one per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ValidationFlags {
    pub frame_usable: bool,
    pub frame_stable: bool,
    pub frame_trackable: bool,
    pub frame_valid: bool,
    pub frame_countable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Recording {
    #[default]
    Idle,
    /// Requested; waiting for the start policy to allow RECORDING.
    Armed,
    Active,
}

/// Side effects the pipeline must apply after a frame's transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    None,
    /// Pose loss reset: zero stability, drop the motion reference.
    PoseLost,
    /// Pose loss while recording under `PoseLossPolicy::Pause`.
    RecordingPaused,
    /// Pose loss while recording under `PoseLossPolicy::Abort`.
    RecordingAborted,
}

/// Result of a `start_recording` request that was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingStart {
    /// The machine is now RECORDING.
    Started,
    /// Accepted in READY; RECORDING begins when TRACKING is reached.
    Armed,
    AlreadyRecording,
}

#[derive(Debug, Clone)]
pub struct StateMachine {
    state: PipelineState,
    unusable_streak: u32,
    recording: Recording,
    cfg: SessionCfg,
}

impl StateMachine {
    pub fn new(cfg: SessionCfg) -> Self {
        Self {
            state: PipelineState::Initializing,
            unusable_streak: 0,
            recording: Recording::Idle,
            cfg,
        }
    }

    #[inline]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// A recording was requested and has not been stopped.
    pub fn recording_requested(&self) -> bool {
        self.recording != Recording::Idle
    }

    pub fn unusable_streak(&self) -> u32 {
        self.unusable_streak
    }

    /// Advance one frame. Returns the side effect the caller must apply.
    pub fn step(&mut self, flags: &ValidationFlags) -> StepEvent {
        if flags.frame_usable {
            self.unusable_streak = 0;
        } else {
            self.unusable_streak = self.unusable_streak.saturating_add(1);
            if self.unusable_streak == self.cfg.pose_loss_frames {
                return self.on_pose_loss();
            }
        }

        // Rules apply in sequence, so one frame may climb several states
        // (a frame that completes stability and resolves the tracking point
        // lands in TRACKING).
        let mut next = self.state;
        if next == PipelineState::Initializing && flags.frame_usable {
            next = PipelineState::Stabilizing;
        }
        if next == PipelineState::Stabilizing && flags.frame_stable {
            next = PipelineState::Ready;
        }
        next = match next {
            PipelineState::Ready | PipelineState::Tracking if !flags.frame_stable => {
                PipelineState::Stabilizing
            }
            PipelineState::Ready | PipelineState::Tracking if flags.frame_trackable => {
                PipelineState::Tracking
            }
            PipelineState::Ready | PipelineState::Tracking => PipelineState::Ready,
            s => s,
        };
        self.state = if self.recording == Recording::Armed && self.may_start(next) {
            self.recording = Recording::Active;
            tracing::info!(from = %next, "recording started");
            PipelineState::Recording
        } else {
            next
        };
        StepEvent::None
    }

    fn may_start(&self, s: PipelineState) -> bool {
        match self.cfg.recording_start {
            RecordingStartPolicy::AwaitTracking => s == PipelineState::Tracking,
            RecordingStartPolicy::Immediate => {
                matches!(s, PipelineState::Ready | PipelineState::Tracking)
            }
        }
    }

    fn on_pose_loss(&mut self) -> StepEvent {
        let was = self.state;
        self.state = PipelineState::Initializing;
        let event = match (self.recording, self.cfg.pose_loss_while_recording) {
            (Recording::Idle, _) => StepEvent::PoseLost,
            // Nothing was being recorded yet; the request survives either policy.
            (Recording::Armed, _) => {
                tracing::debug!(from = %was, "pose lost; recording request stays armed");
                StepEvent::PoseLost
            }
            (Recording::Active, PoseLossPolicy::Pause) => {
                self.recording = Recording::Armed;
                tracing::warn!(from = %was, "pose lost while recording; paused");
                StepEvent::RecordingPaused
            }
            (Recording::Active, PoseLossPolicy::Abort) => {
                self.recording = Recording::Idle;
                tracing::warn!(from = %was, "pose lost while recording; recording discarded");
                StepEvent::RecordingAborted
            }
        };
        if was != PipelineState::Initializing {
            tracing::debug!(from = %was, frames = self.unusable_streak, "pose lost");
        }
        event
    }

    /// Request recording. Legal from READY upward; never rejected because
    /// the tracking point has not resolved yet.
    pub fn start_recording(&mut self) -> Result<RecordingStart, crate::error::CommandError> {
        match self.state {
            PipelineState::Recording => Ok(RecordingStart::AlreadyRecording),
            PipelineState::Tracking => {
                self.recording = Recording::Active;
                self.state = PipelineState::Recording;
                Ok(RecordingStart::Started)
            }
            PipelineState::Ready => match self.cfg.recording_start {
                RecordingStartPolicy::Immediate => {
                    self.recording = Recording::Active;
                    self.state = PipelineState::Recording;
                    Ok(RecordingStart::Started)
                }
                RecordingStartPolicy::AwaitTracking => {
                    self.recording = Recording::Armed;
                    Ok(RecordingStart::Armed)
                }
            },
            s @ (PipelineState::Initializing | PipelineState::Stabilizing) => {
                Err(crate::error::CommandError::NotReady { state: s })
            }
        }
    }

    /// Stop or disarm recording. `last` are the flags of the most recent
    /// frame and pick the state to fall back to. Returns `false` when
    /// nothing was requested.
    pub fn stop_recording(&mut self, last: &ValidationFlags) -> bool {
        if self.recording == Recording::Idle {
            return false;
        }
        self.recording = Recording::Idle;
        if self.state == PipelineState::Recording {
            self.state = if last.frame_trackable {
                PipelineState::Tracking
            } else if last.frame_stable {
                PipelineState::Ready
            } else {
                PipelineState::Stabilizing
            };
        }
        true
    }

    pub fn reset(&mut self) {
        self.state = PipelineState::Initializing;
        self.unusable_streak = 0;
        self.recording = Recording::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(usable: bool, stable: bool, trackable: bool) -> ValidationFlags {
        ValidationFlags {
            frame_usable: usable,
            frame_stable: stable,
            frame_trackable: trackable,
            ..ValidationFlags::default()
        }
    }

    fn machine() -> StateMachine {
        StateMachine::new(SessionCfg {
            pose_loss_frames: 3,
            ..SessionCfg::default()
        })
    }

    fn drive_to_ready(m: &mut StateMachine) {
        m.step(&flags(true, false, false));
        m.step(&flags(true, true, false));
        assert_eq!(m.state(), PipelineState::Ready);
    }

    #[test]
    fn states_are_ordered() {
        assert!(PipelineState::Recording > PipelineState::Ready);
        assert!(PipelineState::Stabilizing < PipelineState::Ready);
    }

    #[test]
    fn ready_does_not_need_trackability() {
        let mut m = machine();
        drive_to_ready(&mut m);
        m.step(&flags(true, true, false));
        assert_eq!(m.state(), PipelineState::Ready);
    }

    #[test]
    fn tracking_falls_back_to_ready() {
        let mut m = machine();
        drive_to_ready(&mut m);
        m.step(&flags(true, true, true));
        assert_eq!(m.state(), PipelineState::Tracking);
        m.step(&flags(true, true, false));
        assert_eq!(m.state(), PipelineState::Ready);
    }

    #[test]
    fn lost_stability_returns_to_stabilizing() {
        let mut m = machine();
        drive_to_ready(&mut m);
        m.step(&flags(false, false, false));
        assert_eq!(m.state(), PipelineState::Stabilizing);
    }

    #[test]
    fn pose_loss_resets_after_streak() {
        let mut m = machine();
        drive_to_ready(&mut m);
        assert_eq!(m.step(&flags(false, false, false)), StepEvent::None);
        assert_eq!(m.step(&flags(false, false, false)), StepEvent::None);
        assert_eq!(m.step(&flags(false, false, false)), StepEvent::PoseLost);
        assert_eq!(m.state(), PipelineState::Initializing);
        // Further unusable frames do not fire again.
        assert_eq!(m.step(&flags(false, false, false)), StepEvent::None);
    }

    #[test]
    fn start_rejected_before_ready() {
        let mut m = machine();
        let err = m.start_recording().expect_err("not ready");
        assert_eq!(
            err,
            crate::error::CommandError::NotReady {
                state: PipelineState::Initializing
            }
        );
    }

    #[test]
    fn armed_in_ready_starts_on_tracking() {
        let mut m = machine();
        drive_to_ready(&mut m);
        assert_eq!(m.start_recording(), Ok(RecordingStart::Armed));
        m.step(&flags(true, true, false));
        assert_eq!(m.state(), PipelineState::Ready);
        m.step(&flags(true, true, true));
        assert_eq!(m.state(), PipelineState::Recording);
    }

    #[test]
    fn immediate_policy_records_from_ready() {
        let mut m = StateMachine::new(SessionCfg {
            recording_start: RecordingStartPolicy::Immediate,
            ..SessionCfg::default()
        });
        drive_to_ready(&mut m);
        assert_eq!(m.start_recording(), Ok(RecordingStart::Started));
        assert_eq!(m.state(), PipelineState::Recording);
    }

    #[test]
    fn stop_falls_back_by_last_flags() {
        let mut m = machine();
        drive_to_ready(&mut m);
        m.step(&flags(true, true, true));
        m.start_recording().expect("start");
        assert!(m.stop_recording(&flags(true, true, false)));
        assert_eq!(m.state(), PipelineState::Ready);
        assert!(!m.stop_recording(&flags(true, true, false)));
    }

    #[test]
    fn pause_rearms_and_abort_clears() {
        let mut m = machine();
        drive_to_ready(&mut m);
        m.step(&flags(true, true, true));
        m.start_recording().expect("start");
        for _ in 0..2 {
            m.step(&flags(false, false, false));
            assert_eq!(m.state(), PipelineState::Recording);
        }
        assert_eq!(m.step(&flags(false, false, false)), StepEvent::RecordingPaused);
        assert!(m.recording_requested());

        let mut m = StateMachine::new(SessionCfg {
            pose_loss_frames: 1,
            pose_loss_while_recording: PoseLossPolicy::Abort,
            ..SessionCfg::default()
        });
        drive_to_ready(&mut m);
        m.step(&flags(true, true, true));
        m.start_recording().expect("start");
        assert_eq!(m.step(&flags(false, false, false)), StepEvent::RecordingAborted);
        assert!(!m.recording_requested());
        assert_eq!(m.state(), PipelineState::Initializing);
    }

    #[rstest::rstest]
    #[case(PoseLossPolicy::Pause)]
    #[case(PoseLossPolicy::Abort)]
    fn armed_request_survives_pose_loss(#[case] policy: PoseLossPolicy) {
        let mut m = StateMachine::new(SessionCfg {
            pose_loss_frames: 1,
            pose_loss_while_recording: policy,
            ..SessionCfg::default()
        });
        drive_to_ready(&mut m);
        assert_eq!(m.start_recording(), Ok(RecordingStart::Armed));
        assert_eq!(m.step(&flags(false, false, false)), StepEvent::PoseLost);
        assert_eq!(m.state(), PipelineState::Initializing);
        assert!(m.recording_requested());

        // Reacquired and tracking: the armed request starts recording.
        drive_to_ready(&mut m);
        m.step(&flags(true, true, true));
        assert_eq!(m.state(), PipelineState::Recording);
    }
}
