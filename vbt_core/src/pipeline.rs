//! The per-frame pipeline and its builder.
//!
//! `process_frame` runs the five stages strictly in order, each one seeing
//! only the raw frame and the outputs of the stages before it, then steps the
//! state machine and reports a diagnostic snapshot to the injected sink.

use crate::config::{FilterCfg, PresenceCfg, RepCfg, SessionCfg, StabilityCfg, TrackingCfg};
use crate::diagnostics::{
    BlockingDiagnosis, DiagnosticFrame, DiagnosticsReporter, DiagnosticsSink, NullSink,
    RawMeasurements, Thresholds,
};
use crate::error::{BuildError, CommandError, Result};
use crate::filters::{
    MotionReference, filter_movement, filter_velocity, resolve_meters_per_unit, velocity_mps,
};
use crate::presence::{check_frame_usable, count_valid_keypoints};
use crate::reps::{Rep, RepCounter};
use crate::stability::StabilityTracker;
use crate::state::{PipelineState, RecordingStart, StateMachine, StepEvent, ValidationFlags};
use crate::tracking_point::check_frame_trackable;
use vbt_traits::PoseFrame;

/// Everything one frame produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub flags: ValidationFlags,
    pub state: PipelineState,
    pub previous_state: PipelineState,
    pub diagnostic: DiagnosticFrame,
    /// A repetition completed on this frame.
    pub rep: Option<Rep>,
}

impl FrameOutcome {
    #[inline]
    pub fn transitioned(&self) -> bool {
        self.state != self.previous_state
    }
}

/// Returned by `stop_recording`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordingSummary {
    pub reps: Vec<Rep>,
    /// Frames processed while in RECORDING.
    pub frames_recorded: u64,
}

pub struct Pipeline<D: DiagnosticsSink = NullSink> {
    presence: PresenceCfg,
    tracking: TrackingCfg,
    filters: FilterCfg,
    stability: StabilityTracker,
    machine: StateMachine,
    reporter: DiagnosticsReporter,
    reps: RepCounter,
    selection: Option<String>,
    motion: Option<MotionReference>,
    flags: ValidationFlags,
    frame_number: u64,
    frames_recorded: u64,
    last: Option<DiagnosticFrame>,
    sink: D,
}

impl<D: DiagnosticsSink> core::fmt::Debug for Pipeline<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.machine.state())
            .field("stable_frames", &self.stability.stable_frames())
            .field("tracking_point", &self.selection)
            .field("frame_number", &self.frame_number)
            .finish_non_exhaustive()
    }
}

impl Pipeline<NullSink> {
    /// Start building a pipeline with default thresholds.
    pub fn builder() -> PipelineBuilder<NullSink> {
        PipelineBuilder::default()
    }
}

impl<D: DiagnosticsSink> Pipeline<D> {
    /// Process one camera frame. `None` is a detection failure.
    pub fn process_frame(&mut self, frame: Option<&PoseFrame>) -> FrameOutcome {
        let previous_state = self.machine.state();
        self.frame_number += 1;

        // Stage 1
        let usable = check_frame_usable(frame, self.presence.min_usable_score);
        // Stage 2: input is the stage 1 verdict only.
        let stable = self.stability.update(usable);
        // Stage 3
        let track = check_frame_trackable(
            frame,
            self.selection.as_deref(),
            stable,
            self.tracking.confidence_threshold,
        );
        let trackable = track.is_trackable();
        if !trackable {
            self.motion = None;
        }
        // Stage 4
        let movement = filter_movement(
            trackable,
            self.motion.map(|r| r.position),
            track.position,
            self.filters.movement_threshold,
        );
        // Stage 5
        let timestamp_ms = frame.map(|f| f.timestamp_ms);
        let mpu = resolve_meters_per_unit(frame, &self.filters, self.presence.min_keypoint_score);
        let velocity = match (self.motion, timestamp_ms, movement.displacement) {
            (Some(r), Some(ts), Some(d)) if !movement.first_sample => {
                velocity_mps(d, ts.saturating_sub(r.timestamp_ms), mpu)
            }
            _ => None,
        };
        let countable =
            filter_velocity(movement.valid, velocity, self.filters.velocity_threshold_mps);

        // The reference only moves on a segment's first sample or on accepted
        // motion, so sub-threshold jitter never drags it along.
        if movement.first_sample || movement.valid {
            if let (Some(position), Some(ts)) = (track.position, timestamp_ms) {
                self.motion = Some(MotionReference {
                    position,
                    timestamp_ms: ts,
                });
            }
        }

        let flags = ValidationFlags {
            frame_usable: usable,
            frame_stable: stable,
            frame_trackable: trackable,
            frame_valid: movement.valid,
            frame_countable: countable,
        };
        self.flags = flags;

        match self.machine.step(&flags) {
            StepEvent::None => {}
            StepEvent::PoseLost | StepEvent::RecordingPaused => self.on_pose_loss(),
            StepEvent::RecordingAborted => {
                self.on_pose_loss();
                self.reps.reset();
                self.frames_recorded = 0;
            }
        }
        let state = self.machine.state();
        if state != previous_state {
            tracing::debug!(
                frame = self.frame_number,
                from = %previous_state,
                to = %state,
                "state transition"
            );
        }

        let mut rep = None;
        if state == PipelineState::Recording {
            self.frames_recorded += 1;
            if let (true, Some(dy), Some(v)) = (countable, movement.dy, velocity) {
                rep = self.reps.feed(self.frame_number, dy, v);
            }
        }

        let measurements = RawMeasurements {
            timestamp_ms,
            frame_present: frame.is_some(),
            keypoint_count: frame.map_or(0, |f| f.keypoints.len()),
            max_score: frame.and_then(PoseFrame::max_score),
            valid_keypoint_count: count_valid_keypoints(frame, self.presence.min_keypoint_score),
            stable_frames: self.stability.stable_frames(),
            tracking_point: self.selection.clone(),
            tracking_status: Some(track.status),
            position: track.position,
            displacement: movement.displacement,
            first_sample: movement.first_sample,
            velocity_mps: velocity,
            meters_per_unit: mpu,
        };
        let diagnostic =
            self.reporter
                .observe(self.frame_number, measurements, flags, state, previous_state);
        self.sink.record(&diagnostic);
        self.last = Some(diagnostic.clone());

        FrameOutcome {
            flags,
            state,
            previous_state,
            diagnostic,
            rep,
        }
    }

    fn on_pose_loss(&mut self) {
        self.stability.reset();
        self.motion = None;
        self.reps.interrupt();
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    #[inline]
    pub fn state(&self) -> PipelineState {
        self.machine.state()
    }

    /// Flags of the most recent frame.
    #[inline]
    pub fn flags(&self) -> ValidationFlags {
        self.flags
    }

    pub fn stable_frames(&self) -> u32 {
        self.stability.stable_frames()
    }

    pub fn tracking_point(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// UI gate for the record button.
    pub fn can_start_recording(&self) -> bool {
        self.machine.state() >= PipelineState::Ready
    }

    /// A recording was requested and not yet stopped (it may be armed).
    pub fn recording_requested(&self) -> bool {
        self.machine.recording_requested()
    }

    pub fn last_diagnostic(&self) -> Option<&DiagnosticFrame> {
        self.last.as_ref()
    }

    /// Why the last frame was blocked. Before any frame this reports the
    /// missing frame at layer 1.
    pub fn blocking_diagnosis(&self) -> BlockingDiagnosis {
        match &self.last {
            Some(d) => d.blocking.clone(),
            None => crate::diagnostics::blocking_diagnosis(
                &RawMeasurements::default(),
                &ValidationFlags::default(),
                self.reporter.thresholds(),
            ),
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        self.reporter.thresholds()
    }

    /// Reps counted in the current recording so far.
    pub fn reps(&self) -> &[Rep] {
        self.reps.reps()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frame_number
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut D {
        &mut self.sink
    }

    pub fn into_sink(self) -> D {
        self.sink
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    /// Select the landmark to track. Switching landmarks starts a new
    /// tracking segment.
    pub fn select_tracking_point(
        &mut self,
        name: impl Into<String>,
    ) -> std::result::Result<(), CommandError> {
        let name = name.into();
        let name = name.trim();
        if name.is_empty() {
            return Err(CommandError::EmptyTrackingPoint);
        }
        if self.selection.as_deref() != Some(name) {
            tracing::debug!(point = name, "tracking point selected");
            self.selection = Some(name.to_string());
            self.motion = None;
            self.reps.interrupt();
        }
        Ok(())
    }

    pub fn clear_tracking_point(&mut self) {
        if self.selection.take().is_some() {
            tracing::debug!("tracking point cleared");
        }
        self.motion = None;
        self.reps.interrupt();
    }

    /// Legal from READY upward.
    pub fn start_recording(&mut self) -> std::result::Result<RecordingStart, CommandError> {
        let fresh = !self.machine.recording_requested();
        let started = self.machine.start_recording()?;
        if fresh {
            self.reps.reset();
            self.frames_recorded = 0;
        }
        tracing::info!(state = %self.machine.state(), result = ?started, "start recording");
        Ok(started)
    }

    /// Stop (or disarm) recording and hand over what was counted.
    pub fn stop_recording(&mut self) -> Option<RecordingSummary> {
        if !self.machine.stop_recording(&self.flags) {
            return None;
        }
        self.reps.finish();
        let summary = RecordingSummary {
            reps: self.reps.take(),
            frames_recorded: std::mem::take(&mut self.frames_recorded),
        };
        tracing::info!(
            reps = summary.reps.len(),
            frames = summary.frames_recorded,
            state = %self.machine.state(),
            "recording stopped"
        );
        Some(summary)
    }

    /// Back to INITIALIZING with every counter, the selection and any
    /// recording cleared.
    pub fn reset_session(&mut self) {
        self.machine.reset();
        self.stability.reset();
        self.reps.reset();
        self.selection = None;
        self.motion = None;
        self.flags = ValidationFlags::default();
        self.frame_number = 0;
        self.frames_recorded = 0;
        self.last = None;
        tracing::info!("session reset");
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Collects per-concern config and the diagnostics sink; validation happens
/// once in `build()`.
#[derive(Debug, Clone)]
pub struct PipelineBuilder<D = NullSink> {
    presence: PresenceCfg,
    stability: StabilityCfg,
    tracking: TrackingCfg,
    filters: FilterCfg,
    session: SessionCfg,
    reps: RepCfg,
    tracking_point: Option<String>,
    sink: D,
}

impl Default for PipelineBuilder<NullSink> {
    fn default() -> Self {
        Self {
            presence: PresenceCfg::default(),
            stability: StabilityCfg::default(),
            tracking: TrackingCfg::default(),
            filters: FilterCfg::default(),
            session: SessionCfg::default(),
            reps: RepCfg::default(),
            tracking_point: None,
            sink: NullSink,
        }
    }
}

fn unit_range(v: f32) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

fn non_negative(v: f32) -> bool {
    v.is_finite() && v >= 0.0
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

impl<D: DiagnosticsSink> PipelineBuilder<D> {
    pub fn with_presence(mut self, c: PresenceCfg) -> Self {
        self.presence = c;
        self
    }

    pub fn with_stability(mut self, c: StabilityCfg) -> Self {
        self.stability = c;
        self
    }

    pub fn with_tracking(mut self, c: TrackingCfg) -> Self {
        self.tracking = c;
        self
    }

    pub fn with_filters(mut self, c: FilterCfg) -> Self {
        self.filters = c;
        self
    }

    pub fn with_session(mut self, c: SessionCfg) -> Self {
        self.session = c;
        self
    }

    pub fn with_reps(mut self, c: RepCfg) -> Self {
        self.reps = c;
        self
    }

    /// Preselect the tracking point.
    pub fn with_tracking_point(mut self, name: impl Into<String>) -> Self {
        self.tracking_point = Some(name.into());
        self
    }

    /// Replace the diagnostics sink.
    pub fn with_sink<D2: DiagnosticsSink>(self, sink: D2) -> PipelineBuilder<D2> {
        PipelineBuilder {
            presence: self.presence,
            stability: self.stability,
            tracking: self.tracking,
            filters: self.filters,
            session: self.session,
            reps: self.reps,
            tracking_point: self.tracking_point,
            sink,
        }
    }

    fn validate(&self) -> Result<()> {
        if !unit_range(self.presence.min_usable_score) {
            return Err(invalid("min_usable_score must be within [0, 1]"));
        }
        if !unit_range(self.presence.min_keypoint_score) {
            return Err(invalid("min_keypoint_score must be within [0, 1]"));
        }
        if !unit_range(self.tracking.confidence_threshold) {
            return Err(invalid("confidence_threshold must be within [0, 1]"));
        }
        if self.stability.required_stable_frames == 0 {
            return Err(invalid("required_stable_frames must be >= 1"));
        }
        if self.stability.decay_rate == 0 {
            return Err(invalid("decay_rate must be >= 1"));
        }
        if !non_negative(self.filters.movement_threshold) {
            return Err(invalid("movement_threshold must be finite and >= 0"));
        }
        if !non_negative(self.filters.velocity_threshold_mps) {
            return Err(invalid("velocity_threshold_mps must be finite and >= 0"));
        }
        if !(self.filters.meters_per_unit.is_finite() && self.filters.meters_per_unit > 0.0) {
            return Err(invalid("meters_per_unit must be finite and > 0"));
        }
        if let Some(seg) = &self.filters.reference_segment {
            if seg.from.trim().is_empty() || seg.to.trim().is_empty() {
                return Err(invalid("reference segment keypoints must be named"));
            }
            if seg.from == seg.to {
                return Err(invalid("reference segment endpoints must differ"));
            }
            if !(seg.meters.is_finite() && seg.meters > 0.0) {
                return Err(invalid("reference segment length must be > 0"));
            }
        }
        if self.session.pose_loss_frames == 0 {
            return Err(invalid("pose_loss_frames must be >= 1"));
        }
        if !non_negative(self.reps.min_displacement) {
            return Err(invalid("min_rep_displacement must be finite and >= 0"));
        }
        if self
            .tracking_point
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err(invalid("tracking point name must not be empty"));
        }
        Ok(())
    }

    pub fn build(self) -> Result<Pipeline<D>> {
        self.validate()?;
        let thresholds = Thresholds {
            min_usable_score: self.presence.min_usable_score,
            min_keypoint_score: self.presence.min_keypoint_score,
            required_stable_frames: self.stability.required_stable_frames,
            confidence_threshold: self.tracking.confidence_threshold,
            movement_threshold: self.filters.movement_threshold,
            velocity_threshold_mps: self.filters.velocity_threshold_mps,
        };
        Ok(Pipeline {
            stability: StabilityTracker::new(
                self.stability.required_stable_frames,
                self.stability.decay_rate,
            ),
            machine: StateMachine::new(self.session),
            reporter: DiagnosticsReporter::new(thresholds),
            reps: RepCounter::new(self.reps),
            selection: self.tracking_point.map(|p| p.trim().to_string()),
            presence: self.presence,
            tracking: self.tracking,
            filters: self.filters,
            motion: None,
            flags: ValidationFlags::default(),
            frame_number: 0,
            frames_recorded: 0,
            last: None,
            sink: self.sink,
        })
    }
}
