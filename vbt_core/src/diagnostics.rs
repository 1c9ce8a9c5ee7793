//! Per-frame diagnostics: a read-only snapshot of every stage plus the first
//! blocking condition.
//!
//! Nothing here feeds back into flags or state. The pipeline builds one
//! [`DiagnosticFrame`] per frame and hands it to its [`DiagnosticsSink`].

use crate::state::{PipelineState, ValidationFlags};
use crate::tracking_point::TrackingStatus;
use serde::Serialize;
use std::collections::VecDeque;
use vbt_traits::Point;

/// Validation layers in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Layer {
    #[serde(rename = "LAYER 1: Human Presence")]
    HumanPresence,
    #[serde(rename = "LAYER 2: Stability")]
    Stability,
    #[serde(rename = "LAYER 3: Tracking Point")]
    TrackingPoint,
    #[serde(rename = "LAYER 4: Movement")]
    Movement,
    #[serde(rename = "LAYER 5: Velocity")]
    Velocity,
}

impl Layer {
    pub const ALL: [Layer; 5] = [
        Layer::HumanPresence,
        Layer::Stability,
        Layer::TrackingPoint,
        Layer::Movement,
        Layer::Velocity,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::HumanPresence => "LAYER 1: Human Presence",
            Self::Stability => "LAYER 2: Stability",
            Self::TrackingPoint => "LAYER 3: Tracking Point",
            Self::Movement => "LAYER 4: Movement",
            Self::Velocity => "LAYER 5: Velocity",
        }
    }

    /// The flag this layer produces.
    pub fn passed(&self, flags: &ValidationFlags) -> bool {
        match self {
            Self::HumanPresence => flags.frame_usable,
            Self::Stability => flags.frame_stable,
            Self::TrackingPoint => flags.frame_trackable,
            Self::Movement => flags.frame_valid,
            Self::Velocity => flags.frame_countable,
        }
    }
}

impl core::fmt::Display for Layer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayerStatus {
    pub layer: Layer,
    pub passed: bool,
}

/// Raw values the stages computed on one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RawMeasurements {
    pub timestamp_ms: Option<u64>,
    pub frame_present: bool,
    pub keypoint_count: usize,
    pub max_score: Option<f32>,
    /// Keypoints at or above the strict `min_keypoint_score`.
    pub valid_keypoint_count: usize,
    pub stable_frames: u32,
    pub tracking_point: Option<String>,
    pub tracking_status: Option<TrackingStatus>,
    pub position: Option<Point>,
    pub displacement: Option<f32>,
    pub first_sample: bool,
    pub velocity_mps: Option<f32>,
    pub meters_per_unit: f32,
}

/// Thresholds in effect, copied into every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub min_usable_score: f32,
    pub min_keypoint_score: f32,
    pub required_stable_frames: u32,
    pub confidence_threshold: f32,
    pub movement_threshold: f32,
    pub velocity_threshold_mps: f32,
}

/// First failing layer with the variable responsible.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BlockingDiagnosis {
    pub blocked: bool,
    pub blocking_layer: Option<Layer>,
    pub blocking_variable: Option<&'static str>,
    pub expected_value: Option<String>,
    pub actual_value: Option<String>,
}

impl BlockingDiagnosis {
    fn at(layer: Layer, variable: &'static str, expected: String, actual: String) -> Self {
        Self {
            blocked: true,
            blocking_layer: Some(layer),
            blocking_variable: Some(variable),
            expected_value: Some(expected),
            actual_value: Some(actual),
        }
    }

    /// One-line human summary, e.g. for log output.
    pub fn summary(&self) -> String {
        match (&self.blocking_layer, self.blocking_variable) {
            (Some(layer), Some(var)) => format!(
                "{layer}: {var} expected {}, got {}",
                self.expected_value.as_deref().unwrap_or("?"),
                self.actual_value.as_deref().unwrap_or("?"),
            ),
            _ => "not blocked".to_string(),
        }
    }
}

fn opt(v: Option<f32>) -> String {
    v.map_or_else(|| "none".to_string(), |v| format!("{v:.4}"))
}

/// Evaluate the layers 1 to 5 in order and name the first failure.
///
/// Pure: identical inputs always yield the identical diagnosis.
pub fn blocking_diagnosis(
    m: &RawMeasurements,
    flags: &ValidationFlags,
    t: &Thresholds,
) -> BlockingDiagnosis {
    if !flags.frame_usable {
        return if !m.frame_present {
            BlockingDiagnosis::at(
                Layer::HumanPresence,
                "frame",
                "pose frame".into(),
                "none".into(),
            )
        } else if m.keypoint_count == 0 {
            BlockingDiagnosis::at(
                Layer::HumanPresence,
                "keypoint_count",
                ">= 1".into(),
                "0".into(),
            )
        } else {
            BlockingDiagnosis::at(
                Layer::HumanPresence,
                "max_score",
                format!(">= {}", t.min_usable_score),
                opt(m.max_score),
            )
        };
    }
    if !flags.frame_stable {
        return BlockingDiagnosis::at(
            Layer::Stability,
            "stable_frames",
            format!(">= {}", t.required_stable_frames),
            m.stable_frames.to_string(),
        );
    }
    if !flags.frame_trackable {
        let name = m.tracking_point.as_deref().unwrap_or("none");
        return match m.tracking_status {
            Some(TrackingStatus::LowConfidence { score }) => BlockingDiagnosis::at(
                Layer::TrackingPoint,
                "tracking_score",
                format!(">= {}", t.confidence_threshold),
                format!("{score:.4}"),
            ),
            Some(TrackingStatus::Missing) => BlockingDiagnosis::at(
                Layer::TrackingPoint,
                "tracking_point",
                format!("{name} in frame"),
                "missing".into(),
            ),
            _ => BlockingDiagnosis::at(
                Layer::TrackingPoint,
                "tracking_point",
                "selected keypoint".into(),
                name.into(),
            ),
        };
    }
    if !flags.frame_valid {
        return if m.first_sample || m.displacement.is_none() {
            BlockingDiagnosis::at(
                Layer::Movement,
                "previous_position",
                "prior sample".into(),
                "none".into(),
            )
        } else {
            BlockingDiagnosis::at(
                Layer::Movement,
                "displacement",
                format!(">= {}", t.movement_threshold),
                opt(m.displacement),
            )
        };
    }
    if !flags.frame_countable {
        return BlockingDiagnosis::at(
            Layer::Velocity,
            "velocity_mps",
            format!(">= {}", t.velocity_threshold_mps),
            opt(m.velocity_mps),
        );
    }
    BlockingDiagnosis::default()
}

/// Immutable per-frame snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticFrame {
    pub frame_number: u64,
    pub measurements: RawMeasurements,
    pub thresholds: Thresholds,
    pub flags: ValidationFlags,
    pub layers: [LayerStatus; 5],
    pub state: PipelineState,
    pub previous_state: PipelineState,
    pub blocking: BlockingDiagnosis,
}

impl DiagnosticFrame {
    #[inline]
    pub fn transitioned(&self) -> bool {
        self.state != self.previous_state
    }
}

/// Builds snapshots against a fixed set of thresholds.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsReporter {
    thresholds: Thresholds,
}

impl DiagnosticsReporter {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn observe(
        &self,
        frame_number: u64,
        measurements: RawMeasurements,
        flags: ValidationFlags,
        state: PipelineState,
        previous_state: PipelineState,
    ) -> DiagnosticFrame {
        let blocking = blocking_diagnosis(&measurements, &flags, &self.thresholds);
        let layers = Layer::ALL.map(|layer| LayerStatus {
            layer,
            passed: layer.passed(&flags),
        });
        DiagnosticFrame {
            frame_number,
            measurements,
            thresholds: self.thresholds,
            flags,
            layers,
            state,
            previous_state,
            blocking,
        }
    }
}

/// Receives every snapshot the owning pipeline produces.
pub trait DiagnosticsSink {
    fn record(&mut self, frame: &DiagnosticFrame);
}

impl<T: DiagnosticsSink + ?Sized> DiagnosticsSink for &mut T {
    fn record(&mut self, frame: &DiagnosticFrame) {
        (**self).record(frame);
    }
}

impl<T: DiagnosticsSink + ?Sized> DiagnosticsSink for Box<T> {
    fn record(&mut self, frame: &DiagnosticFrame) {
        (**self).record(frame);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    #[inline]
    fn record(&mut self, _frame: &DiagnosticFrame) {}
}

/// Keeps the most recent `capacity` snapshots.
#[derive(Debug, Clone)]
pub struct MemorySink {
    capacity: usize,
    frames: VecDeque<DiagnosticFrame>,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            frames: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn frames(&self) -> impl ExactSizeIterator<Item = &DiagnosticFrame> {
        self.frames.iter()
    }

    pub fn last(&self) -> Option<&DiagnosticFrame> {
        self.frames.back()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl DiagnosticsSink for MemorySink {
    fn record(&mut self, frame: &DiagnosticFrame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame.clone());
    }
}

/// Emits `tracing` events: transitions at info, every frame at trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&mut self, f: &DiagnosticFrame) {
        if f.transitioned() {
            tracing::info!(
                frame = f.frame_number,
                from = %f.previous_state,
                to = %f.state,
                blocking = ?f.blocking.blocking_layer.map(|l| l.label()),
                "state transition"
            );
        }
        tracing::trace!(
            frame = f.frame_number,
            state = %f.state,
            usable = f.flags.frame_usable,
            stable = f.flags.frame_stable,
            stable_frames = f.measurements.stable_frames,
            trackable = f.flags.frame_trackable,
            valid = f.flags.frame_valid,
            countable = f.flags.frame_countable,
            velocity_mps = ?f.measurements.velocity_mps,
            "frame"
        );
    }
}
