#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core VBT detection pipeline (camera-agnostic).
//!
//! Turns a stream of pose frames into a tracking state, per-frame validation
//! flags and a diagnostic snapshot. Keypoints arrive through
//! `vbt_traits::PoseSource` or straight into [`Pipeline::process_frame`].
//!
//! ## Stages
//!
//! 1. **Human presence** (`presence`): any keypoint above `min_usable_score`
//! 2. **Stability** (`stability`): decaying counter over stage 1 only
//! 3. **Tracking point** (`tracking_point`): selected landmark, gated on stability
//! 4. **Movement** (`filters`): displacement from the motion reference
//! 5. **Velocity** (`filters`): m/s above threshold
//!
//! The `state` machine consumes the five flags; `diagnostics` observes them
//! without feeding back. `reps` counts repetitions while recording.

pub mod config;
pub mod conversions;
pub mod diagnostics;
pub mod error;
pub mod feed;
pub mod filters;
pub mod mocks;
pub mod pipeline;
pub mod presence;
pub mod reps;
pub mod runner;
pub mod source;
pub mod stability;
pub mod state;
pub mod tracking_point;
pub mod util;

pub use config::{
    FilterCfg, PoseLossPolicy, PresenceCfg, RecordingStartPolicy, ReferenceSegment, RepCfg,
    RepDirection, SessionCfg, StabilityCfg, TrackingCfg,
};
pub use diagnostics::{
    BlockingDiagnosis, DiagnosticFrame, DiagnosticsSink, Layer, MemorySink, NullSink,
    RawMeasurements, Thresholds, TracingSink,
};
pub use error::{BuildError, CommandError, Result, VbtError};
pub use pipeline::{FrameOutcome, Pipeline, PipelineBuilder, RecordingSummary};
pub use reps::Rep;
pub use runner::{FeedMode, RecordPolicy, RunParams, RunReport};
pub use state::{PipelineState, RecordingStart, ValidationFlags};
pub use vbt_traits::{Detection, Keypoint, Point, PoseFrame, PoseSource};
