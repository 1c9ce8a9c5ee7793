use crate::state::PipelineState;
use thiserror::Error;

/// Failures of the replay/feed machinery around the pipeline.
///
/// Per-frame outcomes are never errors; they surface as validation flags
/// and a blocking diagnosis instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VbtError {
    #[error("pose source error: {0}")]
    Source(String),
    #[error("pose source stalled: no frame for {0} ms")]
    SourceStalled(u64),
    #[error("run interrupted")]
    Interrupted,
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Rejected UI commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("cannot start recording while {state}; wait for READY")]
    NotReady { state: PipelineState },
    #[error("tracking point name must not be empty")]
    EmptyTrackingPoint,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
