//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;
use vbt_core::RecordPolicy;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "vbt", version, about = "Velocity-based training pose pipeline")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging] level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline over a recorded pose trace
    Replay {
        /// Pose trace CSV (frame,timestamp_ms,keypoint,x,y,score)
        #[arg(long, value_name = "FILE")]
        frames: PathBuf,
        /// Tracking point to select before the first frame (overrides [tracking] point)
        #[arg(long, value_name = "KEYPOINT")]
        track: Option<String>,
        /// Auto-record policy: off, ready, or frame:N
        #[arg(long, value_name = "POLICY", default_value = "off", value_parser = parse_record)]
        record: RecordPolicy,
        /// Feed frames from a background thread at --fps, dropping stale ones
        #[arg(long, action = ArgAction::SetTrue)]
        paced: bool,
        /// Pacing rate for --paced (overrides [replay] fps)
        #[arg(long, value_name = "FPS")]
        fps: Option<u32>,
        /// Stop after this many frames
        #[arg(long, value_name = "N")]
        max_frames: Option<u64>,
        /// Print every per-frame diagnostic snapshot as a JSON line on stdout
        #[arg(long, action = ArgAction::SetTrue)]
        diagnostics: bool,
    },
    /// Load, validate and build the pipeline from the config, then exit
    CheckConfig,
}

/// Parse `off`, `ready` or `frame:N` (N >= 1).
pub fn parse_record(s: &str) -> Result<RecordPolicy, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "off" => Ok(RecordPolicy::Off),
        "ready" => Ok(RecordPolicy::WhenReady),
        other => {
            let n = other
                .strip_prefix("frame:")
                .ok_or_else(|| format!("expected off, ready or frame:N, got {s:?}"))?;
            match n.parse::<u64>() {
                Ok(0) => Err("frame:N is 1-based".to_string()),
                Ok(n) => Ok(RecordPolicy::AtFrame(n)),
                Err(e) => Err(format!("invalid frame number {n:?}: {e}")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn record_policy_parsing() {
        assert_eq!(parse_record("off"), Ok(RecordPolicy::Off));
        assert_eq!(parse_record("READY"), Ok(RecordPolicy::WhenReady));
        assert_eq!(parse_record("frame:12"), Ok(RecordPolicy::AtFrame(12)));
        assert!(parse_record("frame:0").is_err());
        assert!(parse_record("frame:x").is_err());
        assert!(parse_record("later").is_err());
    }
}
