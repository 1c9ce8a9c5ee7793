//! Replay command: config mapping, pipeline assembly and report output.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use vbt_core::error::{Report, VbtError};
use vbt_core::source::ReplaySource;
use vbt_core::{
    DiagnosticFrame, DiagnosticsSink, FeedMode, PipelineBuilder, RecordPolicy, RunParams,
    RunReport, TracingSink,
};

/// Read, parse and validate the config; built-in defaults without a path.
///
/// Every failure surfaces as `VbtError::Config` so it maps to the config
/// exit code.
pub fn load_config(path: Option<&Path>) -> eyre::Result<vbt_config::Config> {
    let Some(path) = path else {
        return Ok(vbt_config::Config::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| {
        Report::new(VbtError::Config(format!("read {}: {e}", path.display())))
    })?;
    let cfg: vbt_config::Config = toml::from_str(&text).map_err(|e| {
        Report::new(VbtError::Config(format!("parse {}: {e}", path.display())))
    })?;
    cfg.validate()
        .map_err(|e| Report::new(VbtError::Config(e.to_string())))?;
    Ok(cfg)
}

#[derive(Debug, Clone)]
pub struct ReplayArgs<'a> {
    pub frames: &'a Path,
    pub track: Option<&'a str>,
    pub record: RecordPolicy,
    pub paced: bool,
    pub fps: Option<u32>,
    pub max_frames: Option<u64>,
    pub diagnostics: bool,
}

/// Writes each snapshot as one JSON line.
///
/// A write failure is logged once and further snapshots are skipped; the
/// pipeline itself never sees the error.
pub struct JsonlSink<W: Write> {
    out: W,
    failed: bool,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, failed: false }
    }
}

impl<W: Write> DiagnosticsSink for JsonlSink<W> {
    fn record(&mut self, frame: &DiagnosticFrame) {
        if self.failed {
            return;
        }
        let res = serde_json::to_writer(&mut self.out, frame)
            .map_err(std::io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"));
        if let Err(e) = res {
            tracing::warn!(error = %e, "diagnostic output failed; disabling");
            self.failed = true;
        }
    }
}

pub fn run_replay(
    cfg: &vbt_config::Config,
    args: &ReplayArgs<'_>,
    shutdown: &AtomicBool,
) -> eyre::Result<RunReport> {
    let detections = vbt_config::load_pose_csv(args.frames)?;
    tracing::info!(
        path = %args.frames.display(),
        frames = detections.len(),
        "pose trace loaded"
    );

    let mut builder: PipelineBuilder = PipelineBuilder::from(cfg);
    if let Some(name) = args.track {
        builder = builder.with_tracking_point(name);
    }

    let params = RunParams {
        mode: if args.paced {
            FeedMode::Paced(args.fps.unwrap_or(cfg.replay.fps))
        } else {
            FeedMode::Direct
        },
        record: args.record,
        stall_ms: cfg.replay.stall_ms,
        max_frames: args.max_frames,
        ..RunParams::default()
    };
    let source = ReplaySource::new(detections);

    if args.diagnostics {
        let stdout = std::io::stdout();
        drive(builder.with_sink(JsonlSink::new(stdout.lock())), source, &params, shutdown)
    } else {
        drive(builder.with_sink(TracingSink), source, &params, shutdown)
    }
}

fn drive<D: DiagnosticsSink>(
    builder: PipelineBuilder<D>,
    source: ReplaySource,
    params: &RunParams,
    shutdown: &AtomicBool,
) -> eyre::Result<RunReport> {
    let mut pipeline = builder.build()?;
    vbt_core::runner::run(source, &mut pipeline, params, shutdown)
}

/// Multi-line text summary for the terminal.
pub fn render_report(r: &RunReport) -> String {
    use std::fmt::Write as _;

    let mut s = String::new();
    let _ = writeln!(
        s,
        "Replay complete: {} frames ({} missed, {} dropped)",
        r.frames, r.missed, r.dropped
    );
    let _ = writeln!(s, "Final state: {}", r.final_state);
    match r.recording_started_at {
        Some(n) => {
            let _ = writeln!(
                s,
                "Recording started at frame {n}, {} frames recorded",
                r.frames_recorded
            );
        }
        None => s.push_str("Recording never started\n"),
    }
    let _ = writeln!(s, "Reps: {}", r.reps.len());
    for rep in &r.reps {
        let _ = writeln!(
            s,
            "  #{} travel {:.3} mean {:.2} m/s peak {:.2} m/s (frames {}-{})",
            rep.index,
            rep.travel,
            rep.mean_velocity_mps,
            rep.peak_velocity_mps,
            rep.first_frame,
            rep.last_frame
        );
    }
    let _ = write!(s, "Blocking: {}", r.blocking.summary());
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbt_core::mocks::SyntheticLift;
    use vbt_core::{MemorySink, Pipeline};

    #[test]
    fn jsonl_sink_writes_one_line_per_frame() {
        let mut buf = Vec::new();
        let mut p = Pipeline::builder()
            .with_sink(JsonlSink::new(&mut buf))
            .build()
            .expect("build");
        for d in SyntheticLift::new(1).detections().iter().take(3) {
            p.process_frame(d.frame());
        }
        drop(p);
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let v: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(v["frame_number"], 1);
        assert_eq!(v["state"], "STABILIZING");
    }

    #[test]
    fn missing_config_path_means_defaults() {
        let cfg = load_config(None).expect("defaults");
        assert_eq!(cfg.stability.required_stable_frames, 5);
    }

    #[test]
    fn report_text_mentions_reps_and_state() {
        let mut p = Pipeline::builder()
            .with_tracking_point(SyntheticLift::POINT)
            .with_sink(MemorySink::default())
            .build()
            .expect("build");
        let report = vbt_core::runner::run(
            SyntheticLift::new(2).into_source(),
            &mut p,
            &RunParams {
                record: RecordPolicy::WhenReady,
                ..RunParams::default()
            },
            &AtomicBool::new(false),
        )
        .expect("run");
        let text = render_report(&report);
        assert!(text.contains("Reps: 2"), "{text}");
        assert!(text.contains("Final state: RECORDING"), "{text}");
        assert!(text.contains("Recording started at frame 5"), "{text}");
    }
}
