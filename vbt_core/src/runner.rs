use crate::diagnostics::{BlockingDiagnosis, DiagnosticsSink};
use crate::error::{CommandError, Result, VbtError};
use crate::feed::FrameFeed;
use crate::pipeline::Pipeline;
use crate::reps::Rep;
use crate::state::PipelineState;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use vbt_traits::clock::{Clock, MonotonicClock};
use vbt_traits::{Detection, PoseFrame, PoseSource};

/// How frames reach the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Pull every detection on the calling thread; nothing is dropped.
    Direct,
    /// Background `FrameFeed` at the given fps; stale frames are dropped.
    Paced(u32),
}

/// When the runner issues `start_recording` on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordPolicy {
    #[default]
    Off,
    /// As soon as the pipeline reaches READY.
    WhenReady,
    /// At the given 1-based frame number.
    AtFrame(u64),
}

#[derive(Debug, Clone)]
pub struct RunParams {
    pub mode: FeedMode,
    pub record: RecordPolicy,
    /// Per-read timeout handed to the source.
    pub source_timeout_ms: u64,
    /// Abort a paced run when no frame arrived for this long.
    pub stall_ms: u64,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            mode: FeedMode::Direct,
            record: RecordPolicy::Off,
            source_timeout_ms: 100,
            stall_ms: 1000,
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub frame: u64,
    pub from: PipelineState,
    pub to: PipelineState,
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RunReport {
    pub frames: u64,
    /// Frames with no detection.
    pub missed: u64,
    /// Frames the feed dropped before the pipeline saw them.
    pub dropped: u64,
    pub transitions: Vec<Transition>,
    pub final_state: PipelineState,
    pub recording_started_at: Option<u64>,
    pub frames_recorded: u64,
    pub reps: Vec<Rep>,
    pub blocking: BlockingDiagnosis,
}

/// Stall threshold for a paced run.
///
/// Never shorter than the configured `stall_ms`, than four source timeouts
/// (a source may block for one timeout per read) or than two frame periods.
#[inline]
fn compute_stall_threshold_ms(source_timeout_ms: u64, period_ms: u64, stall_ms: u64) -> u64 {
    stall_ms
        .max(fast_threshold_ms(source_timeout_ms))
        .max(two_periods_ms(period_ms))
        .max(1)
}

#[inline]
fn fast_threshold_ms(source_timeout_ms: u64) -> u64 {
    source_timeout_ms.saturating_mul(4)
}

/// Tolerate one missed frame.
#[inline]
fn two_periods_ms(period_ms: u64) -> u64 {
    period_ms.saturating_mul(2)
}

#[inline]
fn stalled_now(elapsed_ms: u64, stalled_ms: u64, threshold_ms: u64) -> bool {
    elapsed_ms >= threshold_ms && stalled_ms > threshold_ms
}

/// Drive `pipeline` from `source` until end of stream, `max_frames`, a stall
/// or `shutdown`. Any open recording is stopped at the end and its reps
/// land in the report.
pub fn run<P, D>(
    source: P,
    pipeline: &mut Pipeline<D>,
    params: &RunParams,
    shutdown: &AtomicBool,
) -> Result<RunReport>
where
    P: PoseSource + Send + 'static,
    D: DiagnosticsSink,
{
    run_with_clock(source, pipeline, params, shutdown, MonotonicClock::new())
}

pub fn run_with_clock<P, D, C>(
    source: P,
    pipeline: &mut Pipeline<D>,
    params: &RunParams,
    shutdown: &AtomicBool,
    clock: C,
) -> Result<RunReport>
where
    P: PoseSource + Send + 'static,
    D: DiagnosticsSink,
    C: Clock + Clone + Send + Sync + 'static,
{
    let mut driver = Driver {
        pipeline,
        params,
        report: RunReport::default(),
        auto_started: false,
    };
    match params.mode {
        FeedMode::Direct => driver.direct(source, shutdown)?,
        FeedMode::Paced(fps) => driver.paced(source, fps, shutdown, clock)?,
    }
    Ok(driver.finish())
}

struct Driver<'a, D: DiagnosticsSink> {
    pipeline: &'a mut Pipeline<D>,
    params: &'a RunParams,
    report: RunReport,
    auto_started: bool,
}

impl<D: DiagnosticsSink> Driver<'_, D> {
    fn done(&self) -> bool {
        self.params
            .max_frames
            .is_some_and(|max| self.report.frames >= max)
    }

    fn check_shutdown(shutdown: &AtomicBool) -> Result<()> {
        if shutdown.load(Ordering::Relaxed) {
            tracing::warn!("run interrupted");
            return Err(crate::error::Report::new(VbtError::Interrupted));
        }
        Ok(())
    }

    fn direct<P: PoseSource>(&mut self, mut source: P, shutdown: &AtomicBool) -> Result<()> {
        let timeout = Duration::from_millis(self.params.source_timeout_ms);
        tracing::info!(mode = "direct", "replay start");
        while !self.done() {
            Self::check_shutdown(shutdown)?;
            match source.next_frame(timeout) {
                Ok(Detection::EndOfStream) => break,
                Ok(d) => self.step(d.frame()),
                Err(e) => {
                    tracing::error!(error = %e, "pose source failed");
                    return Err(crate::error::Report::new(VbtError::Source(e.to_string())));
                }
            }
        }
        Ok(())
    }

    fn paced<P, C>(&mut self, source: P, fps: u32, shutdown: &AtomicBool, clock: C) -> Result<()>
    where
        P: PoseSource + Send + 'static,
        C: Clock + Clone + Send + Sync + 'static,
    {
        let period_us = crate::util::period_us(fps);
        let period_ms = crate::util::period_ms(fps);
        let threshold_ms =
            compute_stall_threshold_ms(self.params.source_timeout_ms, period_ms, self.params.stall_ms);
        let start = clock.now();
        let feed = FrameFeed::spawn(
            source,
            fps,
            Duration::from_millis(self.params.source_timeout_ms),
            clock.clone(),
        );
        tracing::info!(mode = "paced", fps, threshold_ms, "replay start");

        while !self.done() {
            Self::check_shutdown(shutdown)?;
            match feed.next(Duration::from_micros(period_us)) {
                Some(Detection::EndOfStream) => break,
                Some(d) => self.step(d.frame()),
                None => {
                    let elapsed_ms = clock.ms_since(start);
                    let stalled_ms = feed.stalled_for_now();
                    if stalled_now(elapsed_ms, stalled_ms, threshold_ms) {
                        tracing::error!(stalled_ms, threshold_ms, "pose source stalled");
                        return Err(crate::error::Report::new(VbtError::SourceStalled(
                            stalled_ms,
                        )));
                    }
                }
            }
        }
        self.report.dropped = feed.dropped();
        Ok(())
    }

    fn step(&mut self, frame: Option<&PoseFrame>) {
        let out = self.pipeline.process_frame(frame);
        let n = out.diagnostic.frame_number;
        self.report.frames += 1;
        if frame.is_none() {
            self.report.missed += 1;
        }
        if out.transitioned() {
            self.report.transitions.push(Transition {
                frame: n,
                from: out.previous_state,
                to: out.state,
            });
        }
        if let Some(rep) = &out.rep {
            tracing::info!(
                index = rep.index,
                mean_mps = rep.mean_velocity_mps,
                peak_mps = rep.peak_velocity_mps,
                "rep"
            );
        }

        let wants_start = match self.params.record {
            RecordPolicy::Off => false,
            RecordPolicy::WhenReady => self.pipeline.can_start_recording(),
            RecordPolicy::AtFrame(at) => n == at,
        };
        if wants_start && !self.auto_started {
            match self.pipeline.start_recording() {
                Ok(_) => self.auto_started = true,
                Err(e @ CommandError::NotReady { .. }) => {
                    tracing::warn!(frame = n, error = %e, "auto record rejected");
                    // AtFrame only gets one chance.
                    self.auto_started = matches!(self.params.record, RecordPolicy::AtFrame(_));
                }
                Err(e) => tracing::warn!(frame = n, error = %e, "auto record rejected"),
            }
        }
        if self.report.recording_started_at.is_none()
            && self.pipeline.state() == PipelineState::Recording
        {
            self.report.recording_started_at = Some(n);
        }
    }

    fn finish(mut self) -> RunReport {
        self.report.final_state = self.pipeline.state();
        self.report.blocking = self.pipeline.blocking_diagnosis();
        if let Some(summary) = self.pipeline.stop_recording() {
            self.report.reps = summary.reps;
            self.report.frames_recorded = summary.frames_recorded;
        }
        tracing::info!(
            frames = self.report.frames,
            dropped = self.report.dropped,
            reps = self.report.reps.len(),
            final_state = %self.report.final_state,
            "replay finished"
        );
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::{compute_stall_threshold_ms, fast_threshold_ms, stalled_now, two_periods_ms};

    #[test]
    fn fast_threshold_scales_by_four() {
        assert_eq!(fast_threshold_ms(0), 0);
        assert_eq!(fast_threshold_ms(1), 4);
        assert_eq!(fast_threshold_ms(150), 600);
    }

    #[test]
    fn two_periods_is_double_period() {
        assert_eq!(two_periods_ms(1), 2);
        assert_eq!(two_periods_ms(33), 66);
    }

    #[test]
    fn threshold_takes_the_largest_bound() {
        assert_eq!(compute_stall_threshold_ms(100, 33, 1000), 1000);
        assert_eq!(compute_stall_threshold_ms(500, 33, 1000), 2000);
        assert_eq!(compute_stall_threshold_ms(1, 1000, 50), 2000);
        assert_eq!(compute_stall_threshold_ms(0, 1, 0), 2);
    }

    #[test]
    fn stall_needs_both_elapsed_and_silence() {
        assert!(!stalled_now(10, 500, 100));
        assert!(!stalled_now(500, 100, 100));
        assert!(stalled_now(500, 101, 100));
    }
}
