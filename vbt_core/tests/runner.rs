use rstest::rstest;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use vbt_core::error::VbtError;
use vbt_core::mocks::{FailingSource, SyntheticLift};
use vbt_core::runner::{self, FeedMode, RecordPolicy, RunParams};
use vbt_core::source::ReplaySource;
use vbt_core::{Detection, Pipeline, PipelineState};
use vbt_traits::ManualClock;

fn pipeline() -> Pipeline {
    Pipeline::builder()
        .with_tracking_point(SyntheticLift::POINT)
        .build()
        .expect("build")
}

#[test]
fn direct_replay_counts_reps_when_ready() {
    let mut p = pipeline();
    let params = RunParams {
        record: RecordPolicy::WhenReady,
        ..RunParams::default()
    };
    let report = runner::run(
        SyntheticLift::new(3).into_source(),
        &mut p,
        &params,
        &AtomicBool::new(false),
    )
    .expect("run");
    assert_eq!(report.frames, 10 + 90 + 10);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.reps.len(), 3);
    assert_eq!(report.recording_started_at, Some(5));
    assert_eq!(report.final_state, PipelineState::Recording);
    assert_eq!(
        report.transitions.first().map(|t| (t.frame, t.to)),
        Some((1, PipelineState::Stabilizing))
    );
    // Recording was stopped by the runner.
    assert_eq!(p.state(), PipelineState::Tracking);
}

#[rstest]
#[case(RecordPolicy::Off, 0)]
#[case(RecordPolicy::AtFrame(2), 0)]
#[case(RecordPolicy::AtFrame(20), 2)]
fn record_policies(#[case] record: RecordPolicy, #[case] reps: usize) {
    let mut p = pipeline();
    let params = RunParams {
        record,
        ..RunParams::default()
    };
    let report = runner::run(
        SyntheticLift::new(2).into_source(),
        &mut p,
        &params,
        &AtomicBool::new(false),
    )
    .expect("run");
    assert_eq!(report.reps.len(), reps);
}

#[test]
fn missed_detections_are_counted() {
    let mut p = pipeline();
    let source = ReplaySource::new(vec![Detection::Missed; 4]);
    let report = runner::run(source, &mut p, &RunParams::default(), &AtomicBool::new(false))
        .expect("run");
    assert_eq!(report.frames, 4);
    assert_eq!(report.missed, 4);
    assert_eq!(report.final_state, PipelineState::Initializing);
    assert_eq!(report.blocking.blocking_variable, Some("frame"));
}

#[test]
fn max_frames_stops_early() {
    let mut p = pipeline();
    let params = RunParams {
        max_frames: Some(7),
        ..RunParams::default()
    };
    let report = runner::run(
        SyntheticLift::new(1).into_source(),
        &mut p,
        &params,
        &AtomicBool::new(false),
    )
    .expect("run");
    assert_eq!(report.frames, 7);
}

#[test]
fn shutdown_flag_interrupts() {
    let mut p = pipeline();
    let err = runner::run(
        SyntheticLift::new(1).into_source(),
        &mut p,
        &RunParams::default(),
        &AtomicBool::new(true),
    )
    .expect_err("interrupted");
    assert_eq!(err.downcast_ref::<VbtError>(), Some(&VbtError::Interrupted));
}

#[test]
fn direct_source_error_is_typed() {
    let mut p = pipeline();
    let err = runner::run(
        FailingSource::default(),
        &mut p,
        &RunParams::default(),
        &AtomicBool::new(false),
    )
    .expect_err("source error");
    match err.downcast_ref::<VbtError>() {
        Some(VbtError::Source(msg)) => assert!(msg.contains("camera unavailable")),
        other => panic!("expected Source, got {other:?}"),
    }
}

#[test]
fn paced_replay_sees_every_frame_or_counts_it_dropped() {
    let mut p = pipeline();
    let params = RunParams {
        mode: FeedMode::Paced(500),
        record: RecordPolicy::WhenReady,
        ..RunParams::default()
    };
    let report = runner::run(
        SyntheticLift::new(1).into_source(),
        &mut p,
        &params,
        &AtomicBool::new(false),
    )
    .expect("run");
    assert_eq!(report.frames + report.dropped, 10 + 30 + 10);
}

#[test]
fn paced_failing_source_stalls() {
    let mut p = pipeline();
    let params = RunParams {
        mode: FeedMode::Paced(100),
        source_timeout_ms: 5,
        stall_ms: 50,
        ..RunParams::default()
    };
    // The manual clock advances one period per failed read, so the stall
    // threshold is crossed without waiting in real time.
    let err = runner::run_with_clock(
        FailingSource {
            delay: Duration::from_millis(1),
        },
        &mut p,
        &params,
        &AtomicBool::new(false),
        ManualClock::new(),
    )
    .expect_err("stall");
    match err.downcast_ref::<VbtError>() {
        Some(VbtError::SourceStalled(ms)) => assert!(*ms > 50),
        other => panic!("expected SourceStalled, got {other:?}"),
    }
    assert_eq!(p.frames_processed(), 0);
}
