//! Quick Start Example
//!
//! Feeds a synthetic three-rep lift through the pipeline frame by frame,
//! starts recording as soon as the pipeline is READY and prints every state
//! change and completed rep.
//!
//! Run with `cargo run -p vbt_core --example quick_start`.
//!
//! # Related Examples
//!
//! - [`custom_sink.rs`](custom_sink.rs): collecting diagnostic snapshots.
//! - [`simulated_camera.rs`](simulated_camera.rs): implementing `PoseSource`.
fn main() -> Result<(), eyre::Report> {
    use vbt_core::mocks::SyntheticLift;
    use vbt_core::{Pipeline, PipelineState};

    let mut pipeline = Pipeline::builder()
        .with_tracking_point(SyntheticLift::POINT)
        .build()?;

    for detection in SyntheticLift::new(3).detections() {
        let out = pipeline.process_frame(detection.frame());
        if out.transitioned() {
            println!(
                "frame {:>3}: {} -> {}",
                out.diagnostic.frame_number, out.previous_state, out.state
            );
        }
        if pipeline.can_start_recording() && !pipeline.recording_requested() {
            pipeline.start_recording()?;
        }
        if let Some(rep) = out.rep {
            println!(
                "rep {}: mean {:.2} m/s, peak {:.2} m/s",
                rep.index, rep.mean_velocity_mps, rep.peak_velocity_mps
            );
        }
    }

    if pipeline.state() == PipelineState::Recording
        && let Some(summary) = pipeline.stop_recording()
    {
        println!(
            "recorded {} frames, {} reps",
            summary.frames_recorded,
            summary.reps.len()
        );
    }
    println!("blocking: {}", pipeline.blocking_diagnosis().summary());
    Ok(())
}
