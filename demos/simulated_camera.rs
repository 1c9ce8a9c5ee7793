//! Example: Simulated Camera Implementation
//!
//! A `PoseSource` that produces a wrist bobbing up and down, replayed in
//! paced mode through the background frame feed.

use std::sync::atomic::AtomicBool;
use std::time::Duration;
use vbt_core::runner::{self, FeedMode, RecordPolicy, RunParams};
use vbt_core::{Detection, Keypoint, Pipeline, PoseFrame, PoseSource};

pub struct SimCamera {
    seq: u64,
    frames: u64,
}

impl PoseSource for SimCamera {
    fn next_frame(
        &mut self,
        _timeout: Duration,
    ) -> Result<Detection, Box<dyn std::error::Error + Send + Sync>> {
        if self.seq >= self.frames {
            return Ok(Detection::EndOfStream);
        }
        let t = self.seq as f32 / 30.0;
        let y = 0.5 + 0.1 * (t * std::f32::consts::PI).cos();
        let frame = PoseFrame::new(
            self.seq,
            self.seq * 33,
            vec![
                Keypoint::new("nose", 0.5, 0.2, 0.9),
                Keypoint::new("right_wrist", 0.6, y, 0.85),
            ],
        );
        self.seq += 1;
        Ok(Detection::Pose(frame))
    }
}

fn main() -> Result<(), eyre::Report> {
    let mut pipeline = Pipeline::builder()
        .with_tracking_point("right_wrist")
        .build()?;
    let params = RunParams {
        mode: FeedMode::Paced(60),
        record: RecordPolicy::WhenReady,
        ..RunParams::default()
    };
    let report = runner::run(
        SimCamera { seq: 0, frames: 300 },
        &mut pipeline,
        &params,
        &AtomicBool::new(false),
    )?;
    println!(
        "{} frames ({} dropped), {} reps, final state {}",
        report.frames,
        report.dropped,
        report.reps.len(),
        report.final_state
    );
    Ok(())
}
