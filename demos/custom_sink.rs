//! Example: Custom Diagnostics Sink
//!
//! Counts how often each layer was the one blocking a frame.

use std::collections::BTreeMap;
use vbt_core::mocks::SyntheticLift;
use vbt_core::{DiagnosticFrame, DiagnosticsSink, Layer, Pipeline};

#[derive(Default)]
pub struct BlockingHistogram {
    counts: BTreeMap<Layer, u64>,
    clear: u64,
}

impl DiagnosticsSink for BlockingHistogram {
    fn record(&mut self, frame: &DiagnosticFrame) {
        match frame.blocking.blocking_layer {
            Some(layer) => *self.counts.entry(layer).or_default() += 1,
            None => self.clear += 1,
        }
    }
}

fn main() -> Result<(), eyre::Report> {
    let mut pipeline = Pipeline::builder()
        .with_tracking_point(SyntheticLift::POINT)
        .with_sink(BlockingHistogram::default())
        .build()?;

    let lift = SyntheticLift::new(2).with_dropout(40, 6);
    for detection in lift.detections() {
        pipeline.process_frame(detection.frame());
    }

    let histogram = pipeline.into_sink();
    for (layer, n) in &histogram.counts {
        println!("{layer}: {n}");
    }
    println!("countable: {}", histogram.clear);
    Ok(())
}
