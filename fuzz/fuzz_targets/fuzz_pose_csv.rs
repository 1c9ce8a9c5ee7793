#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any trace that loads must replay without panicking.
    if let Ok(detections) = vbt_config::read_pose_csv(data) {
        let Ok(mut pipeline) = vbt_core::Pipeline::builder()
            .with_tracking_point("right_wrist")
            .build()
        else {
            return;
        };
        for d in &detections {
            pipeline.process_frame(d.frame());
        }
    }
});
