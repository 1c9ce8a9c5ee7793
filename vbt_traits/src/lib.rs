//! Shared pose types and seams for the VBT pipeline.
//!
//! Nothing here knows how keypoints are produced. A camera/model integration
//! implements [`PoseSource`]; the pipeline only relies on the keypoint +
//! confidence contract in [`pose`].

pub mod clock;
pub mod pose;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use pose::{Detection, Keypoint, Point, PoseFrame};

/// Pull-based producer of pose detections, one call per camera frame.
///
/// `Ok(Detection::Missed)` is a normal outcome (the model found nobody);
/// errors are reserved for the source itself failing.
pub trait PoseSource {
    fn next_frame(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Detection, Box<dyn std::error::Error + Send + Sync>>;
}

impl<P: PoseSource + ?Sized> PoseSource for Box<P> {
    fn next_frame(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Detection, Box<dyn std::error::Error + Send + Sync>> {
        (**self).next_frame(timeout)
    }
}
