//! Stage 2: temporal stability.
//!
//! The tracker's only input is the stage 1 verdict. It has no access to the
//! tracking point, the motion reference or the state machine, so stability
//! can always be reached once enough usable frames arrive.

/// Accumulating/decaying counter of usable frames.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    stable_frames: u32,
    required: u32,
    decay_rate: u32,
}

impl StabilityTracker {
    /// `required` and `decay_rate` are validated by the pipeline builder;
    /// both are clamped to at least 1 here.
    pub fn new(required: u32, decay_rate: u32) -> Self {
        Self {
            stable_frames: 0,
            required: required.max(1),
            decay_rate: decay_rate.max(1),
        }
    }

    /// Fold one stage 1 verdict into the counter and return `frame_stable`.
    ///
    /// A usable frame adds one (capped at `required`); an unusable frame
    /// subtracts `decay_rate` (floored at zero). A single bad frame never
    /// wipes the accumulated progress.
    pub fn update(&mut self, frame_usable: bool) -> bool {
        self.stable_frames = if frame_usable {
            self.stable_frames.saturating_add(1).min(self.required)
        } else {
            self.stable_frames.saturating_sub(self.decay_rate)
        };
        self.is_stable()
    }

    #[inline]
    pub fn is_stable(&self) -> bool {
        self.stable_frames >= self.required
    }

    #[inline]
    pub fn stable_frames(&self) -> u32 {
        self.stable_frames
    }

    /// Hard reset. Only pose loss and session reset call this.
    pub fn reset(&mut self) {
        self.stable_frames = 0;
    }
}
