//! Repetition counter fed with countable frames while recording.
//!
//! Motion is split into phases by the sign of the vertical component. A
//! phase in the concentric direction that travels far enough is a rep.

use crate::config::{RepCfg, RepDirection};
use serde::Serialize;

/// One counted repetition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rep {
    /// 1-based within the recording.
    pub index: u32,
    /// Vertical travel in normalized units.
    pub travel: f32,
    pub mean_velocity_mps: f32,
    pub peak_velocity_mps: f32,
    pub first_frame: u64,
    pub last_frame: u64,
}

#[derive(Debug, Clone)]
struct Phase {
    /// `true` when y is decreasing.
    upward: bool,
    travel: f32,
    velocity_sum: f32,
    samples: u32,
    peak: f32,
    first_frame: u64,
    last_frame: u64,
}

#[derive(Debug, Clone)]
pub struct RepCounter {
    cfg: RepCfg,
    phase: Option<Phase>,
    reps: Vec<Rep>,
}

impl RepCounter {
    pub fn new(cfg: RepCfg) -> Self {
        Self {
            cfg,
            phase: None,
            reps: Vec::new(),
        }
    }

    /// Feed one countable frame. `dy` is the signed vertical displacement
    /// since the previous accepted sample. Returns a rep when this frame
    /// reversed a qualifying concentric phase.
    pub fn feed(&mut self, frame_number: u64, dy: f32, velocity_mps: f32) -> Option<Rep> {
        if !self.cfg.enabled || dy == 0.0 || !dy.is_finite() {
            return None;
        }
        let upward = dy < 0.0;
        let reversed = self.phase.as_ref().is_some_and(|p| p.upward != upward);
        let closed = if reversed { self.close() } else { None };
        let phase = self.phase.get_or_insert(Phase {
            upward,
            travel: 0.0,
            velocity_sum: 0.0,
            samples: 0,
            peak: 0.0,
            first_frame: frame_number,
            last_frame: frame_number,
        });
        phase.travel += dy.abs();
        phase.velocity_sum += velocity_mps;
        phase.samples += 1;
        phase.peak = phase.peak.max(velocity_mps);
        phase.last_frame = frame_number;
        closed
    }

    /// Close the open phase at the end of a recording.
    pub fn finish(&mut self) -> Option<Rep> {
        self.close()
    }

    fn close(&mut self) -> Option<Rep> {
        let p = self.phase.take()?;
        let concentric = match self.cfg.direction {
            RepDirection::Up => p.upward,
            RepDirection::Down => !p.upward,
        };
        if !concentric || p.travel < self.cfg.min_displacement || p.samples == 0 {
            return None;
        }
        let rep = Rep {
            index: u32::try_from(self.reps.len()).unwrap_or(u32::MAX).saturating_add(1),
            travel: p.travel,
            mean_velocity_mps: p.velocity_sum / p.samples as f32,
            peak_velocity_mps: p.peak,
            first_frame: p.first_frame,
            last_frame: p.last_frame,
        };
        tracing::debug!(
            index = rep.index,
            travel = rep.travel,
            mean_mps = rep.mean_velocity_mps,
            peak_mps = rep.peak_velocity_mps,
            "rep counted"
        );
        self.reps.push(rep.clone());
        Some(rep)
    }

    pub fn reps(&self) -> &[Rep] {
        &self.reps
    }

    pub fn count(&self) -> usize {
        self.reps.len()
    }

    /// Hand over the counted reps and start empty.
    pub fn take(&mut self) -> Vec<Rep> {
        self.phase = None;
        std::mem::take(&mut self.reps)
    }

    /// Forget the open phase but keep counted reps. Used when tracking is
    /// interrupted mid-movement.
    pub fn interrupt(&mut self) {
        self.phase = None;
    }

    pub fn reset(&mut self) {
        self.phase = None;
        self.reps.clear();
    }
}
