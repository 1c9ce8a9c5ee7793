//! Stages 4 and 5: movement and velocity noise filters.
//!
//! Displacement is measured in the normalized keypoint space. Velocity is
//! converted to m/s with a per-frame meters-per-unit scale.

use crate::config::FilterCfg;
use vbt_traits::{Point, PoseFrame};

/// Last accepted sample within a tracking segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionReference {
    pub position: Point,
    pub timestamp_ms: u64,
}

/// Stage 4 verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementCheck {
    pub valid: bool,
    /// Displacement from the reference; `None` when not trackable.
    /// Zero on the first sample of a segment.
    pub displacement: Option<f32>,
    /// Signed vertical component (`current.y - previous.y`).
    pub dy: Option<f32>,
    /// No previous sample existed (first trackable frame of a segment).
    pub first_sample: bool,
}

impl MovementCheck {
    const REJECTED: Self = Self {
        valid: false,
        displacement: None,
        dy: None,
        first_sample: false,
    };
}

pub fn filter_movement(
    frame_trackable: bool,
    previous: Option<Point>,
    current: Option<Point>,
    movement_threshold: f32,
) -> MovementCheck {
    let Some(cur) = current.filter(|_| frame_trackable) else {
        return MovementCheck::REJECTED;
    };
    let Some(prev) = previous else {
        return MovementCheck {
            valid: false,
            displacement: Some(0.0),
            dy: Some(0.0),
            first_sample: true,
        };
    };
    let d = prev.distance_to(&cur);
    MovementCheck {
        valid: d >= movement_threshold,
        displacement: Some(d),
        dy: Some(cur.y - prev.y),
        first_sample: false,
    }
}

/// Stage 5: countable when the frame is valid and fast enough.
#[inline]
pub fn filter_velocity(frame_valid: bool, velocity_mps: Option<f32>, threshold_mps: f32) -> bool {
    frame_valid && velocity_mps.is_some_and(|v| v >= threshold_mps)
}

/// Displacement over elapsed time, in m/s. `None` when no time elapsed
/// (duplicate or out-of-order timestamps).
pub fn velocity_mps(displacement: f32, elapsed_ms: u64, meters_per_unit: f32) -> Option<f32> {
    if elapsed_ms == 0 {
        return None;
    }
    let secs = elapsed_ms as f32 / 1000.0;
    let v = displacement * meters_per_unit / secs;
    v.is_finite().then_some(v)
}

/// Meters per normalized unit for this frame.
///
/// Uses the reference segment when both endpoints pass the strict keypoint
/// threshold and are not collapsed onto each other; otherwise the fixed
/// `meters_per_unit`.
pub fn resolve_meters_per_unit(
    frame: Option<&PoseFrame>,
    cfg: &FilterCfg,
    min_keypoint_score: f32,
) -> f32 {
    let inferred = cfg.reference_segment.as_ref().and_then(|seg| {
        let f = frame?;
        let a = f.keypoint(&seg.from).filter(|k| k.score >= min_keypoint_score)?;
        let b = f.keypoint(&seg.to).filter(|k| k.score >= min_keypoint_score)?;
        let dist = a.position().distance_to(&b.position());
        (dist > 1e-4).then(|| seg.meters / dist)
    });
    inferred.unwrap_or(cfg.meters_per_unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReferenceSegment;
    use vbt_traits::Keypoint;

    #[test]
    fn not_trackable_is_rejected() {
        let m = filter_movement(false, Some(Point::new(0.5, 0.5)), Some(Point::new(0.9, 0.9)), 0.02);
        assert!(!m.valid);
        assert!(m.displacement.is_none());
    }

    #[test]
    fn first_sample_counts_as_zero_displacement() {
        let m = filter_movement(true, None, Some(Point::new(0.5, 0.5)), 0.02);
        assert!(!m.valid);
        assert!(m.first_sample);
        assert_eq!(m.displacement, Some(0.0));
    }

    #[test]
    fn jitter_is_filtered() {
        let m = filter_movement(
            true,
            Some(Point::new(0.50, 0.50)),
            Some(Point::new(0.50, 0.501)),
            0.02,
        );
        assert!(!m.valid);
        let d = m.displacement.expect("displacement");
        assert!((d - 0.001).abs() < 1e-5);
    }

    #[test]
    fn real_movement_passes() {
        let m = filter_movement(
            true,
            Some(Point::new(0.50, 0.50)),
            Some(Point::new(0.60, 0.50)),
            0.02,
        );
        assert!(m.valid);
        assert!((m.displacement.unwrap_or_default() - 0.1).abs() < 1e-5);
        assert_eq!(m.dy, Some(0.0));
    }

    #[test]
    fn velocity_requires_elapsed_time() {
        assert_eq!(velocity_mps(0.1, 0, 1.0), None);
        let v = velocity_mps(0.1, 100, 2.0).expect("velocity");
        assert!((v - 2.0).abs() < 1e-5);
    }

    #[test]
    fn velocity_gate() {
        assert!(filter_velocity(true, Some(0.05), 0.05));
        assert!(!filter_velocity(true, Some(0.049), 0.05));
        assert!(!filter_velocity(false, Some(1.0), 0.05));
        assert!(!filter_velocity(true, None, 0.05));
    }

    #[test]
    fn reference_segment_overrides_fixed_scale() {
        let cfg = FilterCfg {
            meters_per_unit: 1.0,
            reference_segment: Some(ReferenceSegment {
                from: "left_shoulder".into(),
                to: "left_hip".into(),
                meters: 0.5,
            }),
            ..FilterCfg::default()
        };
        let f = PoseFrame::new(
            1,
            0,
            vec![
                Keypoint::new("left_shoulder", 0.5, 0.3, 0.9),
                Keypoint::new("left_hip", 0.5, 0.55, 0.9),
            ],
        );
        let mpu = resolve_meters_per_unit(Some(&f), &cfg, 0.6);
        assert!((mpu - 2.0).abs() < 1e-4);
    }

    #[test]
    fn weak_endpoint_falls_back_to_fixed_scale() {
        let cfg = FilterCfg {
            meters_per_unit: 1.5,
            reference_segment: Some(ReferenceSegment {
                from: "left_shoulder".into(),
                to: "left_hip".into(),
                meters: 0.5,
            }),
            ..FilterCfg::default()
        };
        let f = PoseFrame::new(
            1,
            0,
            vec![
                Keypoint::new("left_shoulder", 0.5, 0.3, 0.9),
                Keypoint::new("left_hip", 0.5, 0.55, 0.5),
            ],
        );
        assert_eq!(resolve_meters_per_unit(Some(&f), &cfg, 0.6), 1.5);
        assert_eq!(resolve_meters_per_unit(None, &cfg, 0.6), 1.5);
    }
}
