use proptest::prelude::*;
use vbt_core::config::StabilityCfg;
use vbt_core::diagnostics::{RawMeasurements, Thresholds, blocking_diagnosis};
use vbt_core::stability::StabilityTracker;
use vbt_core::{Keypoint, Layer, Pipeline, PipelineState, PoseFrame, ValidationFlags};

/// One generated frame: `None` is a missed detection; otherwise the nose
/// score and an optional wrist (x, y, score).
type GenFrame = Option<(f32, Option<(f32, f32, f32)>)>;

fn to_frame(seq: u64, g: &GenFrame) -> Option<PoseFrame> {
    let (nose, wrist) = (*g)?;
    let mut kps = vec![Keypoint::new("nose", 0.5, 0.2, nose)];
    if let Some((x, y, s)) = wrist {
        kps.push(Keypoint::new("right_wrist", x, y, s));
    }
    Some(PoseFrame::new(seq, seq * 33, kps))
}

prop_compose! {
    fn gen_frame()(
        present in any::<bool>(),
        nose in 0.0f32..=1.0,
        wrist in proptest::option::of((0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0)),
    ) -> GenFrame {
        present.then_some((nose, wrist))
    }
}

fn thresholds() -> Thresholds {
    Thresholds {
        min_usable_score: 0.3,
        min_keypoint_score: 0.6,
        required_stable_frames: 5,
        confidence_threshold: 0.5,
        movement_threshold: 0.02,
        velocity_threshold_mps: 0.05,
    }
}

proptest! {
    #[test]
    fn prop_usable_run_always_stabilizes(
        prefix in proptest::collection::vec(gen_frame(), 0..40),
        required in 1u32..10,
        decay in 1u32..4,
        with_point in any::<bool>(),
    ) {
        let mut b = Pipeline::builder().with_stability(StabilityCfg {
            required_stable_frames: required,
            decay_rate: decay,
        });
        if with_point {
            b = b.with_tracking_point("right_wrist");
        }
        let mut p = b.build().expect("build");
        for (i, g) in prefix.iter().enumerate() {
            p.process_frame(to_frame(i as u64, g).as_ref());
        }
        // Usable frames whose tracking point is never trackable.
        let base = prefix.len() as u64;
        for k in 0..u64::from(required) {
            let f = PoseFrame::new(base + k, (base + k) * 33, vec![Keypoint::new("nose", 0.5, 0.2, 0.8)]);
            p.process_frame(Some(&f));
        }
        prop_assert!(p.flags().frame_stable);
        prop_assert!(p.state() >= PipelineState::Ready);
    }

    #[test]
    fn prop_decay_is_not_a_reset(required in 2u32..20, decay in 1u32..5, k_frac in 0.0f64..1.0) {
        let k = ((f64::from(required - 1) * k_frac) as u32).max(1);
        let mut t = StabilityTracker::new(required, decay);
        for _ in 0..k {
            t.update(true);
        }
        prop_assert_eq!(t.stable_frames(), k);
        t.update(false);
        prop_assert_eq!(t.stable_frames(), k.saturating_sub(decay));
    }

    #[test]
    fn prop_trackable_implies_stable(frames in proptest::collection::vec(gen_frame(), 1..80)) {
        let mut p = Pipeline::builder()
            .with_tracking_point("right_wrist")
            .build()
            .expect("build");
        for (i, g) in frames.iter().enumerate() {
            let out = p.process_frame(to_frame(i as u64, g).as_ref());
            let f = out.flags;
            prop_assert!(!f.frame_stable || f.frame_usable);
            prop_assert!(!f.frame_trackable || f.frame_stable);
            prop_assert!(!f.frame_valid || f.frame_trackable);
            prop_assert!(!f.frame_countable || f.frame_valid);
            // The snapshot never disagrees with the flags it reports.
            prop_assert_eq!(out.diagnostic.flags, f);
            prop_assert_eq!(out.diagnostic.blocking.blocked, !f.frame_countable);
        }
    }

    #[test]
    fn prop_stability_ignores_tracking_selection(frames in proptest::collection::vec(gen_frame(), 1..60)) {
        let mut with = Pipeline::builder().with_tracking_point("right_wrist").build().expect("build");
        let mut without = Pipeline::builder().build().expect("build");
        for (i, g) in frames.iter().enumerate() {
            let f = to_frame(i as u64, g);
            let a = with.process_frame(f.as_ref());
            let b = without.process_frame(f.as_ref());
            prop_assert_eq!(a.flags.frame_stable, b.flags.frame_stable);
            prop_assert_eq!(with.stable_frames(), without.stable_frames());
        }
    }

    #[test]
    fn prop_blocking_names_lowest_failing_layer(bits in proptest::collection::vec(any::<bool>(), 5)) {
        let flags = ValidationFlags {
            frame_usable: bits[0],
            frame_stable: bits[1],
            frame_trackable: bits[2],
            frame_valid: bits[3],
            frame_countable: bits[4],
        };
        let m = RawMeasurements {
            frame_present: true,
            keypoint_count: 1,
            max_score: Some(0.1),
            ..RawMeasurements::default()
        };
        let d = blocking_diagnosis(&m, &flags, &thresholds());
        let expected = Layer::ALL.into_iter().find(|l| !l.passed(&flags));
        prop_assert_eq!(d.blocking_layer, expected);
        prop_assert_eq!(d.blocked, expected.is_some());
        // Same inputs, same answer.
        prop_assert_eq!(d, blocking_diagnosis(&m, &flags, &thresholds()));
    }
}
