use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use vbt_core::mocks::SyntheticLift;
use vbt_core::{MemorySink, Pipeline, PoseFrame};

fn lift_frames(reps: u32) -> Vec<Option<PoseFrame>> {
    SyntheticLift::new(reps)
        .detections()
        .into_iter()
        .map(|d| d.frame().cloned())
        .collect()
}

pub fn bench_process_frame(c: &mut Criterion) {
    let frames = lift_frames(10);

    c.bench_function("process_frame/null_sink", |b| {
        b.iter_batched(
            || {
                Pipeline::builder()
                    .with_tracking_point(SyntheticLift::POINT)
                    .build()
                    .expect("build")
            },
            |mut p| {
                for f in &frames {
                    black_box(p.process_frame(f.as_ref()));
                }
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("process_frame/memory_sink", |b| {
        b.iter_batched(
            || {
                Pipeline::builder()
                    .with_tracking_point(SyntheticLift::POINT)
                    .with_sink(MemorySink::new(64))
                    .build()
                    .expect("build")
            },
            |mut p| {
                for f in &frames {
                    black_box(p.process_frame(f.as_ref()));
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_process_frame);
criterion_main!(benches);
