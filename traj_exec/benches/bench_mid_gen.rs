//! # Midline Generation Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use comms_if::per::Side;
use nalgebra::Point2;
use traj_lib::mid_gen::{
    params::Params,
    sequence,
    state::{InputData, MidGen},
    stepper::{self, StepStart},
};

/// Build a slalom track with `n` cone pairs.
fn slalom(n: usize) -> (Vec<Point2<f64>>, Vec<Point2<f64>>) {
    let mut right = Vec::with_capacity(n);
    let mut left = Vec::with_capacity(n);

    for i in 0..n {
        let x = i as f64 * 4.0;
        let wiggle = if i % 2 == 0 { 0.5 } else { -0.5 };
        right.push(Point2::new(x, wiggle));
        left.push(Point2::new(x, 3.5 + wiggle));
    }

    (right, left)
}

fn sequence_benchmark(c: &mut Criterion) {
    let (right, _) = slalom(20);

    // Shuffle deterministically so the reorder has real work to do
    let mut shuffled = right.clone();
    shuffled.reverse();
    shuffled.swap(0, 19);

    c.bench_function("sequence reorder 20 points", |b| {
        b.iter(|| sequence::reorder(&shuffled, &shuffled[0]).unwrap())
    });
}

fn stepper_benchmark(c: &mut Criterion) {
    let (right, left) = slalom(20);
    let params = Params::default();

    c.bench_function("stepper full pass 20 pairs", |b| {
        b.iter(|| stepper::run(&right, &left, StepStart::Fresh, &params).unwrap())
    });
}

fn batch_benchmark(c: &mut Criterion) {
    let (right, left) = slalom(20);

    c.bench_function("mid_gen incremental batches", |b| {
        b.iter(|| {
            let mut mid_gen = MidGen::default();
            for (r, l) in right.iter().zip(left.iter()) {
                let input = InputData {
                    cones: vec![(Side::Right, *r), (Side::Left, *l)],
                    end_of_stream: false,
                };
                mid_gen.process_batch(&input).unwrap();
            }
            mid_gen.trajectory()
        })
    });
}

criterion_group!(
    benches,
    sequence_benchmark,
    stepper_benchmark,
    batch_benchmark
);
criterion_main!(benches);
