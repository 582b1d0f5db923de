//! Benchmarks for reverb processing.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use patchbay::dsp::ReverbBlock;
use patchbay::native::ReverbUnit;

use crate::BLOCK_SIZES;

pub fn bench_reverb(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/reverb");

    for &size in BLOCK_SIZES {
        // Impulse followed by a quiet tail
        let input: Vec<f32> = (0..size)
            .map(|i| {
                if i < 10 {
                    1.0 - (i as f32 / 10.0)
                } else {
                    (i as f32 * 0.05).sin() * 0.1
                }
            })
            .collect();
        let mut output = vec![0.0f32; size];

        let mut reverb = ReverbBlock::new(48_000.0);
        reverb.set_feedback(0.3);
        group.bench_with_input(BenchmarkId::new("short_tail", size), &size, |b, _| {
            b.iter(|| reverb.process(black_box(&input), black_box(&mut output)))
        });

        let mut reverb = ReverbBlock::new(48_000.0);
        reverb.set_feedback(0.9);
        reverb.set_wet_mix(0.6);
        group.bench_with_input(BenchmarkId::new("long_tail", size), &size, |b, _| {
            b.iter(|| reverb.process(black_box(&input), black_box(&mut output)))
        });
    }

    group.finish();
}
