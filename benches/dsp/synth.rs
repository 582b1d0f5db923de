//! Benchmarks for the polyphonic synth at different voice loads.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use patchbay::dsp::PolySynth;
use patchbay::native::SynthUnit;

use crate::BLOCK_SIZES;

pub fn bench_synth(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/synth");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for voices in [1u8, 4, 8] {
            let mut synth = PolySynth::new(48_000.0);
            for i in 0..voices {
                synth.note_on(48 + i * 3, 100);
            }
            group.bench_with_input(
                BenchmarkId::new(format!("{voices}_voices"), size),
                &size,
                |b, _| b.iter(|| synth.process(black_box(&mut buffer))),
            );
        }
    }

    group.finish();
}
