//! Benchmarks for oscillator waveform generation.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use patchbay::dsp::{OscillatorBlock, Waveform};
use patchbay::native::OscillatorUnit;

use crate::BLOCK_SIZES;

pub fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/oscillator");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for (name, waveform) in [
            ("sine", Waveform::Sine),
            ("square", Waveform::Square),
            ("sawtooth", Waveform::Sawtooth),
            ("triangle", Waveform::Triangle),
        ] {
            let mut osc = OscillatorBlock::new(48_000.0);
            osc.set_frequency(440.0);
            osc.set_waveform(waveform);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| osc.process(black_box(&mut buffer)))
            });
        }
    }

    group.finish();
}
