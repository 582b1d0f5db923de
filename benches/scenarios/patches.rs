//! Benchmarks for audio-only patches of increasing size.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use patchbay::{Connection, NodeDescriptor};

use super::patched_engine;
use crate::BLOCK_SIZES;

pub fn bench_patches(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/patches");

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        // Single oscillator straight to the speaker
        let (mut handle, mut engine) = patched_engine(
            vec![
                ("osc", NodeDescriptor::oscillator()),
                ("out", NodeDescriptor::speaker()),
            ],
            vec![Connection::audio("osc", "out")],
        );
        group.bench_with_input(BenchmarkId::new("osc_to_speaker", size), &size, |b, _| {
            b.iter(|| {
                engine.render_block(black_box(&mut left), black_box(&mut right));
                handle.drain();
            })
        });

        // Eight detuned oscillators summed into one reverb
        let mut nodes = vec![
            ("room", NodeDescriptor::reverb().with("feedback", 0.7)),
            ("out", NodeDescriptor::speaker()),
        ];
        let mut connections = vec![Connection::audio("room", "out")];
        const OSCS: [&str; 8] = ["o0", "o1", "o2", "o3", "o4", "o5", "o6", "o7"];
        for (i, id) in OSCS.iter().enumerate() {
            nodes.push((*id, NodeDescriptor::oscillator().with("frequency", 110.0 + i as f64 * 1.5)));
            connections.push(Connection::audio(*id, "room"));
        }
        let (mut handle, mut engine) = patched_engine(nodes, connections);
        group.bench_with_input(BenchmarkId::new("osc_bank_reverb", size), &size, |b, _| {
            b.iter(|| {
                engine.render_block(black_box(&mut left), black_box(&mut right));
                handle.drain();
            })
        });
    }

    group.finish();
}
