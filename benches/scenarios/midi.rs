//! Benchmarks for MIDI-driven patches: routing plus synth rendering.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use patchbay::io::midi::MidiEvent;
use patchbay::{Connection, NodeDescriptor, RawMidi};

use super::patched_engine;
use crate::BLOCK_SIZES;

pub fn bench_midi(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/midi");

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        // keys → transpose → synth, a chord toggled every block
        let (mut handle, mut engine) = patched_engine(
            vec![
                ("keys", NodeDescriptor::new("midi-input")),
                ("shift", NodeDescriptor::transpose(7)),
                ("lead", NodeDescriptor::synthesizer().with("maxVoices", 8.0)),
                ("out", NodeDescriptor::speaker()),
            ],
            vec![
                Connection::midi("keys", "shift"),
                Connection::midi("shift", "lead"),
                Connection::audio("lead", "out"),
            ],
        );
        let mut on = true;
        group.bench_with_input(BenchmarkId::new("transposed_chord", size), &size, |b, _| {
            b.iter(|| {
                let events = [60u8, 64, 67]
                    .iter()
                    .map(|&key| {
                        let event = if on {
                            MidiEvent::note_on(0, key, 100)
                        } else {
                            MidiEvent::note_off(0, key)
                        };
                        RawMidi::from(event)
                    })
                    .collect();
                on = !on;
                let _ = handle.midi("keys", events);
                engine.render_block(black_box(&mut left), black_box(&mut right));
                handle.drain();
            })
        });
    }

    group.finish();
}
