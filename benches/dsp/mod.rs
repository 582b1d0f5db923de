//! Benchmarks for the builtin DSP units.

mod oscillator;
mod reverb;
mod synth;

pub use oscillator::bench_oscillator;
pub use reverb::bench_reverb;
pub use synth::bench_synth;
