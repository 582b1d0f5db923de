//! Builtin signal-processing units.
//!
//! These implement the [`native`](crate::native) capability traits and are
//! bundled as [`BuiltinModule`], the module the host binary bootstraps with.
//! Every unit is allocation-free once constructed, so it is safe to drive from
//! the render thread.

/// Linear attack/decay/sustain/release envelope.
pub mod envelope;
/// Phase-accumulator oscillator and the shared waveform set.
pub mod oscillator;
/// Schroeder reverb (parallel combs into series allpasses).
pub mod reverb;
/// Polyphonic voice pool with stealing, glide and sustain pedal.
pub mod synth;
/// Note shifter with range clamp.
pub mod transpose;

pub use envelope::EnvelopeState;
pub use oscillator::{OscillatorBlock, Waveform};
pub use reverb::ReverbBlock;
pub use synth::PolySynth;
pub use transpose::TransposeBlock;

use crate::graph::NodeKind;
use crate::native::{NativeModule, OscillatorUnit, ReverbUnit, SynthUnit, TransposeUnit};

/// The builtin capability surface: every constructor present.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinModule;

impl NativeModule for BuiltinModule {
    fn name(&self) -> &str {
        "builtin"
    }

    fn oscillator(&self, sample_rate: f32) -> Option<Box<dyn OscillatorUnit>> {
        Some(Box::new(OscillatorBlock::new(sample_rate)))
    }

    fn reverb(&self, sample_rate: f32) -> Option<Box<dyn ReverbUnit>> {
        Some(Box::new(ReverbBlock::new(sample_rate)))
    }

    fn synthesizer(&self, sample_rate: f32) -> Option<Box<dyn SynthUnit>> {
        Some(Box::new(PolySynth::new(sample_rate)))
    }

    fn transpose(&self) -> Option<Box<dyn TransposeUnit>> {
        Some(Box::new(TransposeBlock::new()))
    }

    fn provides(&self, kind: &NodeKind) -> bool {
        kind.has_instance()
    }
}
