//! The capability surface the engine drives.
//!
//! A [`NativeModule`] is the pre-built signal-processing library handed to the
//! engine at bootstrap. It offers one constructor per node kind; each
//! constructed unit owns its DSP state for the lifetime of its node.
//!
//! Optional operations are trait methods with a default that reports
//! [`Capability::Unsupported`]. The engine checks the answer and falls back
//! to a slower explicit path where one exists (for example releasing voices
//! one note at a time when a synth has no bulk release).

use crate::dsp::oscillator::Waveform;
use crate::error::UnitError;
use crate::graph::NodeKind;

/// Answer from an optional operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Handled,
    Unsupported,
}

pub trait OscillatorUnit: Send {
    fn set_frequency(&mut self, hz: f32);
    fn set_amplitude(&mut self, amplitude: f32);
    fn set_waveform(&mut self, waveform: Waveform);

    /// Fill `out` with one block.
    fn process(&mut self, out: &mut [f32]) -> Result<(), UnitError>;

    /// Release native resources. Called once, right before the unit drops.
    fn release(&mut self) {}
}

pub trait ReverbUnit: Send {
    fn set_feedback(&mut self, feedback: f32);
    fn set_wet_mix(&mut self, wet_mix: f32);

    fn set_damping(&mut self, _damping: f32) -> Capability {
        Capability::Unsupported
    }

    /// Transform `input` into `output` (same length).
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), UnitError>;

    fn release(&mut self) {}
}

pub trait SynthUnit: Send {
    fn note_on(&mut self, note: u8, velocity: u8);
    fn note_off(&mut self, note: u8);

    fn set_waveform(&mut self, waveform: Waveform);
    fn set_adsr(&mut self, attack: f32, decay: f32, sustain: f32, release: f32);
    fn set_gain(&mut self, gain: f32);

    fn set_glide(&mut self, _time_ms: f32) -> Capability {
        Capability::Unsupported
    }

    fn set_max_voices(&mut self, _voices: usize) -> Capability {
        Capability::Unsupported
    }

    /// CC 64.
    fn sustain_pedal(&mut self, _down: bool) -> Capability {
        Capability::Unsupported
    }

    /// Bulk release for CC 123.
    fn release_all_voices(&mut self) -> Capability {
        Capability::Unsupported
    }

    /// Voices whose gate is open (note held or sustained by the pedal).
    fn active_voices(&self) -> usize;

    /// Render one block from the current voice pool.
    fn process(&mut self, out: &mut [f32]) -> Result<(), UnitError>;

    fn release(&mut self) {}
}

pub trait TransposeUnit: Send {
    fn set_params(&mut self, semitones: i32, clamp_low: u8, clamp_high: u8, pass_other: bool);

    /// Map one event. `None` drops it.
    fn transform(&self, status: u8, data1: u8, data2: u8) -> Option<[u8; 3]>;

    fn release(&mut self) {}
}

/// A loadable DSP library: the engine's only way to make sound.
pub trait NativeModule: Send {
    fn name(&self) -> &str;

    fn oscillator(&self, sample_rate: f32) -> Option<Box<dyn OscillatorUnit>>;
    fn reverb(&self, sample_rate: f32) -> Option<Box<dyn ReverbUnit>>;
    fn synthesizer(&self, sample_rate: f32) -> Option<Box<dyn SynthUnit>>;
    fn transpose(&self) -> Option<Box<dyn TransposeUnit>>;

    /// Whether a constructor for `kind` exists, without building anything.
    fn provides(&self, kind: &NodeKind) -> bool;
}

/// Constructors a module must have before the engine leaves bootstrap.
pub const REQUIRED_KINDS: [NodeKind; 2] = [NodeKind::Oscillator, NodeKind::Reverb];

/// Constructors whose absence only disables their node kind.
pub const OPTIONAL_KINDS: [NodeKind; 2] = [NodeKind::Synthesizer, NodeKind::MidiTranspose];
