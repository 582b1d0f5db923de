#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::UnitError;
use crate::native::OscillatorUnit;

/*
Phase Accumulator Oscillator
============================

Phase is kept normalized to [0, 1). Each sample advances it by
frequency / sample_rate and wraps. The waveform is a pure function of phase:

  Sine       sin(2π·p)
  Square     +1 for p < 0.5, -1 otherwise
  Sawtooth   2p - 1            (ramps -1 → +1)
  Triangle   4p - 1 rising, 3 - 4p falling

No band limiting: bright waveforms alias at high pitches. That is fine for
the control-rate patching this engine targets.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Value at normalized phase `phase` in [0, 1).
    #[inline]
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (std::f32::consts::TAU * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
        }
    }
}

pub struct OscillatorBlock {
    waveform: Waveform,
    frequency: f32,
    amplitude: f32,
    phase: f32,
    sample_rate: f32,
}

impl OscillatorBlock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            waveform: Waveform::Sine,
            frequency: 440.0,
            amplitude: 0.5,
            phase: 0.0,
            sample_rate,
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let value = self.waveform.sample(self.phase) * self.amplitude;
        self.phase += self.frequency / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
        value
    }

    pub fn render(&mut self, destination: &mut [f32]) {
        for sample in destination.iter_mut() {
            *sample = self.next_sample();
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

impl OscillatorUnit for OscillatorBlock {
    fn set_frequency(&mut self, hz: f32) {
        // Above Nyquist the phase step wraps more than once per sample.
        self.frequency = hz.clamp(0.0, self.sample_rate * 0.5);
    }

    fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude.clamp(0.0, 1.0);
    }

    fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    fn process(&mut self, out: &mut [f32]) -> Result<(), UnitError> {
        self.render(out);
        Ok(())
    }
}
