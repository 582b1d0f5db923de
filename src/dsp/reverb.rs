//! Reverb: room simulation via a Schroeder delay network.
//!
//! ```text
//! Input ──┬──→ [Comb 1] ──┐
//!         ├──→ [Comb 2] ──┤
//!         ├──→ [Comb 3] ──┼──→ (+) ──→ [Allpass 1] ──→ [Allpass 2] ──→ wet
//!         └──→ [Comb 4] ──┘
//!
//! out = dry · (1 - wet_mix) + wet · wet_mix
//! ```
//!
//! Combs run in parallel and produce the decaying echo tail; their delays are
//! mutually prime so the echoes do not pile up on one frequency. The two
//! allpasses in series add diffusion without coloring the spectrum.
//!
//! `feedback` (0..0.95) sets how long the tail rings: it maps onto comb
//! feedback in 0.5..0.98. Delay lines are sized from the sample rate once, at
//! construction, and never reallocate.

use crate::error::UnitError;
use crate::native::{Capability, ReverbUnit};

const COMB_DELAYS_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];
const ALLPASS_DELAYS_MS: [f32; 2] = [5.0, 1.7];

fn delay_samples(ms: f32, sample_rate: f32) -> usize {
    ((ms * sample_rate / 1000.0) as usize).max(1)
}

pub struct CombFilter {
    buffer: Box<[f32]>,
    write_pos: usize,
    feedback: f32,
    damp: f32,
    filter_state: f32,
}

impl CombFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)].into_boxed_slice(),
            write_pos: 0,
            feedback: 0.5,
            damp: 0.2,
            filter_state: 0.0,
        }
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.98);
    }

    pub fn set_damp(&mut self, damp: f32) {
        self.damp = damp.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.write_pos];

        // One-pole lowpass in the loop absorbs highs on every pass.
        self.filter_state = output * (1.0 - self.damp) + self.filter_state * self.damp;
        self.buffer[self.write_pos] = input + self.filter_state * self.feedback;

        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.write_pos = 0;
    }
}

pub struct AllpassFilter {
    buffer: Box<[f32]>,
    write_pos: usize,
    gain: f32,
}

impl AllpassFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)].into_boxed_slice(),
            write_pos: 0,
            gain: 0.5,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.write_pos];
        let output = -self.gain * input + delayed;
        self.buffer[self.write_pos] = input + self.gain * output;

        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

pub struct ReverbBlock {
    combs: [CombFilter; 4],
    allpasses: [AllpassFilter; 2],
    feedback: f32,
    wet_mix: f32,
}

impl ReverbBlock {
    pub fn new(sample_rate: f32) -> Self {
        let mut reverb = Self {
            combs: COMB_DELAYS_MS.map(|ms| CombFilter::new(delay_samples(ms, sample_rate))),
            allpasses: ALLPASS_DELAYS_MS.map(|ms| AllpassFilter::new(delay_samples(ms, sample_rate))),
            feedback: 0.0,
            wet_mix: 0.3,
        };
        reverb.apply_feedback(0.3);
        reverb
    }

    fn apply_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.95);
        let comb_feedback = 0.5 + self.feedback / 0.95 * 0.48;
        for comb in &mut self.combs {
            comb.set_feedback(comb_feedback);
        }
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn wet_mix(&self) -> f32 {
        self.wet_mix
    }

    #[inline]
    pub fn next_sample(&mut self, input: f32) -> f32 {
        let mut wet = 0.0;
        for comb in &mut self.combs {
            wet += comb.process(input);
        }
        wet *= 0.25;

        for allpass in &mut self.allpasses {
            wet = allpass.process(wet);
        }

        input * (1.0 - self.wet_mix) + wet * self.wet_mix
    }

    pub fn reset(&mut self) {
        for comb in &mut self.combs {
            comb.reset();
        }
        for allpass in &mut self.allpasses {
            allpass.reset();
        }
    }
}

impl ReverbUnit for ReverbBlock {
    fn set_feedback(&mut self, feedback: f32) {
        self.apply_feedback(feedback);
    }

    fn set_wet_mix(&mut self, wet_mix: f32) {
        self.wet_mix = wet_mix.clamp(0.0, 1.0);
    }

    fn set_damping(&mut self, damping: f32) -> Capability {
        for comb in &mut self.combs {
            comb.set_damp(damping);
        }
        Capability::Handled
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), UnitError> {
        if input.len() != output.len() {
            return Err(UnitError::InvalidBlock {
                len: input.len(),
                max: output.len(),
            });
        }
        for (out, &dry) in output.iter_mut().zip(input) {
            *out = self.next_sample(dry);
        }
        Ok(())
    }
}
