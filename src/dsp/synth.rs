use crate::dsp::envelope::Envelope;
use crate::dsp::oscillator::Waveform;
use crate::error::UnitError;
use crate::io::converter::midi_note_to_freq;
use crate::native::{Capability, SynthUnit};

pub const DEFAULT_VOICES: usize = 8;
pub const MAX_VOICES: usize = 32;

/// Lowest pitch a glide starts from when a voice has never sounded.
const GLIDE_FLOOR_HZ: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,
    /// Key held, envelope in attack/decay/sustain.
    Active,
    /// Key released while the sustain pedal is down.
    Sustained,
    /// Envelope in release.
    Releasing,
}

struct Voice {
    note: u8,
    state: VoiceState,
    age: u64,
    phase: f32,
    freq_current: f32,
    freq_target: f32,
    envelope: Envelope,
}

impl Voice {
    fn new(sample_rate: f32) -> Self {
        Self {
            note: 0,
            state: VoiceState::Free,
            age: 0,
            phase: 0.0,
            freq_current: 0.0,
            freq_target: 0.0,
            envelope: Envelope::new(sample_rate),
        }
    }

    fn start(&mut self, note: u8, age: u64, gliding: bool) {
        let freq = midi_note_to_freq(note);
        if self.state == VoiceState::Free {
            self.phase = 0.0;
        }
        self.freq_current = if gliding {
            self.freq_current.max(GLIDE_FLOOR_HZ)
        } else {
            freq
        };
        self.freq_target = freq;
        self.note = note;
        self.age = age;
        self.state = VoiceState::Active;
        self.envelope.note_on();
    }

    fn release(&mut self) {
        if matches!(self.state, VoiceState::Active | VoiceState::Sustained) {
            self.state = VoiceState::Releasing;
            self.envelope.note_off();
        }
    }

    fn gate_open(&self) -> bool {
        matches!(self.state, VoiceState::Active | VoiceState::Sustained)
    }

    fn is_free(&self) -> bool {
        self.state == VoiceState::Free
    }

    fn render_add(&mut self, out: &mut [f32], waveform: Waveform, glide_step: f32, sample_rate: f32) {
        for sample in out.iter_mut() {
            if glide_step >= 1.0 {
                self.freq_current = self.freq_target;
            } else {
                self.freq_current += (self.freq_target - self.freq_current) * glide_step;
            }

            let level = self.envelope.next_sample();
            *sample += waveform.sample(self.phase) * level;

            self.phase += self.freq_current / sample_rate;
            if self.phase >= 1.0 {
                self.phase -= self.phase.floor();
            }
        }

        if self.state == VoiceState::Releasing && !self.envelope.is_active() {
            self.state = VoiceState::Free;
        }
    }
}

/// Polyphonic synth: one oscillator and one ADSR per voice.
///
/// Voice allocation on Note On, in order: a voice already playing the same
/// note (retrigger), a free voice, the oldest releasing voice, and finally
/// the quietest voice.
pub struct PolySynth {
    voices: Vec<Voice>,
    sample_rate: f32,
    waveform: Waveform,
    gain: f32,
    adsr: (f32, f32, f32, f32),
    glide_time_sec: f32,
    sustain_down: bool,
    note_counter: u64,
}

impl PolySynth {
    pub fn new(sample_rate: f32) -> Self {
        let mut voices = Vec::with_capacity(MAX_VOICES);
        voices.resize_with(DEFAULT_VOICES, || Voice::new(sample_rate));

        Self {
            voices,
            sample_rate,
            waveform: Waveform::Sawtooth,
            gain: 0.5,
            adsr: (0.005, 0.12, 0.7, 0.12),
            glide_time_sec: 0.0,
            sustain_down: false,
            note_counter: 0,
        }
    }

    pub fn max_voices(&self) -> usize {
        self.voices.len()
    }

    /// Voices still producing sound, release tails included.
    pub fn sounding_voices(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_free()).count()
    }

    pub fn voice_state(&self, note: u8) -> Option<VoiceState> {
        self.voices
            .iter()
            .find(|v| !v.is_free() && v.note == note)
            .map(|v| v.state)
    }

    fn allocate_voice(&mut self, note: u8) -> usize {
        if let Some(idx) = self.voices.iter().position(|v| !v.is_free() && v.note == note) {
            return idx;
        }
        if let Some(idx) = self.voices.iter().position(Voice::is_free) {
            return idx;
        }
        let oldest_releasing = self
            .voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.state == VoiceState::Releasing)
            .min_by_key(|(_, v)| v.age)
            .map(|(idx, _)| idx);
        if let Some(idx) = oldest_releasing {
            return idx;
        }
        self.voices
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.envelope.level().total_cmp(&b.envelope.level()))
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }
}

impl SynthUnit for PolySynth {
    fn note_on(&mut self, note: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(note);
            return;
        }
        let idx = self.allocate_voice(note);
        self.note_counter += 1;
        let gliding = self.glide_time_sec > 0.0;
        self.voices[idx].start(note, self.note_counter, gliding);
    }

    fn note_off(&mut self, note: u8) {
        let sustain_down = self.sustain_down;
        for voice in self
            .voices
            .iter_mut()
            .filter(|v| v.state == VoiceState::Active && v.note == note)
        {
            if sustain_down {
                voice.state = VoiceState::Sustained;
            } else {
                voice.release();
            }
        }
    }

    fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    fn set_adsr(&mut self, attack: f32, decay: f32, sustain: f32, release: f32) {
        let adsr = (attack, decay, sustain, release);
        if adsr == self.adsr {
            return;
        }
        self.adsr = adsr;
        for voice in &mut self.voices {
            voice.envelope.set_adsr(attack, decay, sustain, release);
        }
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }

    fn set_glide(&mut self, time_ms: f32) -> Capability {
        self.glide_time_sec = (time_ms / 1000.0).max(0.0);
        Capability::Handled
    }

    fn set_max_voices(&mut self, voices: usize) -> Capability {
        let voices = voices.clamp(1, MAX_VOICES);
        if voices != self.voices.len() {
            let sample_rate = self.sample_rate;
            let (a, d, s, r) = self.adsr;
            // Capacity is reserved up front, so growing never allocates.
            self.voices.resize_with(voices, || Voice::new(sample_rate));
            for voice in &mut self.voices {
                voice.envelope.set_adsr(a, d, s, r);
            }
        }
        Capability::Handled
    }

    fn sustain_pedal(&mut self, down: bool) -> Capability {
        self.sustain_down = down;
        if !down {
            for voice in self
                .voices
                .iter_mut()
                .filter(|v| v.state == VoiceState::Sustained)
            {
                voice.release();
            }
        }
        Capability::Handled
    }

    fn release_all_voices(&mut self) -> Capability {
        for voice in &mut self.voices {
            voice.release();
        }
        Capability::Handled
    }

    fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.gate_open()).count()
    }

    fn process(&mut self, out: &mut [f32]) -> Result<(), UnitError> {
        out.fill(0.0);

        let sounding = self.sounding_voices();
        if sounding == 0 {
            return Ok(());
        }

        let glide_step = if self.glide_time_sec <= 0.0 {
            1.0
        } else {
            (1.0 / (self.sample_rate * self.glide_time_sec)).min(1.0)
        };

        for voice in self.voices.iter_mut().filter(|v| !v.is_free()) {
            voice.render_add(out, self.waveform, glide_step, self.sample_rate);
        }

        let scale = self.gain / sounding as f32;
        for sample in out.iter_mut() {
            let s = *sample * scale;
            *sample = if s.is_finite() { s } else { 0.0 };
        }
        Ok(())
    }
}
