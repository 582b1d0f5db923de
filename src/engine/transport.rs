//! Transport - global beat clock and per-node step clocks
//!
//! The transport counts beats in absolute frames. Sequencers and
//! arpeggiators each own a [`StepClock`] that starts, and picks up rate
//! changes, on beat boundaries, then advances in fractions of a beat.

use super::notes::NoteSet;

/// Rate multipliers a step clock accepts (steps per beat).
pub const RATES: [f64; 5] = [0.25, 0.5, 1.0, 2.0, 4.0];

pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;

pub fn is_valid_rate(multiplier: f64) -> bool {
    RATES.contains(&multiplier)
}

/// A beat boundary that fell inside the current block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beat {
    pub index: u64,
    pub bpm: f64,
    /// A global resync was requested for this beat.
    pub sync: bool,
}

/// Beat clock shared by every step clock.
#[derive(Debug, Clone)]
pub struct Transport {
    /// Audio sample rate
    sample_rate: f64,
    /// Tempo in beats per minute
    bpm: f64,
    /// Tempo waiting for the next beat boundary
    pending_bpm: Option<f64>,
    /// Frames per beat (computed from bpm and sample_rate)
    frames_per_beat: f64,
    /// Index of the next beat to fire
    beat_index: u64,
    /// Absolute frame of the next beat
    next_beat_frame: f64,
    /// Frames rendered since start
    frame_counter: u64,
    /// Restart playing sequencers at the next beat
    sync_next_beat: bool,
}

impl Transport {
    pub fn new(bpm: f64, sample_rate: f32) -> Self {
        let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        let sample_rate = sample_rate as f64;
        Self {
            sample_rate,
            bpm,
            pending_bpm: None,
            frames_per_beat: Self::compute_frames_per_beat(bpm, sample_rate),
            beat_index: 0,
            next_beat_frame: 0.0,
            frame_counter: 0,
            sync_next_beat: false,
        }
    }

    fn compute_frames_per_beat(bpm: f64, sample_rate: f64) -> f64 {
        60.0 / bpm * sample_rate
    }

    /// Queue a tempo change for the next beat. Out-of-range tempos are
    /// ignored.
    pub fn set_bpm(&mut self, bpm: f64) -> bool {
        if !bpm.is_finite() || !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return false;
        }
        self.pending_bpm = Some(bpm);
        true
    }

    pub fn request_sync(&mut self) {
        self.sync_next_beat = true;
    }

    /// Fire the next beat if it lands in the block of `frames` starting at
    /// the current frame counter. Call repeatedly until `None`.
    pub fn next_beat(&mut self, frames: usize) -> Option<Beat> {
        let start = self.frame_counter as f64;
        let end = start + frames as f64;
        if self.next_beat_frame < start {
            self.next_beat_frame = start;
        }
        if self.next_beat_frame >= end {
            return None;
        }

        if let Some(bpm) = self.pending_bpm.take() {
            self.bpm = bpm;
            self.frames_per_beat = Self::compute_frames_per_beat(bpm, self.sample_rate);
        }
        let beat = Beat {
            index: self.beat_index,
            bpm: self.bpm,
            sync: std::mem::take(&mut self.sync_next_beat),
        };
        self.beat_index += 1;
        self.next_beat_frame += self.frames_per_beat;
        Some(beat)
    }

    /// Beats covered by a block of `frames`.
    pub fn beats_in(&self, frames: usize) -> f64 {
        frames as f64 / self.frames_per_beat
    }

    pub fn advance(&mut self, frames: usize) {
        self.frame_counter += frames as u64;
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn beat_index(&self) -> u64 {
        self.beat_index
    }

    pub fn frames_per_beat(&self) -> f64 {
        self.frames_per_beat
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }
}

/// Step timing for one sequencer or arpeggiator.
#[derive(Debug, Clone)]
pub struct StepClock {
    /// Steps per beat
    rate: f64,
    /// Rate waiting for the next beat boundary
    pending_rate: Option<f64>,
    playing: bool,
    /// Start at the next beat boundary
    pending_start: bool,
    /// Beats accumulated toward the next step
    beats_accum: f64,
    step: usize,
    /// Step 0 has been reported since the last start
    announced: bool,
}

impl StepClock {
    pub fn new() -> Self {
        Self {
            rate: 1.0,
            pending_rate: None,
            playing: false,
            pending_start: false,
            beats_accum: 0.0,
            step: 0,
            announced: true,
        }
    }

    /// Apply a rate right away (persisted node state).
    pub fn set_rate(&mut self, multiplier: f64) -> bool {
        if !is_valid_rate(multiplier) {
            return false;
        }
        self.rate = multiplier;
        true
    }

    /// Apply a rate at the next beat.
    pub fn queue_rate(&mut self, multiplier: f64) -> bool {
        if !is_valid_rate(multiplier) {
            return false;
        }
        self.pending_rate = Some(multiplier);
        true
    }

    /// Quantized start: takes effect on the next beat.
    pub fn request_start(&mut self) {
        if !self.playing {
            self.pending_start = true;
        }
    }

    /// Immediate stop. The step position is kept.
    pub fn stop(&mut self) {
        self.playing = false;
        self.pending_start = false;
        self.beats_accum = 0.0;
    }

    /// Beat boundary bookkeeping. Returns true if the clock started here.
    pub fn on_beat(&mut self) -> bool {
        if let Some(rate) = self.pending_rate.take() {
            self.rate = rate;
        }
        if !self.pending_start {
            return false;
        }
        self.pending_start = false;
        self.playing = true;
        self.step = 0;
        self.beats_accum = 0.0;
        self.announced = false;
        true
    }

    /// Global resync: a playing clock jumps back to step 0.
    pub fn resync(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        self.step = 0;
        self.beats_accum = 0.0;
        self.announced = true;
        true
    }

    /// True once after each start, when step 0 should be reported.
    pub fn take_announcement(&mut self) -> bool {
        if self.playing && !self.announced {
            self.announced = true;
            return true;
        }
        false
    }

    /// Advance by `beats`, wrapping at `length` steps. Returns the number of
    /// step boundaries crossed.
    pub fn advance(&mut self, beats: f64, length: usize) -> usize {
        if !self.playing {
            return 0;
        }
        let step_beats = 1.0 / self.rate;
        self.beats_accum += beats;
        let mut crossed = 0;
        while self.beats_accum >= step_beats {
            self.beats_accum -= step_beats;
            self.step = (self.step + 1) % length.max(1);
            crossed += 1;
        }
        crossed
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_pending(&self) -> bool {
        self.pending_start
    }
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime state of a sequencer node.
#[derive(Debug, Clone, Default)]
pub struct SequencerState {
    pub clock: StepClock,
    /// Notes the control thread has started through this sequencer.
    pub sounding: NoteSet,
}

/// Steps in a sequencer pattern, from its `length` param.
pub fn pattern_length(length: Option<f64>) -> usize {
    match length {
        Some(n) if n >= 1.0 => (n as usize).min(256),
        _ => 16,
    }
}
