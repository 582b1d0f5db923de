use crate::io::midi::{NOTE_OFF, NOTE_ON};
use crate::native::TransposeUnit;

/// Semitone shift is limited to four octaves either way.
pub const MAX_SHIFT: i32 = 48;

/// Stateless note mapper: shift then clamp to `[low, high]`.
///
/// Note On/Off pairing across parameter changes is the engine's job; this
/// unit only maps single events.
pub struct TransposeBlock {
    semitones: i32,
    clamp_low: u8,
    clamp_high: u8,
    pass_other: bool,
}

impl TransposeBlock {
    pub fn new() -> Self {
        Self {
            semitones: 0,
            clamp_low: 0,
            clamp_high: 127,
            pass_other: true,
        }
    }

    pub fn semitones(&self) -> i32 {
        self.semitones
    }

    pub fn range(&self) -> (u8, u8) {
        (self.clamp_low, self.clamp_high)
    }

    pub fn map_note(&self, note: u8) -> u8 {
        (note as i32 + self.semitones).clamp(self.clamp_low as i32, self.clamp_high as i32) as u8
    }
}

impl Default for TransposeBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl TransposeUnit for TransposeBlock {
    fn set_params(&mut self, semitones: i32, clamp_low: u8, clamp_high: u8, pass_other: bool) {
        self.semitones = semitones.clamp(-MAX_SHIFT, MAX_SHIFT);
        let low = clamp_low.min(127);
        let high = clamp_high.min(127);
        (self.clamp_low, self.clamp_high) = if low <= high { (low, high) } else { (high, low) };
        self.pass_other = pass_other;
    }

    fn transform(&self, status: u8, data1: u8, data2: u8) -> Option<[u8; 3]> {
        match status & 0xF0 {
            NOTE_ON | NOTE_OFF => Some([status, self.map_note(data1), data2]),
            _ if self.pass_other => Some([status, data1, data2]),
            _ => None,
        }
    }
}
