use crate::dsp::transpose::MAX_SHIFT;
use crate::graph::Params;
use crate::io::midi::{MidiEvent, NOTE_OFF};
use crate::native::TransposeUnit;

const CHANNELS: usize = 16;
const KEYS: usize = 128;

/// Transpose settings as read from a node's params.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransposeParams {
    pub semitones: i32,
    pub clamp_low: u8,
    pub clamp_high: u8,
    pub pass_other: bool,
}

impl TransposeParams {
    pub fn from_params(params: &Params) -> Self {
        let note = |key: &str, default: u8| {
            params
                .number(key)
                .map_or(default, |n| n.round().clamp(0.0, 127.0) as u8)
        };
        Self {
            semitones: params
                .number("semitones")
                .map_or(0, |n| n.round().clamp(-(MAX_SHIFT as f64), MAX_SHIFT as f64) as i32),
            clamp_low: note("clampLow", 0),
            clamp_high: note("clampHigh", 127),
            pass_other: params.truthy("passOther"),
        }
    }

    pub fn apply(&self, unit: &mut dyn TransposeUnit) {
        unit.set_params(self.semitones, self.clamp_low, self.clamp_high, self.pass_other);
    }
}

/// Note pairing for one transpose node.
///
/// Remembers, per `(channel, original key)`, the note that was actually sent
/// downstream, so the matching Note Off always names the note that is
/// sounding even if the shift changed in between.
pub struct TransposeState {
    semitones: Option<i32>,
    sounding: Box<[[Option<u8>; KEYS]; CHANNELS]>,
    active: usize,
}

impl TransposeState {
    pub fn new() -> Self {
        Self {
            semitones: None,
            sounding: Box::new([[None; KEYS]; CHANNELS]),
            active: 0,
        }
    }

    /// Record the current shift. A change flushes every sounding note into
    /// `out` first. The first call only records.
    pub fn retune(&mut self, semitones: i32, out: &mut Vec<MidiEvent>) -> bool {
        let changed = self.semitones.is_some_and(|previous| previous != semitones);
        if changed {
            self.flush(out);
        }
        self.semitones = Some(semitones);
        changed
    }

    /// Map one inbound event, appending what goes downstream to `out`.
    pub fn process(&mut self, event: MidiEvent, unit: &dyn TransposeUnit, out: &mut Vec<MidiEvent>) {
        let channel = event.channel();
        let key = event.data1();
        let hint = event.hint();

        if event.is_note_start() {
            let Some([status, note, velocity]) = unit.transform(event.status(), key, event.data2()) else {
                return;
            };
            // Retrigger of a key that is still sounding: close the old note.
            if let Some(previous) = self.slot(channel, key).take() {
                self.active -= 1;
                out.push(MidiEvent::note_off(channel, previous).with_hint(hint));
            }
            let note = note & 0x7F;
            *self.slot(channel, key) = Some(note);
            self.active += 1;
            out.push(MidiEvent::new(status, note, velocity).with_hint(hint));
        } else if event.is_note_end() {
            let sent = match self.slot(channel, key).take() {
                Some(note) => {
                    self.active -= 1;
                    Some(note)
                }
                None => unit
                    .transform(NOTE_OFF | channel, key, event.data2())
                    .map(|[_, note, _]| note),
            };
            if let Some(note) = sent {
                out.push(MidiEvent::note_off(channel, note).with_hint(hint));
            }
        } else if let Some([status, data1, data2]) = unit.transform(event.status(), key, event.data2()) {
            out.push(MidiEvent::new(status, data1, data2).with_hint(hint));
        }
    }

    /// Note Off for every sounding note, then forget them all.
    pub fn flush(&mut self, out: &mut Vec<MidiEvent>) {
        if self.active == 0 {
            return;
        }
        for (channel, keys) in self.sounding.iter_mut().enumerate() {
            for slot in keys.iter_mut() {
                if let Some(note) = slot.take() {
                    out.push(MidiEvent::note_off(channel as u8, note));
                }
            }
        }
        self.active = 0;
    }

    pub fn active_notes(&self) -> usize {
        self.active
    }

    pub fn semitones(&self) -> Option<i32> {
        self.semitones
    }

    fn slot(&mut self, channel: u8, key: u8) -> &mut Option<u8> {
        &mut self.sounding[channel as usize & 0x0F][key as usize & 0x7F]
    }
}

impl Default for TransposeState {
    fn default() -> Self {
        Self::new()
    }
}
