/*
MIDI Events
===========

Every event the engine routes is a three byte channel message:

  status   high nibble = command, low nibble = channel (0-15)
  data1    note number or controller number (7 bit)
  data2    velocity or controller value (7 bit)

Commands the engine understands:

  0x80  Note Off          data1 = note, data2 = release velocity
  0x90  Note On           data1 = note, data2 = velocity (0 means Note Off)
  0xB0  Control Change    data1 = controller, data2 = value
          CC 64   sustain pedal (value >= 64 is down)
          CC 123  all notes off
  0xC0  Program Change
  0xE0  Pitch Bend        14 bit value split over data1 (LSB) / data2 (MSB)

Events may carry a scheduling hint: either a frame offset inside the next
block, or a wall-clock timestamp in milliseconds. The router applies events
at block granularity; the hint is resolved by `Timebase::resolve_frame`.
*/

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const PITCH_BEND: u8 = 0xE0;

pub const CC_SUSTAIN: u8 = 64;
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// When an event should take effect.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ScheduleHint {
    #[default]
    Now,
    /// Frame offset inside the next block.
    AtFrame(f64),
    /// Wall-clock timestamp in milliseconds.
    AtTimeMs(f64),
}

/// A validated three byte MIDI event. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiEvent {
    status: u8,
    data1: u8,
    data2: u8,
    hint: ScheduleHint,
}

/// Decoded form of a [`MidiEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchBend { channel: u8, value: i16 },
    ProgramChange { channel: u8, program: u8 },
    Other { status: u8, data1: u8, data2: u8 },
}

impl MidiEvent {
    pub fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            status,
            data1: data1 & 0x7F,
            data2: data2 & 0x7F,
            hint: ScheduleHint::Now,
        }
    }

    /// Build an event from raw wire bytes.
    ///
    /// Extra bytes are truncated; fewer than three bytes is malformed and
    /// yields `None`.
    pub fn from_bytes(data: &[u8], hint: ScheduleHint) -> Option<Self> {
        match data {
            [status, data1, data2, ..] => Some(Self::new(*status, *data1, *data2).with_hint(hint)),
            _ => None,
        }
    }

    pub fn note_on(channel: u8, key: u8, velocity: u8) -> Self {
        Self::new(NOTE_ON | (channel & 0x0F), key, velocity)
    }

    pub fn note_off(channel: u8, key: u8) -> Self {
        Self::new(NOTE_OFF | (channel & 0x0F), key, 0)
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::new(CONTROL_CHANGE | (channel & 0x0F), controller, value)
    }

    pub fn all_notes_off(channel: u8) -> Self {
        Self::control_change(channel, CC_ALL_NOTES_OFF, 0)
    }

    pub fn with_hint(mut self, hint: ScheduleHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn data1(&self) -> u8 {
        self.data1
    }

    pub fn data2(&self) -> u8 {
        self.data2
    }

    pub fn bytes(&self) -> [u8; 3] {
        [self.status, self.data1, self.data2]
    }

    pub fn hint(&self) -> ScheduleHint {
        self.hint
    }

    pub fn command(&self) -> u8 {
        self.status & 0xF0
    }

    pub fn channel(&self) -> u8 {
        self.status & 0x0F
    }

    /// Note On with a non-zero velocity.
    pub fn is_note_start(&self) -> bool {
        self.command() == NOTE_ON && self.data2 > 0
    }

    /// Note Off, or Note On with zero velocity.
    pub fn is_note_end(&self) -> bool {
        self.command() == NOTE_OFF || (self.command() == NOTE_ON && self.data2 == 0)
    }

    pub fn message(&self) -> MidiMessage {
        let channel = self.channel();
        match self.command() {
            NOTE_ON if self.data2 > 0 => MidiMessage::NoteOn {
                channel,
                key: self.data1,
                velocity: self.data2,
            },
            NOTE_ON | NOTE_OFF => MidiMessage::NoteOff {
                channel,
                key: self.data1,
                velocity: self.data2,
            },
            CONTROL_CHANGE => MidiMessage::ControlChange {
                channel,
                controller: self.data1,
                value: self.data2,
            },
            PROGRAM_CHANGE => MidiMessage::ProgramChange {
                channel,
                program: self.data1,
            },
            PITCH_BEND => {
                let raw = ((self.data2 as i16) << 7) | self.data1 as i16;
                MidiMessage::PitchBend {
                    channel,
                    value: raw - 8192,
                }
            }
            _ => MidiMessage::Other {
                status: self.status,
                data1: self.data1,
                data2: self.data2,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_payloads_are_rejected() {
        assert!(MidiEvent::from_bytes(&[0x90, 60], ScheduleHint::Now).is_none());
        assert!(MidiEvent::from_bytes(&[], ScheduleHint::Now).is_none());
    }

    #[test]
    fn long_payloads_are_truncated() {
        let ev = MidiEvent::from_bytes(&[0x91, 60, 100, 42, 7], ScheduleHint::AtFrame(3.0))
            .expect("three bytes present");
        assert_eq!(ev.bytes(), [0x91, 60, 100]);
        assert_eq!(ev.hint(), ScheduleHint::AtFrame(3.0));
    }

    #[test]
    fn data_bytes_are_masked_to_seven_bits() {
        let ev = MidiEvent::new(0x90, 0xFF, 0x80);
        assert_eq!(ev.data1(), 0x7F);
        assert_eq!(ev.data2(), 0);
    }

    #[test]
    fn zero_velocity_note_on_decodes_as_note_off() {
        let ev = MidiEvent::new(0x93, 64, 0);
        assert!(ev.is_note_end());
        assert!(!ev.is_note_start());
        assert_eq!(
            ev.message(),
            MidiMessage::NoteOff { channel: 3, key: 64, velocity: 0 }
        );
    }

    #[test]
    fn pitch_bend_is_centered() {
        let ev = MidiEvent::new(PITCH_BEND, 0x00, 0x40);
        assert_eq!(ev.message(), MidiMessage::PitchBend { channel: 0, value: 0 });
    }
}
