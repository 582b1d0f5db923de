use std::fmt;

use crate::graph::{Connection, NodeDescriptor, NodeId};
use crate::io::midi::{MidiEvent, ScheduleHint};
use crate::native::NativeModule;

/// MIDI bytes as the control thread received them.
///
/// Validated on the render thread: fewer than three bytes is dropped, extra
/// bytes are truncated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMidi {
    pub data: Vec<u8>,
    pub hint: ScheduleHint,
}

impl RawMidi {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            hint: ScheduleHint::Now,
        }
    }

    pub fn at_frame(mut self, frame: f64) -> Self {
        self.hint = ScheduleHint::AtFrame(frame);
        self
    }

    pub fn at_time_ms(mut self, ms: f64) -> Self {
        self.hint = ScheduleHint::AtTimeMs(ms);
        self
    }

    pub fn event(&self) -> Option<MidiEvent> {
        MidiEvent::from_bytes(&self.data, self.hint)
    }
}

impl From<MidiEvent> for RawMidi {
    fn from(event: MidiEvent) -> Self {
        Self {
            data: event.bytes().to_vec(),
            hint: event.hint(),
        }
    }
}

/// Control thread → render thread commands, applied in arrival order at the
/// start of the next block.
pub enum Command {
    Bootstrap(Box<dyn NativeModule>),
    UpsertNode {
        id: NodeId,
        descriptor: NodeDescriptor,
    },
    RemoveNode {
        id: NodeId,
    },
    SetConnections(Vec<Connection>),
    Clear,
    UpdateTimebase {
        wall_clock_ms: f64,
        audio_clock_sec: f64,
    },
    Midi {
        source: NodeId,
        events: Vec<RawMidi>,
    },
    /// Applied at the next beat. Outside 20..=300 is ignored.
    SetBpm(f64),
    SyncAllNextBeat,
    SetSequencerRate {
        id: NodeId,
        multiplier: f64,
    },
    SetSequencerPlay {
        id: NodeId,
        play: bool,
    },
    SetArpRate {
        id: NodeId,
        multiplier: f64,
    },
    SetArpPlay {
        id: NodeId,
        play: bool,
    },
    Panic,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Bootstrap(_) => "bootstrap",
            Command::UpsertNode { .. } => "upsert-node",
            Command::RemoveNode { .. } => "remove-node",
            Command::SetConnections(_) => "set-connections",
            Command::Clear => "clear",
            Command::UpdateTimebase { .. } => "update-timebase",
            Command::Midi { .. } => "midi",
            Command::SetBpm(_) => "set-bpm",
            Command::SyncAllNextBeat => "sync-all-next-beat",
            Command::SetSequencerRate { .. } => "set-sequencer-rate",
            Command::SetSequencerPlay { .. } => "set-sequencer-play",
            Command::SetArpRate { .. } => "set-arp-rate",
            Command::SetArpPlay { .. } => "set-arp-play",
            Command::Panic => "panic",
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Bootstrap(module) => f.debug_tuple("Bootstrap").field(&module.name()).finish(),
            Command::UpsertNode { id, descriptor } => f
                .debug_struct("UpsertNode")
                .field("id", id)
                .field("descriptor", descriptor)
                .finish(),
            Command::RemoveNode { id } => f.debug_struct("RemoveNode").field("id", id).finish(),
            Command::SetConnections(list) => f.debug_tuple("SetConnections").field(list).finish(),
            Command::Clear => f.write_str("Clear"),
            Command::UpdateTimebase {
                wall_clock_ms,
                audio_clock_sec,
            } => f
                .debug_struct("UpdateTimebase")
                .field("wall_clock_ms", wall_clock_ms)
                .field("audio_clock_sec", audio_clock_sec)
                .finish(),
            Command::Midi { source, events } => f
                .debug_struct("Midi")
                .field("source", source)
                .field("events", events)
                .finish(),
            Command::SetBpm(bpm) => f.debug_tuple("SetBpm").field(bpm).finish(),
            Command::SyncAllNextBeat => f.write_str("SyncAllNextBeat"),
            Command::SetSequencerRate { id, multiplier } => f
                .debug_struct("SetSequencerRate")
                .field("id", id)
                .field("multiplier", multiplier)
                .finish(),
            Command::SetSequencerPlay { id, play } => f
                .debug_struct("SetSequencerPlay")
                .field("id", id)
                .field("play", play)
                .finish(),
            Command::SetArpRate { id, multiplier } => f
                .debug_struct("SetArpRate")
                .field("id", id)
                .field("multiplier", multiplier)
                .finish(),
            Command::SetArpPlay { id, play } => f
                .debug_struct("SetArpPlay")
                .field("id", id)
                .field("play", play)
                .finish(),
            Command::Panic => f.write_str("Panic"),
        }
    }
}
