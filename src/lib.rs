pub mod config;
pub mod dsp; // Builtin oscillator, reverb, synth and transpose units
pub mod engine; // Render thread, control channel and MIDI routing
pub mod error;
pub mod graph; // Patch topology
pub mod io; // MIDI and unit conversions
pub mod native; // Capability surface a DSP module implements

pub use config::EngineConfig;
pub use engine::{channel, Command, Engine, EngineHandle, EngineNotification, EngineState, RawMidi};
pub use graph::{Connection, NodeDescriptor, NodeId, NodeKind};

pub const MAX_BLOCK_SIZE: usize = 2048;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
