//! Whole-engine benchmarks.
//!
//! Each scenario builds a patch through the control handle, lets the engine
//! apply it, then measures `render_block` alone.

mod midi;
mod patches;

pub use midi::bench_midi;
pub use patches::bench_patches;

use patchbay::dsp::BuiltinModule;
use patchbay::{channel, Connection, Engine, EngineConfig, EngineHandle, NodeDescriptor};

/// A bootstrapped engine with `nodes` and `connections` applied.
pub fn patched_engine(nodes: Vec<(&str, NodeDescriptor)>, connections: Vec<Connection>) -> (EngineHandle, Engine) {
    let config = EngineConfig {
        command_capacity: 4096,
        notification_capacity: 4096,
        ..EngineConfig::default()
    };
    let (mut handle, mut engine) = channel(config);
    let _ = handle.bootstrap(BuiltinModule);
    for (id, descriptor) in nodes {
        let _ = handle.upsert_node(id, descriptor);
    }
    let _ = handle.set_connections(connections);

    let mut left = vec![0.0f32; 128];
    let mut right = vec![0.0f32; 128];
    engine.render_block(&mut left, &mut right);
    handle.drain();
    (handle, engine)
}
