//! Graph topology: node descriptors, connections and the store that owns
//! them.
//!
//! The store is the single source of truth for what exists. Everything the
//! render thread keeps per node (queues, DSP instances, transpose state) is
//! keyed by the [`NodeHandle`] handed out here and dies with it.

/// Generation-checked slots, side tables and visit sets.
pub mod arena;
/// Directed edges between node ports.
pub mod connection;
/// Node ids, kinds and params.
pub mod descriptor;
/// Node table plus connection list.
pub mod store;

pub use arena::{Arena, HandleMap, NodeHandle, VisitSet};
pub use connection::{Connection, PortRole};
pub use descriptor::{NodeDescriptor, NodeId, NodeKind, ParamValue, Params};
pub use store::{GraphStore, NodeEntry};
