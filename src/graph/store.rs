use std::collections::HashMap;

use super::arena::{Arena, NodeHandle};
use super::connection::Connection;
use super::descriptor::{NodeDescriptor, NodeId, NodeKind};

pub struct NodeEntry {
    pub id: NodeId,
    pub descriptor: NodeDescriptor,
}

impl NodeEntry {
    pub fn kind(&self) -> &NodeKind {
        &self.descriptor.kind
    }
}

/// Authoritative table of nodes and the connection list between them.
///
/// Mutated only by control commands. There is no referential validation:
/// connections naming unknown nodes simply never resolve.
#[derive(Default)]
pub struct GraphStore {
    nodes: Arena<NodeEntry>,
    index: HashMap<NodeId, NodeHandle>,
    connections: Vec<Connection>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node's descriptor.
    ///
    /// An existing node keeps its handle; the previous descriptor is returned
    /// so callers can react to parameter changes.
    pub fn upsert_node(
        &mut self,
        id: NodeId,
        descriptor: NodeDescriptor,
    ) -> (NodeHandle, Option<NodeDescriptor>) {
        if let Some(&handle) = self.index.get(&id) {
            if let Some(entry) = self.nodes.get_mut(handle) {
                let previous = std::mem::replace(&mut entry.descriptor, descriptor);
                return (handle, Some(previous));
            }
        }

        let handle = self.nodes.insert(NodeEntry {
            id: id.clone(),
            descriptor,
        });
        self.index.insert(id, handle);
        (handle, None)
    }

    /// Delete a node. Unknown ids are a no-op.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<(NodeHandle, NodeEntry)> {
        let handle = self.index.remove(id)?;
        self.nodes.remove(handle).map(|entry| (handle, entry))
    }

    /// Replace the entire connection list.
    pub fn set_connections(&mut self, connections: Vec<Connection>) {
        self.connections = connections;
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.connections.clear();
    }

    pub fn handle(&self, id: &NodeId) -> Option<NodeHandle> {
        self.index.get(id).copied()
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&NodeEntry> {
        self.nodes.get(handle)
    }

    pub fn descriptor(&self, id: &NodeId) -> Option<&NodeDescriptor> {
        self.handle(id)
            .and_then(|handle| self.nodes.get(handle))
            .map(|entry| &entry.descriptor)
    }

    pub fn kind(&self, handle: NodeHandle) -> Option<&NodeKind> {
        self.nodes.get(handle).map(NodeEntry::kind)
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains(handle)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeHandle, &NodeEntry)> {
        self.nodes.iter()
    }

    pub fn nodes_of_kind<'a>(
        &'a self,
        kind: &'a NodeKind,
    ) -> impl Iterator<Item = (NodeHandle, &'a NodeEntry)> + 'a {
        self.nodes.iter().filter(move |(_, entry)| entry.kind() == kind)
    }

    /// Audio sinks, in slot order.
    pub fn sinks(&self) -> impl Iterator<Item = (NodeHandle, &NodeEntry)> {
        self.nodes.iter().filter(|(_, entry)| entry.kind().is_sink())
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Targets of MIDI edges leaving `id`, one per edge (duplicates kept).
    pub fn midi_targets<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = NodeHandle> + 'a {
        self.connections
            .iter()
            .filter(move |c| &c.from == id && c.carries_midi())
            .filter_map(|c| self.handle(&c.to))
    }

    /// Producers feeding the audio input of `id`.
    pub fn audio_sources<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = NodeHandle> + 'a {
        self.connections
            .iter()
            .filter(move |c| &c.to == id && c.carries_audio())
            .filter_map(|c| self.handle(&c.from))
    }

    /// Copy each value node's `value` into the params its edges drive.
    pub fn apply_param_edges(&mut self) {
        let Self {
            nodes,
            index,
            connections,
        } = self;

        for connection in connections.iter() {
            let Some(param) = connection.param_target() else {
                continue;
            };
            let (Some(&source), Some(&target)) = (index.get(&connection.from), index.get(&connection.to))
            else {
                continue;
            };
            let Some(value) = nodes
                .get(source)
                .and_then(|entry| entry.descriptor.params.get("value"))
                .cloned()
            else {
                continue;
            };
            if let Some(entry) = nodes.get_mut(target) {
                if entry.descriptor.params.get(param) != Some(&value) {
                    entry.descriptor.params.set(param, value);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Upper bound for handle indices, used to size visit sets.
    pub fn slot_capacity(&self) -> usize {
        self.nodes.capacity()
    }
}
