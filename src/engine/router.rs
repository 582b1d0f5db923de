use std::mem;

use tracing::trace;

use super::arpeggiator::Arpeggiator;
use super::command::RawMidi;
use super::notify::Notifier;
use super::pool::InstancePool;
use super::timebase::Timebase;
use super::transpose::{TransposeParams, TransposeState};
use crate::graph::{GraphStore, HandleMap, NodeHandle, NodeId, NodeKind};
use crate::io::midi::{MidiEvent, MidiMessage, CC_ALL_NOTES_OFF, CC_SUSTAIN};
use crate::native::{Capability, SynthUnit};

/// Everything dispatch may touch besides the queues themselves.
pub struct Dispatch<'a> {
    pub graph: &'a GraphStore,
    pub pool: &'a mut InstancePool,
    pub transposes: &'a mut HandleMap<TransposeState>,
    pub arps: &'a mut HandleMap<Arpeggiator>,
    pub notifier: &'a mut Notifier,
    pub timebase: &'a Timebase,
    pub block_frames: usize,
}

/// Per-node inbound MIDI queues.
///
/// Events are copied onto the queue of every MIDI target of their source and
/// applied once per block, at block granularity.
#[derive(Default)]
pub struct MidiRouter {
    queues: HandleMap<Vec<MidiEvent>>,
    /// Handles with pending events, rebuilt each pass.
    pending: Vec<NodeHandle>,
    /// Transpose output before it is routed on.
    scratch: Vec<MidiEvent>,
}

impl MidiRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate raw events from the control thread and route them from
    /// `source`. Malformed events are dropped.
    pub fn enqueue_raw(&mut self, graph: &GraphStore, source: &NodeId, events: &[RawMidi]) -> usize {
        let mut routed = 0;
        for target in graph.midi_targets(source) {
            let queue = self.queues.get_or_insert_with(target, Vec::new);
            for event in events.iter().filter_map(RawMidi::event) {
                queue.push(event);
                routed += 1;
            }
        }
        routed
    }

    /// Append `events` to the queue of every MIDI target of `source`, in
    /// order.
    pub fn enqueue_from(&mut self, graph: &GraphStore, source: &NodeId, events: &[MidiEvent]) {
        if events.is_empty() {
            return;
        }
        for target in graph.midi_targets(source) {
            self.queues
                .get_or_insert_with(target, Vec::new)
                .extend_from_slice(events);
        }
    }

    /// Queue CC 123 on every channel for every synthesizer.
    pub fn all_notes_off_to_synths(&mut self, graph: &GraphStore) {
        for (handle, _) in graph.nodes_of_kind(&NodeKind::Synthesizer) {
            let queue = self.queues.get_or_insert_with(handle, Vec::new);
            queue.extend((0..16).map(MidiEvent::all_notes_off));
        }
    }

    pub fn queued(&self, handle: NodeHandle) -> usize {
        self.queues.get(handle).map_or(0, Vec::len)
    }

    pub fn forget(&mut self, handle: NodeHandle) {
        self.queues.remove(handle);
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }

    /// Empty every queue, applying each event to its node.
    ///
    /// Transposes feed other queues, so draining repeats until nothing is
    /// pending or `max_passes` is used up; leftovers wait for the next block.
    /// Returns the number of events dispatched.
    pub fn drain_and_dispatch(&mut self, ctx: &mut Dispatch<'_>, max_passes: usize) -> usize {
        let mut dispatched = 0;
        for _ in 0..max_passes {
            self.pending.clear();
            self.pending.extend(
                self.queues
                    .iter()
                    .filter(|(_, queue)| !queue.is_empty())
                    .map(|(handle, _)| handle),
            );
            if self.pending.is_empty() {
                break;
            }

            for index in 0..self.pending.len() {
                let handle = self.pending[index];
                let Some(queue) = self.queues.get_mut(handle) else {
                    continue;
                };
                let mut batch = mem::take(queue);
                dispatched += batch.len();
                self.dispatch(ctx, handle, &batch);

                // Hand the allocation back unless dispatch refilled the queue.
                batch.clear();
                if let Some(queue) = self.queues.get_mut(handle) {
                    if queue.is_empty() {
                        *queue = batch;
                    }
                }
            }
        }
        dispatched
    }

    fn dispatch(&mut self, ctx: &mut Dispatch<'_>, handle: NodeHandle, events: &[MidiEvent]) {
        let graph = ctx.graph;
        let Some(node) = graph.node(handle) else {
            self.queues.remove(handle);
            return;
        };

        let block_start = ctx.timebase.block_start_sec();
        for event in events {
            trace!(
                node = %node.id,
                bytes = ?event.bytes(),
                frame = ctx.timebase.resolve_frame(event.hint(), block_start, ctx.block_frames),
                "dispatch"
            );
        }

        match node.kind() {
            NodeKind::Synthesizer => {
                if let Some(synth) = ctx.pool.synth(handle, ctx.notifier) {
                    for event in events {
                        apply_to_synth(synth, event);
                    }
                }
            }
            NodeKind::MidiTranspose => {
                let params = TransposeParams::from_params(&node.descriptor.params);
                let Some(unit) = ctx.pool.transpose(handle, ctx.notifier) else {
                    return;
                };
                params.apply(unit);

                let state = ctx.transposes.get_or_insert_with(handle, TransposeState::new);
                self.scratch.clear();
                state.retune(params.semitones, &mut self.scratch);
                for event in events {
                    state.process(*event, &*unit, &mut self.scratch);
                }

                let out = mem::take(&mut self.scratch);
                self.enqueue_from(graph, &node.id, &out);
                self.scratch = out;
            }
            NodeKind::Arpeggiator => {
                let arp = ctx.arps.get_or_insert_with(handle, Arpeggiator::new);
                for event in events {
                    arp.note_input(event);
                }
            }
            _ => {}
        }
    }
}

fn apply_to_synth(synth: &mut dyn SynthUnit, event: &MidiEvent) {
    match event.message() {
        MidiMessage::NoteOn { key, velocity, .. } => synth.note_on(key, velocity),
        MidiMessage::NoteOff { key, .. } => synth.note_off(key),
        MidiMessage::ControlChange {
            controller: CC_SUSTAIN,
            value,
            ..
        } => {
            synth.sustain_pedal(value >= 64);
        }
        MidiMessage::ControlChange {
            controller: CC_ALL_NOTES_OFF,
            ..
        } => {
            if synth.release_all_voices() == Capability::Unsupported {
                for note in 0..=127 {
                    synth.note_off(note);
                }
            }
        }
        _ => {}
    }
}
