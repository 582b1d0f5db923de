//! The render engine and its control channel.
//!
//! [`channel`] builds the two halves: an [`EngineHandle`] for the control
//! thread and an [`Engine`] for the render thread, joined by a pair of
//! lock-free SPSC rings. Commands are applied by the render thread itself at
//! the start of each callback, so nothing the engine owns is ever shared.
//!
//! Per chunk of at most `max_block_size` frames:
//!
//! 1. beat clock, sequencer and arpeggiator steps
//! 2. MIDI drain and dispatch
//! 3. parameter edges
//! 4. backward graph walk from the speakers
//! 5. timebase and transport advance

pub mod arpeggiator;
pub mod command;
pub mod notes;
pub mod notify;
pub mod pool;
pub mod render;
pub mod router;
pub mod timebase;
pub mod transport;
pub mod transpose;

use std::mem;

use rtrb::{Consumer, Producer, PushError, RingBuffer};
use tracing::{debug, info};

pub use self::command::{Command, RawMidi};
pub use self::notify::EngineNotification;
pub use self::transport::Transport;

use self::arpeggiator::{ArpMode, Arpeggiator};
use self::notify::Notifier;
use self::pool::{DspInstance, InstancePool};
use self::render::Renderer;
use self::router::{Dispatch, MidiRouter};
use self::timebase::Timebase;
use self::transport::{pattern_length, SequencerState};
use self::transpose::{TransposeParams, TransposeState};
use crate::config::EngineConfig;
use crate::error::BootstrapError;
use crate::graph::{Connection, GraphStore, HandleMap, NodeDescriptor, NodeHandle, NodeId, NodeKind};
use crate::io::midi::MidiEvent;
use crate::native::{NativeModule, OPTIONAL_KINDS, REQUIRED_KINDS};
use crate::MAX_BLOCK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No usable native module (initial, or after a failed bootstrap).
    Uninitialized,
    /// Waiting for the control thread to send a module.
    Bootstrapping,
    Ready,
}

/// Build a connected handle/engine pair.
///
/// Sizes are sanitized rather than rejected: block size is clamped into
/// `1..=MAX_BLOCK_SIZE` and every ring gets at least one slot.
pub fn channel(config: EngineConfig) -> (EngineHandle, Engine) {
    let mut config = config;
    config.max_block_size = config.max_block_size.clamp(1, MAX_BLOCK_SIZE);
    config.command_capacity = config.command_capacity.max(1);
    config.notification_capacity = config.notification_capacity.max(1);
    config.max_dispatch_passes = config.max_dispatch_passes.max(1);
    if !config.sample_rate.is_finite() || config.sample_rate <= 0.0 {
        config.sample_rate = EngineConfig::default().sample_rate;
    }

    let (command_tx, command_rx) = RingBuffer::<Command>::new(config.command_capacity);
    let (notify_tx, notify_rx) = RingBuffer::<EngineNotification>::new(config.notification_capacity);

    let handle = EngineHandle {
        commands: command_tx,
        notifications: notify_rx,
    };
    (handle, Engine::new(config, command_rx, notify_tx))
}

/// Control-thread side of the engine.
pub struct EngineHandle {
    commands: Producer<Command>,
    notifications: Consumer<EngineNotification>,
}

impl EngineHandle {
    /// Queue a command for the next block. A full ring hands it back.
    pub fn send(&mut self, command: Command) -> Result<(), Command> {
        match self.commands.push(command) {
            Ok(()) => Ok(()),
            Err(PushError::Full(command)) => Err(command),
        }
    }

    pub fn poll(&mut self) -> Option<EngineNotification> {
        self.notifications.pop().ok()
    }

    /// Everything the engine has reported so far.
    pub fn drain(&mut self) -> Vec<EngineNotification> {
        let mut out = Vec::with_capacity(self.notifications.slots());
        while let Ok(notification) = self.notifications.pop() {
            out.push(notification);
        }
        out
    }

    pub fn bootstrap(&mut self, module: impl NativeModule + 'static) -> Result<(), Command> {
        self.send(Command::Bootstrap(Box::new(module)))
    }

    pub fn upsert_node(&mut self, id: impl Into<NodeId>, descriptor: NodeDescriptor) -> Result<(), Command> {
        self.send(Command::UpsertNode {
            id: id.into(),
            descriptor,
        })
    }

    pub fn remove_node(&mut self, id: impl Into<NodeId>) -> Result<(), Command> {
        self.send(Command::RemoveNode { id: id.into() })
    }

    pub fn set_connections(&mut self, connections: Vec<Connection>) -> Result<(), Command> {
        self.send(Command::SetConnections(connections))
    }

    pub fn clear(&mut self) -> Result<(), Command> {
        self.send(Command::Clear)
    }

    pub fn update_timebase(&mut self, wall_clock_ms: f64, audio_clock_sec: f64) -> Result<(), Command> {
        self.send(Command::UpdateTimebase {
            wall_clock_ms,
            audio_clock_sec,
        })
    }

    pub fn midi(&mut self, source: impl Into<NodeId>, events: Vec<RawMidi>) -> Result<(), Command> {
        self.send(Command::Midi {
            source: source.into(),
            events,
        })
    }

    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), Command> {
        self.send(Command::SetBpm(bpm))
    }

    pub fn sync_all_next_beat(&mut self) -> Result<(), Command> {
        self.send(Command::SyncAllNextBeat)
    }

    pub fn set_sequencer_rate(&mut self, id: impl Into<NodeId>, multiplier: f64) -> Result<(), Command> {
        self.send(Command::SetSequencerRate {
            id: id.into(),
            multiplier,
        })
    }

    pub fn set_sequencer_play(&mut self, id: impl Into<NodeId>, play: bool) -> Result<(), Command> {
        self.send(Command::SetSequencerPlay { id: id.into(), play })
    }

    pub fn set_arp_rate(&mut self, id: impl Into<NodeId>, multiplier: f64) -> Result<(), Command> {
        self.send(Command::SetArpRate {
            id: id.into(),
            multiplier,
        })
    }

    pub fn set_arp_play(&mut self, id: impl Into<NodeId>, play: bool) -> Result<(), Command> {
        self.send(Command::SetArpPlay { id: id.into(), play })
    }

    pub fn panic(&mut self) -> Result<(), Command> {
        self.send(Command::Panic)
    }
}

/// Render-thread side: owns the graph and everything hanging off it.
pub struct Engine {
    config: EngineConfig,
    state: EngineState,
    commands: Consumer<Command>,
    notifier: Notifier,
    graph: GraphStore,
    pool: InstancePool,
    router: MidiRouter,
    renderer: Renderer,
    timebase: Timebase,
    transport: Transport,
    transposes: HandleMap<TransposeState>,
    sequencers: HandleMap<SequencerState>,
    arps: HandleMap<Arpeggiator>,
    /// Engine-generated MIDI waiting to be routed.
    scratch: Vec<MidiEvent>,
    out_left: Vec<f32>,
    out_right: Vec<f32>,
}

impl Engine {
    fn new(config: EngineConfig, commands: Consumer<Command>, notifications: Producer<EngineNotification>) -> Self {
        let mut notifier = Notifier::new(notifications);
        notifier.send(EngineNotification::NeedBootstrap);

        Self {
            state: EngineState::Bootstrapping,
            commands,
            notifier,
            graph: GraphStore::new(),
            pool: InstancePool::new(config.sample_rate),
            router: MidiRouter::new(),
            renderer: Renderer::new(config.max_block_size),
            timebase: Timebase::new(config.sample_rate),
            transport: Transport::new(config.default_bpm, config.sample_rate),
            transposes: HandleMap::new(),
            sequencers: HandleMap::new(),
            arps: HandleMap::new(),
            scratch: Vec::with_capacity(256),
            out_left: vec![0.0; config.max_block_size],
            out_right: vec![0.0; config.max_block_size],
            config,
        }
    }

    /// Apply pending commands, then render `left`/`right` in full.
    ///
    /// Before bootstrap both outputs are silence and no clock advances.
    pub fn render_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.apply_commands();
        self.render_chunks(left, right);
    }

    /// Single-channel hosts.
    pub fn render_mono(&mut self, out: &mut [f32]) {
        self.apply_commands();
        let mut left = mem::take(&mut self.out_left);
        let mut right = mem::take(&mut self.out_right);
        for chunk in out.chunks_mut(self.config.max_block_size) {
            let frames = chunk.len();
            self.render_chunks(&mut left[..frames], &mut right[..frames]);
            chunk.copy_from_slice(&left[..frames]);
        }
        self.out_left = left;
        self.out_right = right;
    }

    /// Interleaved hosts: even channels carry left, odd channels right.
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        self.apply_commands();
        if channels == 0 {
            data.fill(0.0);
            return;
        }
        let mut left = mem::take(&mut self.out_left);
        let mut right = mem::take(&mut self.out_right);
        for chunk in data.chunks_mut(self.config.max_block_size * channels) {
            let frames = chunk.len() / channels;
            self.render_chunks(&mut left[..frames], &mut right[..frames]);

            let mut frames_out = chunk.chunks_exact_mut(channels);
            for (frame, (&l, &r)) in (&mut frames_out).zip(left.iter().zip(right.iter())) {
                for (channel, sample) in frame.iter_mut().enumerate() {
                    *sample = if channel % 2 == 0 { l } else { r };
                }
            }
            frames_out.into_remainder().fill(0.0);
        }
        self.out_left = left;
        self.out_right = right;
    }

    fn render_chunks(&mut self, left: &mut [f32], right: &mut [f32]) {
        left.fill(0.0);
        right.fill(0.0);
        if self.state != EngineState::Ready {
            return;
        }

        let frames = left.len().min(right.len());
        let mut offset = 0;
        while offset < frames {
            let len = (frames - offset).min(self.config.max_block_size);
            self.process_chunk(&mut left[offset..offset + len], &mut right[offset..offset + len]);
            offset += len;
        }
    }

    fn process_chunk(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len();
        self.run_clocks(frames);

        let mut ctx = Dispatch {
            graph: &self.graph,
            pool: &mut self.pool,
            transposes: &mut self.transposes,
            arps: &mut self.arps,
            notifier: &mut self.notifier,
            timebase: &self.timebase,
            block_frames: frames,
        };
        self.router.drain_and_dispatch(&mut ctx, self.config.max_dispatch_passes);

        self.graph.apply_param_edges();
        self.renderer
            .render_block(&self.graph, &mut self.pool, &mut self.notifier, left, right);

        self.timebase.advance(frames);
        self.transport.advance(frames);
    }

    /// Beats falling in this chunk, then step advance for every clock.
    fn run_clocks(&mut self, frames: usize) {
        while let Some(beat) = self.transport.next_beat(frames) {
            self.notifier.send(EngineNotification::Beat {
                index: beat.index,
                bpm: beat.bpm,
            });

            for (_, sequencer) in self.sequencers.iter_mut() {
                sequencer.clock.on_beat();
            }
            for (handle, arp) in self.arps.iter_mut() {
                if arp.clock.on_beat() {
                    arp.start(&mut self.scratch);
                    route(&mut self.router, &self.graph, handle, &mut self.scratch);
                }
            }

            if beat.sync {
                self.notifier.send(EngineNotification::SyncScheduled { beat: beat.index });
                for (handle, sequencer) in self.sequencers.iter_mut() {
                    if sequencer.clock.resync() {
                        if let Some(node) = self.graph.node(handle) {
                            self.notifier.send(EngineNotification::SequencerStep {
                                id: node.id.clone(),
                                step: 0,
                            });
                        }
                    }
                }
            }

            for (handle, sequencer) in self.sequencers.iter_mut() {
                if sequencer.clock.take_announcement() {
                    if let Some(node) = self.graph.node(handle) {
                        self.notifier.send(EngineNotification::SequencerStep {
                            id: node.id.clone(),
                            step: 0,
                        });
                    }
                }
            }
        }

        let beats = self.transport.beats_in(frames);
        for (handle, sequencer) in self.sequencers.iter_mut() {
            let Some(node) = self.graph.node(handle) else {
                continue;
            };
            let length = pattern_length(node.descriptor.params.number("length"));
            if sequencer.clock.advance(beats, length) > 0 {
                self.notifier.send(EngineNotification::SequencerStep {
                    id: node.id.clone(),
                    step: sequencer.clock.step(),
                });
            }
        }

        for (handle, arp) in self.arps.iter_mut() {
            let steps = arp.clock.advance(beats, usize::MAX);
            if steps == 0 {
                continue;
            }
            let Some(node) = self.graph.node(handle) else {
                continue;
            };
            for _ in 0..steps {
                if let Some(note) = arp.step(&mut self.scratch) {
                    self.notifier.send(EngineNotification::ArpNote {
                        id: node.id.clone(),
                        note,
                    });
                }
            }
            route(&mut self.router, &self.graph, handle, &mut self.scratch);
        }
    }

    /// Apply the commands queued so far, in arrival order.
    fn apply_commands(&mut self) {
        for _ in 0..self.commands.slots() {
            match self.commands.pop() {
                Ok(command) => self.apply(command),
                Err(_) => break,
            }
        }
    }

    fn apply(&mut self, command: Command) {
        debug!(command = command.name(), "apply");
        match command {
            Command::Bootstrap(module) => self.bootstrap(module),
            Command::UpsertNode { id, descriptor } => self.upsert_node(id, descriptor),
            Command::RemoveNode { id } => {
                if let Some(handle) = self.graph.handle(&id) {
                    if let Some(kind) = self.graph.kind(handle).cloned() {
                        self.teardown(handle, &id, &kind);
                    }
                    self.graph.remove_node(&id);
                }
                self.notifier.send(EngineNotification::AckRemove { id });
            }
            Command::SetConnections(connections) => {
                let count = connections.len();
                self.graph.set_connections(connections);
                self.notifier.send(EngineNotification::AckConnections { count });
            }
            Command::Clear => {
                self.graph.clear();
                self.pool.free_all();
                self.router.clear();
                self.transposes.clear();
                self.sequencers.clear();
                self.arps.clear();
                self.notifier.send(EngineNotification::AckClear);
            }
            Command::UpdateTimebase {
                wall_clock_ms,
                audio_clock_sec,
            } => self.timebase.sync(wall_clock_ms, audio_clock_sec),
            Command::Midi { source, events } => {
                if let Some(sequencer) = self
                    .graph
                    .handle(&source)
                    .and_then(|handle| self.sequencers.get_mut(handle))
                {
                    for event in events.iter().filter_map(RawMidi::event) {
                        sequencer.sounding.observe(&event);
                    }
                }
                self.router.enqueue_raw(&self.graph, &source, &events);
            }
            Command::SetBpm(bpm) => {
                if !self.transport.set_bpm(bpm) {
                    debug!(bpm, "tempo out of range, ignored");
                }
            }
            Command::SyncAllNextBeat => self.transport.request_sync(),
            Command::SetSequencerRate { id, multiplier } => {
                if let Some((_, sequencer)) = runtime_mut(&self.graph, &mut self.sequencers, &id) {
                    sequencer.clock.queue_rate(multiplier);
                }
            }
            Command::SetSequencerPlay { id, play } => {
                if let Some((handle, sequencer)) = runtime_mut(&self.graph, &mut self.sequencers, &id) {
                    if play {
                        sequencer.clock.request_start();
                    } else {
                        sequencer.clock.stop();
                        sequencer.sounding.drain_offs(&mut self.scratch);
                        route(&mut self.router, &self.graph, handle, &mut self.scratch);
                    }
                }
            }
            Command::SetArpRate { id, multiplier } => {
                if let Some((_, arp)) = runtime_mut(&self.graph, &mut self.arps, &id) {
                    arp.clock.queue_rate(multiplier);
                }
            }
            Command::SetArpPlay { id, play } => {
                if let Some((handle, arp)) = runtime_mut(&self.graph, &mut self.arps, &id) {
                    if play {
                        arp.clock.request_start();
                    } else {
                        arp.stop(&mut self.scratch);
                        route(&mut self.router, &self.graph, handle, &mut self.scratch);
                    }
                }
            }
            Command::Panic => {
                for (handle, sequencer) in self.sequencers.iter_mut() {
                    sequencer.sounding.drain_offs(&mut self.scratch);
                    route(&mut self.router, &self.graph, handle, &mut self.scratch);
                }
                for (handle, arp) in self.arps.iter_mut() {
                    arp.flush(&mut self.scratch);
                    route(&mut self.router, &self.graph, handle, &mut self.scratch);
                }
                self.router.all_notes_off_to_synths(&self.graph);
            }
        }
    }

    fn bootstrap(&mut self, module: Box<dyn NativeModule>) {
        self.notifier.send(EngineNotification::AckBootstrap);
        if self.state == EngineState::Ready {
            debug!(module = module.name(), "already bootstrapped, ignored");
            return;
        }

        if let Some(kind) = REQUIRED_KINDS.iter().find(|kind| !module.provides(kind)) {
            let err = BootstrapError::MissingConstructor {
                module: module.name().to_string(),
                kind: kind.clone(),
            };
            self.notifier.error(err.to_string(), true);
            self.state = EngineState::Uninitialized;
            return;
        }
        for kind in OPTIONAL_KINDS.iter().filter(|kind| !module.provides(kind)) {
            let err = BootstrapError::MissingConstructor {
                module: module.name().to_string(),
                kind: kind.clone(),
            };
            self.notifier.error(err.to_string(), false);
        }

        info!(module = module.name(), sample_rate = self.config.sample_rate, "engine ready");
        self.pool.install(module);
        self.state = EngineState::Ready;
        self.notifier.send(EngineNotification::Ready {
            sample_rate: self.config.sample_rate,
        });
    }

    fn upsert_node(&mut self, id: NodeId, descriptor: NodeDescriptor) {
        let kind = descriptor.kind.clone();
        let (handle, previous) = self.graph.upsert_node(id.clone(), descriptor);
        if let Some(previous) = previous.filter(|previous| previous.kind != kind) {
            self.teardown(handle, &id, &previous.kind);
        }

        let Some(params) = self.graph.node(handle).map(|node| &node.descriptor.params) else {
            return;
        };
        match kind {
            NodeKind::MidiTranspose => {
                // Shift changes flush now so the offs go out on the next drain.
                let semitones = TransposeParams::from_params(params).semitones;
                if let Some(state) = self.transposes.get_mut(handle) {
                    state.retune(semitones, &mut self.scratch);
                }
            }
            NodeKind::Sequencer => {
                let sequencer = self.sequencers.get_or_insert_with(handle, SequencerState::default);
                if let Some(rate) = params.number("rateMultiplier") {
                    sequencer.clock.set_rate(rate);
                }
                if params.truthy("playing") && !sequencer.clock.is_pending() {
                    sequencer.clock.request_start();
                }
            }
            NodeKind::Arpeggiator => {
                let arp = self.arps.get_or_insert_with(handle, Arpeggiator::new);
                if let Some(rate) = params.number("rateMultiplier") {
                    arp.clock.set_rate(rate);
                }
                if params.truthy("playing") {
                    arp.clock.request_start();
                }
                let mode = params.text("mode").map_or(arp.mode(), ArpMode::from_name);
                let octaves = params.number("octaves").map_or(1, |n| n.clamp(1.0, 4.0) as u8);
                arp.configure(mode, octaves, &mut self.scratch);
            }
            _ => {}
        }
        route(&mut self.router, &self.graph, handle, &mut self.scratch);

        self.renderer.reserve(self.graph.slot_capacity() + 1);
        self.notifier.send(EngineNotification::AckNode { id });
    }

    /// Release everything the engine keeps for a node, flushing notes it may
    /// have left sounding downstream.
    fn teardown(&mut self, handle: NodeHandle, id: &NodeId, kind: &NodeKind) {
        match kind {
            NodeKind::MidiTranspose => {
                // Offs go to current targets; with nothing tracked to flush, or
                // nowhere to send it, every synth gets CC 123 instead.
                if let Some(mut state) = self.transposes.remove(handle) {
                    state.flush(&mut self.scratch);
                }
                if self.scratch.is_empty() || self.graph.midi_targets(id).next().is_none() {
                    self.scratch.clear();
                    self.router.all_notes_off_to_synths(&self.graph);
                }
            }
            kind if kind.emits_notes() => {
                self.router.all_notes_off_to_synths(&self.graph);
            }
            NodeKind::Arpeggiator => {
                if let Some(mut arp) = self.arps.remove(handle) {
                    arp.flush(&mut self.scratch);
                }
            }
            _ => {}
        }
        self.router.enqueue_from(&self.graph, id, &self.scratch);
        self.scratch.clear();

        self.transposes.remove(handle);
        self.sequencers.remove(handle);
        self.arps.remove(handle);
        self.router.forget(handle);
        self.pool.free(handle);
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn node_count(&self) -> usize {
        self.graph.len()
    }

    pub fn connection_count(&self) -> usize {
        self.graph.connection_count()
    }

    pub fn instance_count(&self) -> usize {
        self.pool.len()
    }

    pub fn instance_kind(&self, id: &NodeId) -> Option<NodeKind> {
        let handle = self.graph.handle(id)?;
        self.pool.instance(handle).map(DspInstance::kind)
    }

    /// Creation serial of a node's live instance; a new serial means a new
    /// instance.
    pub fn instance_serial(&self, id: &NodeId) -> Option<u64> {
        self.graph.handle(id).and_then(|handle| self.pool.serial(handle))
    }

    pub fn queued_events(&self, id: &NodeId) -> usize {
        self.graph.handle(id).map_or(0, |handle| self.router.queued(handle))
    }

    pub fn synth_active_voices(&self, id: &NodeId) -> Option<usize> {
        let handle = self.graph.handle(id)?;
        match self.pool.instance(handle)? {
            DspInstance::Synth(synth) => Some(synth.active_voices()),
            _ => None,
        }
    }

    pub fn transpose_active_notes(&self, id: &NodeId) -> usize {
        self.graph
            .handle(id)
            .and_then(|handle| self.transposes.get(handle))
            .map_or(0, TransposeState::active_notes)
    }

    pub fn sequencer_step(&self, id: &NodeId) -> Option<usize> {
        let handle = self.graph.handle(id)?;
        self.sequencers.get(handle).map(|sequencer| sequencer.clock.step())
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Notifications lost to a full ring.
    pub fn notifications_dropped(&self) -> u64 {
        self.notifier.dropped()
    }
}

/// Per-node runtime state for `id`, present only while the node has the
/// matching kind.
fn runtime_mut<'a, T>(graph: &GraphStore, map: &'a mut HandleMap<T>, id: &NodeId) -> Option<(NodeHandle, &'a mut T)> {
    let handle = graph.handle(id)?;
    map.get_mut(handle).map(|state| (handle, state))
}

/// Send engine-generated MIDI from `source` downstream, then clear it.
fn route(router: &mut MidiRouter, graph: &GraphStore, source: NodeHandle, events: &mut Vec<MidiEvent>) {
    if events.is_empty() {
        return;
    }
    if let Some(node) = graph.node(source) {
        router.enqueue_from(graph, &node.id, events);
    }
    events.clear();
}
