use std::sync::{Arc, Mutex};

use patchbay::dsp::{BuiltinModule, OscillatorBlock, PolySynth, Waveform};
use patchbay::error::UnitError;
use patchbay::io::midi::MidiEvent;
use patchbay::native::{NativeModule, OscillatorUnit, ReverbUnit, SynthUnit, TransposeUnit};
use patchbay::{
    channel, Connection, Engine, EngineConfig, EngineHandle, EngineNotification, EngineState, NodeDescriptor,
    NodeId, NodeKind, RawMidi,
};

const BLOCK: usize = 128;

fn engine() -> (EngineHandle, Engine) {
    channel(EngineConfig::default().with_max_block_size(BLOCK))
}

fn ready() -> (EngineHandle, Engine) {
    let (mut handle, mut engine) = engine();
    handle.bootstrap(BuiltinModule).expect("ring has room");
    render(&mut engine);
    handle.drain();
    (handle, engine)
}

fn render(engine: &mut Engine) -> (Vec<f32>, Vec<f32>) {
    let mut left = vec![1.0; BLOCK];
    let mut right = vec![1.0; BLOCK];
    engine.render_block(&mut left, &mut right);
    (left, right)
}

fn is_silent(buffer: &[f32]) -> bool {
    buffer.iter().all(|&s| s == 0.0)
}

fn id(name: &str) -> NodeId {
    NodeId::from(name)
}

fn midi(handle: &mut EngineHandle, source: &str, events: &[MidiEvent]) {
    let events = events.iter().copied().map(RawMidi::from).collect();
    handle.midi(source, events).expect("ring has room");
}

fn reference_osc(frequency: f32, amplitude: f32, waveform: Waveform) -> Vec<f32> {
    let mut osc = OscillatorBlock::new(48_000.0);
    osc.set_frequency(frequency);
    osc.set_amplitude(amplitude);
    osc.set_waveform(waveform);
    let mut block = vec![0.0; BLOCK];
    osc.process(&mut block).expect("builtin oscillator never fails");
    block
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < 1e-6, "sample {i}: {a} != {e}");
    }
}

/// Builtin units, except the synth records every note it is asked to play.
struct RecordingModule {
    log: Arc<Mutex<Vec<(bool, u8)>>>,
}

struct RecordingSynth {
    log: Arc<Mutex<Vec<(bool, u8)>>>,
    inner: PolySynth,
}

impl SynthUnit for RecordingSynth {
    fn note_on(&mut self, note: u8, velocity: u8) {
        self.log.lock().unwrap().push((true, note));
        self.inner.note_on(note, velocity);
    }

    fn note_off(&mut self, note: u8) {
        self.log.lock().unwrap().push((false, note));
        self.inner.note_off(note);
    }

    fn set_waveform(&mut self, waveform: Waveform) {
        self.inner.set_waveform(waveform);
    }

    fn set_adsr(&mut self, attack: f32, decay: f32, sustain: f32, release: f32) {
        self.inner.set_adsr(attack, decay, sustain, release);
    }

    fn set_gain(&mut self, gain: f32) {
        self.inner.set_gain(gain);
    }

    fn active_voices(&self) -> usize {
        self.inner.active_voices()
    }

    fn process(&mut self, out: &mut [f32]) -> Result<(), UnitError> {
        self.inner.process(out)
    }
}

impl NativeModule for RecordingModule {
    fn name(&self) -> &str {
        "recording"
    }

    fn oscillator(&self, sample_rate: f32) -> Option<Box<dyn OscillatorUnit>> {
        BuiltinModule.oscillator(sample_rate)
    }

    fn reverb(&self, sample_rate: f32) -> Option<Box<dyn ReverbUnit>> {
        BuiltinModule.reverb(sample_rate)
    }

    fn synthesizer(&self, sample_rate: f32) -> Option<Box<dyn SynthUnit>> {
        Some(Box::new(RecordingSynth {
            log: self.log.clone(),
            inner: PolySynth::new(sample_rate),
        }))
    }

    fn transpose(&self) -> Option<Box<dyn TransposeUnit>> {
        BuiltinModule.transpose()
    }

    fn provides(&self, kind: &NodeKind) -> bool {
        BuiltinModule.provides(kind)
    }
}

/// Only oscillators: missing a required constructor.
struct OscOnly;

impl NativeModule for OscOnly {
    fn name(&self) -> &str {
        "osc-only"
    }

    fn oscillator(&self, sample_rate: f32) -> Option<Box<dyn OscillatorUnit>> {
        BuiltinModule.oscillator(sample_rate)
    }

    fn reverb(&self, _sample_rate: f32) -> Option<Box<dyn ReverbUnit>> {
        None
    }

    fn synthesizer(&self, _sample_rate: f32) -> Option<Box<dyn SynthUnit>> {
        None
    }

    fn transpose(&self) -> Option<Box<dyn TransposeUnit>> {
        None
    }

    fn provides(&self, kind: &NodeKind) -> bool {
        *kind == NodeKind::Oscillator
    }
}

/// Everything but a synthesizer.
struct NoSynth;

impl NativeModule for NoSynth {
    fn name(&self) -> &str {
        "no-synth"
    }

    fn oscillator(&self, sample_rate: f32) -> Option<Box<dyn OscillatorUnit>> {
        BuiltinModule.oscillator(sample_rate)
    }

    fn reverb(&self, sample_rate: f32) -> Option<Box<dyn ReverbUnit>> {
        BuiltinModule.reverb(sample_rate)
    }

    fn synthesizer(&self, _sample_rate: f32) -> Option<Box<dyn SynthUnit>> {
        None
    }

    fn transpose(&self) -> Option<Box<dyn TransposeUnit>> {
        BuiltinModule.transpose()
    }

    fn provides(&self, kind: &NodeKind) -> bool {
        *kind != NodeKind::Synthesizer && BuiltinModule.provides(kind)
    }
}

fn recording() -> (EngineHandle, Engine, Arc<Mutex<Vec<(bool, u8)>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (mut handle, mut engine) = engine();
    handle
        .bootstrap(RecordingModule { log: log.clone() })
        .expect("ring has room");
    render(&mut engine);
    handle.drain();
    (handle, engine, log)
}

fn errors(notifications: &[EngineNotification]) -> Vec<(String, bool)> {
    notifications
        .iter()
        .filter_map(|n| match n {
            EngineNotification::Error { message, fatal } => Some((message.clone(), *fatal)),
            _ => None,
        })
        .collect()
}

#[test]
fn renders_silence_before_bootstrap() {
    let (mut handle, mut engine) = engine();
    handle.upsert_node("osc", NodeDescriptor::oscillator()).expect("room");
    handle.upsert_node("out", NodeDescriptor::speaker()).expect("room");
    handle
        .set_connections(vec![Connection::audio("osc", "out")])
        .expect("room");

    let (left, right) = render(&mut engine);
    assert_eq!(engine.state(), EngineState::Bootstrapping);
    assert!(is_silent(&left) && is_silent(&right));
    assert_eq!(engine.node_count(), 2);
    assert_eq!(engine.instance_count(), 0);
}

#[test]
fn missing_required_constructor_is_fatal_and_silent() {
    let (mut handle, mut engine) = engine();
    handle.bootstrap(OscOnly).expect("room");
    handle.upsert_node("osc", NodeDescriptor::oscillator()).expect("room");
    handle.upsert_node("out", NodeDescriptor::speaker()).expect("room");
    handle
        .set_connections(vec![Connection::audio("osc", "out")])
        .expect("room");

    for _ in 0..3 {
        let (left, right) = render(&mut engine);
        assert!(is_silent(&left) && is_silent(&right));
    }
    assert_eq!(engine.state(), EngineState::Uninitialized);

    let notifications = handle.drain();
    let errors = errors(&notifications);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].1, "bootstrap failure must be fatal");
    assert!(errors[0].0.contains("reverb"), "{}", errors[0].0);
    assert!(!notifications
        .iter()
        .any(|n| matches!(n, EngineNotification::Ready { .. })));
}

#[test]
fn missing_optional_constructor_is_reported_and_retried() {
    let (mut handle, mut engine) = engine();
    handle.bootstrap(NoSynth).expect("room");
    handle.upsert_node("lead", NodeDescriptor::synthesizer()).expect("room");
    handle.upsert_node("out", NodeDescriptor::speaker()).expect("room");
    handle
        .set_connections(vec![Connection::audio("lead", "out")])
        .expect("room");

    render(&mut engine);
    assert_eq!(engine.state(), EngineState::Ready);
    let first = errors(&handle.drain());
    // One at bootstrap, one for the failed construction.
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|(_, fatal)| !fatal));

    let (left, _) = render(&mut engine);
    assert!(is_silent(&left));
    assert_eq!(errors(&handle.drain()).len(), 1);
    assert_eq!(engine.instance_count(), 0);
}

#[test]
fn removing_an_unknown_node_is_a_no_op() {
    let (mut handle, mut engine) = ready();
    handle.remove_node("ghost").expect("room");
    handle.remove_node("ghost").expect("room");
    let (left, _) = render(&mut engine);

    assert!(is_silent(&left));
    assert_eq!(engine.node_count(), 0);
    assert_eq!(engine.instance_count(), 0);
    assert_eq!(engine.queued_events(&id("ghost")), 0);
    let acks = handle
        .drain()
        .into_iter()
        .filter(|n| matches!(n, EngineNotification::AckRemove { .. }))
        .count();
    assert_eq!(acks, 2);
}

#[test]
fn reupserted_node_gets_a_fresh_instance() {
    let (mut handle, mut engine) = ready();
    let osc = NodeDescriptor::oscillator()
        .with("frequency", 440.0)
        .with("amplitude", 0.5);
    handle.upsert_node("osc", osc.clone()).expect("room");
    handle.upsert_node("out", NodeDescriptor::speaker()).expect("room");
    handle
        .set_connections(vec![Connection::audio("osc", "out")])
        .expect("room");

    let (first, _) = render(&mut engine);
    render(&mut engine);
    assert_eq!(engine.instance_count(), 1);
    assert_eq!(engine.instance_kind(&id("osc")), Some(NodeKind::Oscillator));
    let before = engine.instance_serial(&id("osc")).expect("instance exists");

    handle.remove_node("osc").expect("room");
    render(&mut engine);
    assert_eq!(engine.instance_count(), 0);
    assert_eq!(engine.instance_serial(&id("osc")), None);

    handle.upsert_node("osc", osc).expect("room");
    let (again, _) = render(&mut engine);
    let after = engine.instance_serial(&id("osc")).expect("instance exists");
    assert_ne!(before, after);
    // Phase starts over: nothing carried from the old instance.
    assert_close(&again, &first);
}

#[test]
fn cycles_render_bounded_and_deterministic() {
    let build = || {
        let (mut handle, mut engine) = ready();
        handle.upsert_node("osc", NodeDescriptor::oscillator()).expect("room");
        handle.upsert_node("a", NodeDescriptor::reverb()).expect("room");
        handle.upsert_node("b", NodeDescriptor::reverb()).expect("room");
        handle.upsert_node("out", NodeDescriptor::speaker()).expect("room");
        handle
            .set_connections(vec![
                Connection::audio("osc", "a"),
                Connection::audio("a", "b"),
                Connection::audio("b", "a"),
                Connection::audio("b", "out"),
            ])
            .expect("room");
        engine
    };

    let mut one = build();
    let mut two = build();
    for _ in 0..8 {
        let (l1, r1) = render(&mut one);
        let (l2, _) = render(&mut two);
        assert!(l1.iter().all(|s| s.is_finite()));
        assert_eq!(l1, r1);
        assert_eq!(l1, l2);
    }
    assert_eq!(one.instance_count(), 3);
}

#[test]
fn transpose_flushes_on_retune_and_balances_offs() {
    let (mut handle, mut engine, log) = recording();
    handle.upsert_node("keys", NodeDescriptor::new("midi-input")).expect("room");
    handle.upsert_node("shift", NodeDescriptor::transpose(2)).expect("room");
    handle.upsert_node("lead", NodeDescriptor::synthesizer()).expect("room");
    handle
        .set_connections(vec![
            Connection::midi("keys", "shift"),
            Connection::midi("shift", "lead"),
        ])
        .expect("room");

    midi(&mut handle, "keys", &[MidiEvent::note_on(0, 60, 100)]);
    render(&mut engine);
    assert_eq!(*log.lock().unwrap(), vec![(true, 62)]);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(1));
    assert_eq!(engine.transpose_active_notes(&id("shift")), 1);

    handle.upsert_node("shift", NodeDescriptor::transpose(5)).expect("room");
    render(&mut engine);
    assert_eq!(*log.lock().unwrap(), vec![(true, 62), (false, 62)]);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(0));

    midi(&mut handle, "keys", &[MidiEvent::note_off(0, 60)]);
    render(&mut engine);
    assert_eq!(*log.lock().unwrap(), vec![(true, 62), (false, 62), (false, 65)]);
    assert_eq!(engine.transpose_active_notes(&id("shift")), 0);
}

#[test]
fn transposed_notes_stay_inside_the_clamp_range() {
    let (mut handle, mut engine, log) = recording();
    handle.upsert_node("keys", NodeDescriptor::new("midi-input")).expect("room");
    handle
        .upsert_node(
            "shift",
            NodeDescriptor::transpose(24)
                .with("clampLow", 48.0)
                .with("clampHigh", 72.0),
        )
        .expect("room");
    handle.upsert_node("lead", NodeDescriptor::synthesizer()).expect("room");
    handle
        .set_connections(vec![
            Connection::midi("keys", "shift"),
            Connection::midi("shift", "lead"),
        ])
        .expect("room");

    let keys = [0u8, 20, 36, 40, 60, 100, 127];
    let ons: Vec<_> = keys.iter().map(|&k| MidiEvent::note_on(0, k, 90)).collect();
    midi(&mut handle, "keys", &ons);
    render(&mut engine);

    let played = log.lock().unwrap().clone();
    assert_eq!(played.len(), keys.len());
    assert!(played.iter().all(|&(_, note)| (48..=72).contains(&note)), "{played:?}");
}

#[test]
fn no_sink_means_silence() {
    let (mut handle, mut engine) = ready();
    handle
        .upsert_node("osc", NodeDescriptor::oscillator().with("amplitude", 1.0))
        .expect("room");
    handle.upsert_node("room", NodeDescriptor::reverb()).expect("room");
    handle
        .set_connections(vec![Connection::audio("osc", "room")])
        .expect("room");

    for _ in 0..4 {
        let (left, right) = render(&mut engine);
        assert!(is_silent(&left) && is_silent(&right));
    }
}

#[test]
fn oscillator_into_speaker_is_scaled_by_volume() {
    let (mut handle, mut engine) = ready();
    handle
        .upsert_node(
            "osc",
            NodeDescriptor::oscillator()
                .with("frequency", 440.0)
                .with("amplitude", 0.5)
                .with("waveform", "sine"),
        )
        .expect("room");
    handle
        .upsert_node("out", NodeDescriptor::speaker().with("volume", 0.8).with("muted", false))
        .expect("room");
    handle
        .set_connections(vec![Connection::audio("osc", "out")])
        .expect("room");

    let (left, right) = render(&mut engine);
    let expected: Vec<f32> = reference_osc(440.0, 0.5, Waveform::Sine)
        .iter()
        .map(|s| s * 0.8)
        .collect();
    assert_close(&left, &expected);
    assert_close(&right, &expected);
}

#[test]
fn sequencer_note_off_leaves_no_active_voices() {
    let (mut handle, mut engine) = ready();
    handle.upsert_node("seq", NodeDescriptor::sequencer()).expect("room");
    handle
        .upsert_node("lead", NodeDescriptor::synthesizer().with("maxVoices", 8.0))
        .expect("room");
    handle.upsert_node("out", NodeDescriptor::speaker()).expect("room");
    handle
        .set_connections(vec![
            Connection::midi("seq", "lead"),
            Connection::audio("lead", "out"),
        ])
        .expect("room");

    midi(&mut handle, "seq", &[MidiEvent::note_on(0, 60, 100)]);
    render(&mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(1));

    midi(&mut handle, "seq", &[MidiEvent::note_off(0, 60)]);
    render(&mut engine);
    assert_eq!(engine.queued_events(&id("lead")), 0);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(0));
}

#[test]
fn clear_then_render_is_silent_and_empty() {
    let (mut handle, mut engine) = ready();
    handle.upsert_node("osc", NodeDescriptor::oscillator()).expect("room");
    handle.upsert_node("lead", NodeDescriptor::synthesizer()).expect("room");
    handle.upsert_node("out", NodeDescriptor::speaker()).expect("room");
    handle
        .set_connections(vec![
            Connection::audio("osc", "out"),
            Connection::audio("lead", "out"),
        ])
        .expect("room");
    let (left, _) = render(&mut engine);
    assert!(!is_silent(&left));
    assert_eq!(engine.instance_count(), 2);

    handle.clear().expect("room");
    let (left, right) = render(&mut engine);
    assert!(is_silent(&left) && is_silent(&right));
    assert_eq!(engine.node_count(), 0);
    assert_eq!(engine.connection_count(), 0);
    assert_eq!(engine.instance_count(), 0);
    assert!(handle.drain().contains(&EngineNotification::AckClear));
}

#[test]
fn sustain_pedal_and_panic() {
    let (mut handle, mut engine) = ready();
    handle.upsert_node("keys", NodeDescriptor::new("midi-input")).expect("room");
    handle.upsert_node("lead", NodeDescriptor::synthesizer()).expect("room");
    handle
        .set_connections(vec![Connection::midi("keys", "lead")])
        .expect("room");

    midi(
        &mut handle,
        "keys",
        &[
            MidiEvent::control_change(0, 64, 127),
            MidiEvent::note_on(0, 60, 100),
            MidiEvent::note_off(0, 60),
        ],
    );
    render(&mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(1));

    midi(&mut handle, "keys", &[MidiEvent::control_change(0, 64, 0)]);
    render(&mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(0));

    midi(&mut handle, "keys", &[MidiEvent::note_on(0, 64, 100), MidiEvent::note_on(0, 67, 100)]);
    render(&mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(2));

    handle.panic().expect("room");
    render(&mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(0));
}

#[test]
fn removing_a_midi_source_releases_its_notes() {
    let (mut handle, mut engine) = ready();
    handle.upsert_node("keys", NodeDescriptor::new("midi-input")).expect("room");
    handle.upsert_node("lead", NodeDescriptor::synthesizer()).expect("room");
    handle
        .set_connections(vec![Connection::midi("keys", "lead")])
        .expect("room");

    midi(&mut handle, "keys", &[MidiEvent::note_on(0, 60, 100)]);
    render(&mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(1));

    handle.remove_node("keys").expect("room");
    render(&mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(0));
}

#[test]
fn value_nodes_drive_params() {
    let (mut handle, mut engine) = ready();
    handle.upsert_node("pitch", NodeDescriptor::new("value").with("value", 880.0)).expect("room");
    handle.upsert_node("osc", NodeDescriptor::oscillator()).expect("room");
    handle.upsert_node("out", NodeDescriptor::speaker()).expect("room");
    handle
        .set_connections(vec![
            Connection::param("pitch", "osc", "frequency"),
            Connection::audio("osc", "out"),
        ])
        .expect("room");

    let (left, _) = render(&mut engine);
    assert_close(&left, &reference_osc(880.0, 0.5, Waveform::Sine));
}

#[test]
fn arpeggiator_walks_the_held_chord() {
    let (mut handle, mut engine) = ready();
    handle.upsert_node("keys", NodeDescriptor::new("midi-input")).expect("room");
    handle
        .upsert_node(
            "arp",
            NodeDescriptor::new("arpeggiator")
                .with("mode", "up")
                .with("rateMultiplier", 4.0)
                .with("playing", true),
        )
        .expect("room");
    handle.upsert_node("lead", NodeDescriptor::synthesizer()).expect("room");
    handle
        .set_connections(vec![Connection::midi("keys", "arp"), Connection::midi("arp", "lead")])
        .expect("room");
    midi(
        &mut handle,
        "keys",
        &[
            MidiEvent::note_on(0, 67, 100),
            MidiEvent::note_on(0, 60, 100),
            MidiEvent::note_on(0, 64, 100),
        ],
    );

    // Starts on beat 1, then four steps per beat at 120 BPM.
    let mut notes = Vec::new();
    for _ in 0..(72_000 / BLOCK) {
        render(&mut engine);
        notes.extend(handle.drain().into_iter().filter_map(|n| match n {
            EngineNotification::ArpNote { note, .. } => Some(note),
            _ => None,
        }));
    }
    assert!(notes.len() >= 4, "{notes:?}");
    assert_eq!(&notes[..4], &[60u8, 64, 67, 60]);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(1));

    handle.set_arp_play("arp", false).expect("room");
    render(&mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(0));
}

#[test]
fn tempo_changes_land_on_the_next_beat() {
    let (mut handle, mut engine) = ready();
    handle.set_bpm(500.0).expect("room");
    handle.set_bpm(90.0).expect("room");
    render(&mut engine);
    assert_eq!(engine.transport().bpm(), 120.0);

    let mut beats = Vec::new();
    for _ in 0..(30_000 / BLOCK) {
        render(&mut engine);
        beats.extend(handle.drain().into_iter().filter_map(|n| match n {
            EngineNotification::Beat { index, bpm } => Some((index, bpm)),
            _ => None,
        }));
    }
    assert_eq!(beats.first(), Some(&(1, 90.0)));
    assert_eq!(engine.transport().bpm(), 90.0);
}

#[test]
fn mono_and_long_callbacks_are_chunked() {
    let (mut handle, mut engine) = ready();
    handle.upsert_node("osc", NodeDescriptor::oscillator()).expect("room");
    handle.upsert_node("out", NodeDescriptor::speaker()).expect("room");
    handle
        .set_connections(vec![Connection::audio("osc", "out")])
        .expect("room");

    let mut out = vec![0.0; BLOCK * 3 + 17];
    engine.render_mono(&mut out);

    let mut osc = OscillatorBlock::new(48_000.0);
    osc.set_frequency(440.0);
    osc.set_amplitude(0.5);
    let mut expected = vec![0.0; out.len()];
    osc.process(&mut expected).expect("builtin oscillator never fails");
    assert_close(&out, &expected);
}

fn transpose_rig(handle: &mut EngineHandle, engine: &mut Engine) {
    handle.upsert_node("keys", NodeDescriptor::new("midi-input")).expect("room");
    handle.upsert_node("shift", NodeDescriptor::transpose(2)).expect("room");
    handle.upsert_node("lead", NodeDescriptor::synthesizer()).expect("room");
    handle
        .set_connections(vec![
            Connection::midi("keys", "shift"),
            Connection::midi("shift", "lead"),
        ])
        .expect("room");
    midi(
        handle,
        "keys",
        &[MidiEvent::note_on(0, 60, 100), MidiEvent::note_on(1, 64, 100)],
    );
    render(engine);
}

#[test]
fn removing_a_transpose_releases_its_notes_downstream() {
    let (mut handle, mut engine, log) = recording();
    transpose_rig(&mut handle, &mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(2));
    assert_eq!(engine.transpose_active_notes(&id("shift")), 2);

    handle.remove_node("shift").expect("room");
    render(&mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(0));
    // Exactly the two recorded notes, not a blanket release.
    assert_eq!(
        *log.lock().unwrap(),
        vec![(true, 62), (true, 66), (false, 62), (false, 66)]
    );

    // Re-adding the id starts from an empty note map.
    handle.upsert_node("shift", NodeDescriptor::transpose(2)).expect("room");
    render(&mut engine);
    assert_eq!(engine.transpose_active_notes(&id("shift")), 0);
}

#[test]
fn removing_an_unplugged_transpose_releases_every_synth() {
    let (mut handle, mut engine, log) = recording();
    transpose_rig(&mut handle, &mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(2));

    handle
        .set_connections(vec![Connection::midi("keys", "shift")])
        .expect("room");
    render(&mut engine);
    handle.remove_node("shift").expect("room");
    render(&mut engine);

    assert_eq!(engine.synth_active_voices(&id("lead")), Some(0));
    // No bulk release on the recording synth: CC 123 falls back to one Off
    // per key, for each of the 16 channels.
    let offs = log.lock().unwrap().iter().filter(|(on, _)| !on).count();
    assert_eq!(offs, 16 * 128);
}

#[test]
fn removing_an_idle_transpose_releases_every_synth() {
    let (mut handle, mut engine) = ready();
    handle.upsert_node("keys", NodeDescriptor::new("midi-input")).expect("room");
    handle.upsert_node("shift", NodeDescriptor::transpose(7)).expect("room");
    handle.upsert_node("lead", NodeDescriptor::synthesizer()).expect("room");
    handle
        .set_connections(vec![
            Connection::midi("keys", "lead"),
            Connection::midi("shift", "lead"),
        ])
        .expect("room");
    midi(&mut handle, "keys", &[MidiEvent::note_on(0, 60, 100)]);
    render(&mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(1));

    handle.remove_node("shift").expect("room");
    render(&mut engine);
    assert_eq!(engine.synth_active_voices(&id("lead")), Some(0));
}
