//! Host application: audio device, demo patch and control loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, warn};

use patchbay::dsp::BuiltinModule;
use patchbay::engine::RawMidi;
use patchbay::io::midi::MidiEvent;
use patchbay::{channel, Command, Connection, EngineConfig, EngineHandle, EngineNotification, NodeDescriptor};

/// Root notes of the demo progression, one bar each.
const PROGRESSION: [u8; 4] = [57, 53, 48, 55];
const BAR: Duration = Duration::from_millis(2_000);

pub struct Patchbay {
    config: EngineConfig,
}

impl Patchbay {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Open the device, start rendering and drive the demo until killed.
    pub fn run(self) -> EyreResult<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| eyre!("no default output device available"))?;
        let stream_config = device
            .default_output_config()
            .wrap_err("failed to fetch default output config")?;

        let sample_rate = stream_config.sample_rate().0 as f32;
        let channels = stream_config.channels() as usize;
        info!(sample_rate, channels, "opened output device");

        let (mut handle, mut engine) = channel(self.config.with_sample_rate(sample_rate));
        send(&mut handle, Command::Bootstrap(Box::new(BuiltinModule)))?;
        build_patch(&mut handle)?;

        // Frames rendered so far; the control thread derives the audio clock
        // from it for timebase syncs.
        let rendered = Arc::new(AtomicU64::new(0));
        let rendered_cb = rendered.clone();

        let stream = device.build_output_stream(
            &stream_config.into(),
            move |data: &mut [f32], _| {
                engine.render_interleaved(data, channels);
                rendered_cb.fetch_add((data.len() / channels.max(1)) as u64, Ordering::Relaxed);
            },
            |err| error!(%err, "audio stream error"),
            None,
        )?;
        stream.play()?;

        info!("playing, press Ctrl+C to stop");
        let started = Instant::now();
        let mut bar = 0usize;
        let mut next_bar = started;
        loop {
            let now = Instant::now();
            if now >= next_bar {
                play_bar(&mut handle, bar)?;
                bar += 1;
                next_bar += BAR;
            }

            let audio_sec = rendered.load(Ordering::Relaxed) as f64 / sample_rate as f64;
            let wall_ms = now.duration_since(started).as_secs_f64() * 1_000.0;
            send(
                &mut handle,
                Command::UpdateTimebase {
                    wall_clock_ms: wall_ms,
                    audio_clock_sec: audio_sec,
                },
            )?;

            for notification in handle.drain() {
                log_notification(&notification);
            }
            thread::sleep(Duration::from_millis(50));
        }
    }
}

/// Drone through a reverb, plus keys → arpeggiator → transpose → synth.
fn build_patch(handle: &mut EngineHandle) -> EyreResult<()> {
    let nodes = [
        (
            "drone",
            NodeDescriptor::oscillator()
                .with("frequency", 110.0)
                .with("amplitude", 0.08)
                .with("waveform", "triangle"),
        ),
        ("room", NodeDescriptor::reverb().with("feedback", 0.8).with("wetMix", 0.35)),
        ("keys", NodeDescriptor::new("midi-input")),
        (
            "arp",
            NodeDescriptor::new("arpeggiator")
                .with("mode", "up-down")
                .with("octaves", 2.0)
                .with("rateMultiplier", 4.0)
                .with("playing", true),
        ),
        ("shift", NodeDescriptor::transpose(12)),
        (
            "lead",
            NodeDescriptor::synthesizer()
                .with("waveform", "square")
                .with("gain", 0.2)
                .with("release", 0.2),
        ),
        ("out", NodeDescriptor::speaker().with("volume", 0.7)),
    ];
    for (id, descriptor) in nodes {
        send(
            handle,
            Command::UpsertNode {
                id: id.into(),
                descriptor,
            },
        )?;
    }

    send(
        handle,
        Command::SetConnections(vec![
            Connection::audio("drone", "room"),
            Connection::audio("room", "out"),
            Connection::midi("keys", "arp"),
            Connection::midi("arp", "shift"),
            Connection::midi("shift", "lead"),
            Connection::audio("lead", "out"),
        ]),
    )
}

/// Release the previous bar's chord and hold the next one.
fn play_bar(handle: &mut EngineHandle, bar: usize) -> EyreResult<()> {
    let root = PROGRESSION[bar % PROGRESSION.len()];
    let mut events = Vec::with_capacity(6);
    if bar > 0 {
        let previous = PROGRESSION[(bar - 1) % PROGRESSION.len()];
        events.extend(triad(previous).map(|key| RawMidi::from(MidiEvent::note_off(0, key))));
    }
    events.extend(triad(root).map(|key| RawMidi::from(MidiEvent::note_on(0, key, 96))));
    send(
        handle,
        Command::Midi {
            source: "keys".into(),
            events,
        },
    )
}

fn triad(root: u8) -> [u8; 3] {
    [root, root + 3, root + 7]
}

fn send(handle: &mut EngineHandle, command: Command) -> EyreResult<()> {
    handle
        .send(command)
        .map_err(|command| eyre!("command queue full, dropped {}", command.name()))
}

fn log_notification(notification: &EngineNotification) {
    match notification {
        EngineNotification::Error { message, fatal: true } => error!(%message, "engine failed"),
        EngineNotification::Error { message, fatal: false } => warn!(%message, "engine error"),
        EngineNotification::Ready { sample_rate } => info!(sample_rate, "engine ready"),
        EngineNotification::ArpNote { id, note } => info!(node = %id, note, "arp"),
        EngineNotification::Beat { index, bpm } if index % 4 == 0 => info!(index, bpm, "bar"),
        _ => {}
    }
}
