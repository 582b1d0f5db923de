//! Renderer - backward graph walk from the speakers
//!
//! Each sink pulls audio from its inbound audio edges, recursively: a reverb
//! first renders its own inputs into a scratch buffer, then transforms it.
//! Every producer is mono; the sink writes the same signal to both outputs.

use super::notify::Notifier;
use super::pool::InstancePool;
use crate::graph::{GraphStore, NodeHandle, NodeKind, Params, VisitSet};
use crate::dsp::oscillator::Waveform;
use crate::io::converter::waveform_from_name;
use crate::native::{OscillatorUnit, ReverbUnit, SynthUnit};

/// Mixes every speaker sink into the output block.
///
/// The visited set is reset for each sink. A producer reachable from two
/// sinks is rendered once per sink in the same block, so its state (phase,
/// envelopes, reverb tails) advances twice.
pub struct Renderer {
    max_block: usize,
    /// One sink's accumulated input.
    mix: Vec<f32>,
    /// Output of the unit currently processing.
    temp: Vec<f32>,
    /// Reverb input buffers, one per nesting level.
    stack: Vec<Vec<f32>>,
    visited: VisitSet,
}

impl Renderer {
    pub fn new(max_block: usize) -> Self {
        let mut renderer = Self {
            max_block,
            mix: vec![0.0; max_block],
            temp: vec![0.0; max_block],
            stack: Vec::new(),
            visited: VisitSet::with_capacity(64),
        };
        renderer.reserve(8);
        renderer
    }

    /// Make room for a graph of `slots` nodes. Called from control commands,
    /// never from inside a render pass.
    pub fn reserve(&mut self, slots: usize) {
        self.visited.reserve(slots);
        while self.stack.len() < slots {
            self.stack.push(vec![0.0; self.max_block]);
        }
    }

    /// Render one block of at most `max_block` frames into `left`/`right`.
    ///
    /// Both outputs are cleared first. Without any sink they stay silent.
    pub fn render_block(
        &mut self,
        graph: &GraphStore,
        pool: &mut InstancePool,
        notifier: &mut Notifier,
        left: &mut [f32],
        right: &mut [f32],
    ) {
        let frames = left.len().min(right.len()).min(self.max_block);
        left.fill(0.0);
        right.fill(0.0);

        for (sink, entry) in graph.sinks() {
            let mix = &mut self.mix[..frames];
            mix.fill(0.0);
            self.visited.clear();
            self.visited.insert(sink);

            let mut walk = Walk {
                graph,
                pool: &mut *pool,
                notifier: &mut *notifier,
                temp: &mut self.temp[..frames],
                visited: &mut self.visited,
            };
            for source in graph.audio_sources(&entry.id) {
                walk.render_into(source, mix, &mut self.stack);
            }

            let gain = sink_gain(&entry.descriptor.params);
            for ((l, r), &s) in left.iter_mut().zip(right.iter_mut()).zip(mix.iter()) {
                *l += s * gain;
                *r += s * gain;
            }
        }
    }
}

/// Speaker gain: `volume` (default 1), zero when `muted`.
fn sink_gain(params: &Params) -> f32 {
    if params.truthy("muted") {
        0.0
    } else {
        params.number("volume").unwrap_or(1.0) as f32
    }
}

/// State for one sink's recursive pull.
struct Walk<'a> {
    graph: &'a GraphStore,
    pool: &'a mut InstancePool,
    notifier: &'a mut Notifier,
    temp: &'a mut [f32],
    visited: &'a mut VisitSet,
}

impl Walk<'_> {
    /// Add `handle`'s output to `acc`. A node already visited for this sink
    /// contributes nothing.
    fn render_into(&mut self, handle: NodeHandle, acc: &mut [f32], stack: &mut [Vec<f32>]) {
        if !self.visited.insert(handle) {
            return;
        }
        let graph = self.graph;
        let Some(entry) = graph.node(handle) else {
            return;
        };
        let params = &entry.descriptor.params;

        let result = match entry.kind() {
            NodeKind::Oscillator => match self.pool.oscillator(handle, self.notifier) {
                Some(osc) => {
                    apply_oscillator_params(osc, params);
                    osc.process(self.temp)
                }
                None => return,
            },
            NodeKind::Synthesizer => match self.pool.synth(handle, self.notifier) {
                Some(synth) => {
                    apply_synth_params(synth, params);
                    synth.process(self.temp)
                }
                None => return,
            },
            NodeKind::Reverb => {
                let Some((input, deeper)) = stack.split_first_mut() else {
                    return;
                };
                let input = &mut input[..acc.len()];
                input.fill(0.0);
                let mut sources = graph.audio_sources(&entry.id).peekable();
                if sources.peek().is_none() {
                    return;
                }
                for source in sources {
                    self.render_into(source, input, deeper);
                }
                match self.pool.reverb(handle, self.notifier) {
                    Some(reverb) => {
                        apply_reverb_params(reverb, params);
                        reverb.process(input, self.temp)
                    }
                    None => return,
                }
            }
            _ => return,
        };

        match result {
            Ok(()) => {
                for (a, &s) in acc.iter_mut().zip(self.temp.iter()) {
                    *a += s;
                }
            }
            Err(err) => self.notifier.error(format!("node {}: {err}", entry.id), false),
        }
    }
}

fn apply_oscillator_params(osc: &mut dyn OscillatorUnit, params: &Params) {
    if let Some(hz) = params.number("frequency") {
        osc.set_frequency(hz as f32);
    }
    if let Some(amplitude) = params.number("amplitude") {
        osc.set_amplitude(amplitude as f32);
    }
    osc.set_waveform(waveform_from_name(params.text("waveform"), Waveform::Sine));
}

fn apply_synth_params(synth: &mut dyn SynthUnit, params: &Params) {
    synth.set_waveform(waveform_from_name(params.text("waveform"), Waveform::Sawtooth));
    if let Some(voices) = params.number("maxVoices") {
        synth.set_max_voices(voices.clamp(1.0, 32.0) as usize);
    }
    let attack = params.number("attack");
    let decay = params.number("decay");
    let sustain = params.number("sustain");
    let release = params.number("release");
    if attack.is_some() || decay.is_some() || sustain.is_some() || release.is_some() {
        synth.set_adsr(
            attack.unwrap_or(0.005) as f32,
            decay.unwrap_or(0.12) as f32,
            sustain.unwrap_or(0.7) as f32,
            release.unwrap_or(0.12) as f32,
        );
    }
    if let Some(glide) = params.number("glide") {
        synth.set_glide(glide as f32);
    }
    if let Some(gain) = params.number("gain") {
        synth.set_gain(gain as f32);
    }
}

fn apply_reverb_params(reverb: &mut dyn ReverbUnit, params: &Params) {
    if let Some(feedback) = params.number("feedback") {
        reverb.set_feedback(feedback as f32);
    }
    if let Some(wet) = params.number("wetMix") {
        reverb.set_wet_mix(wet as f32);
    }
    if let Some(damping) = params.number("damping") {
        reverb.set_damping(damping as f32);
    }
}
