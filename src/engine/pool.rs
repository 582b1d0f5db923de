use tracing::debug;

use super::notify::Notifier;
use crate::graph::{HandleMap, NodeHandle, NodeKind};
use crate::native::{NativeModule, OscillatorUnit, ReverbUnit, SynthUnit, TransposeUnit};

/// A persistent native unit, one per node.
pub enum DspInstance {
    Oscillator(Box<dyn OscillatorUnit>),
    Reverb(Box<dyn ReverbUnit>),
    Synth(Box<dyn SynthUnit>),
    Transpose(Box<dyn TransposeUnit>),
}

impl DspInstance {
    pub fn kind(&self) -> NodeKind {
        match self {
            DspInstance::Oscillator(_) => NodeKind::Oscillator,
            DspInstance::Reverb(_) => NodeKind::Reverb,
            DspInstance::Synth(_) => NodeKind::Synthesizer,
            DspInstance::Transpose(_) => NodeKind::MidiTranspose,
        }
    }

    fn release(&mut self) {
        match self {
            DspInstance::Oscillator(unit) => unit.release(),
            DspInstance::Reverb(unit) => unit.release(),
            DspInstance::Synth(unit) => unit.release(),
            DspInstance::Transpose(unit) => unit.release(),
        }
    }
}

struct PooledInstance {
    instance: DspInstance,
    serial: u64,
}

/// Owns every native instance, keyed by node handle.
///
/// Instances are built lazily on first access and torn down synchronously:
/// `free` and `free_all` call the unit's `release` before dropping it. A freed
/// node gets a fresh, default-state instance on its next access.
pub struct InstancePool {
    module: Option<Box<dyn NativeModule>>,
    sample_rate: f32,
    instances: HandleMap<PooledInstance>,
    next_serial: u64,
}

impl InstancePool {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            module: None,
            sample_rate,
            instances: HandleMap::new(),
            next_serial: 0,
        }
    }

    pub fn install(&mut self, module: Box<dyn NativeModule>) {
        self.free_all();
        self.module = Some(module);
    }

    /// The instance for `handle`, building one for `kind` if needed.
    ///
    /// An instance of another kind (the node was retyped) is released first.
    /// A missing constructor is reported as a non-fatal error and yields
    /// `None`; the next access tries again.
    pub fn get(&mut self, handle: NodeHandle, kind: &NodeKind, notifier: &mut Notifier) -> Option<&mut DspInstance> {
        let stale = self
            .instances
            .get(handle)
            .is_some_and(|pooled| &pooled.instance.kind() != kind);
        if stale {
            self.free(handle);
        }

        if self.instances.get(handle).is_none() {
            let instance = self.construct(kind, notifier)?;
            self.next_serial += 1;
            debug!(?handle, %kind, serial = self.next_serial, "instance created");
            self.instances.insert(
                handle,
                PooledInstance {
                    instance,
                    serial: self.next_serial,
                },
            );
        }
        self.instances.get_mut(handle).map(|pooled| &mut pooled.instance)
    }

    fn construct(&self, kind: &NodeKind, notifier: &mut Notifier) -> Option<DspInstance> {
        let Some(module) = self.module.as_deref() else {
            notifier.error(format!("cannot build {kind}: no native module loaded"), false);
            return None;
        };
        let sr = self.sample_rate;
        let instance = match kind {
            NodeKind::Oscillator => module.oscillator(sr).map(DspInstance::Oscillator),
            NodeKind::Reverb => module.reverb(sr).map(DspInstance::Reverb),
            NodeKind::Synthesizer => module.synthesizer(sr).map(DspInstance::Synth),
            NodeKind::MidiTranspose => module.transpose().map(DspInstance::Transpose),
            _ => return None,
        };
        if instance.is_none() {
            notifier.error(
                format!("native module `{}` cannot construct {kind}", module.name()),
                false,
            );
        }
        instance
    }

    pub fn oscillator(&mut self, handle: NodeHandle, notifier: &mut Notifier) -> Option<&mut dyn OscillatorUnit> {
        match self.get(handle, &NodeKind::Oscillator, notifier)? {
            DspInstance::Oscillator(unit) => Some(unit.as_mut()),
            _ => None,
        }
    }

    pub fn reverb(&mut self, handle: NodeHandle, notifier: &mut Notifier) -> Option<&mut dyn ReverbUnit> {
        match self.get(handle, &NodeKind::Reverb, notifier)? {
            DspInstance::Reverb(unit) => Some(unit.as_mut()),
            _ => None,
        }
    }

    pub fn synth(&mut self, handle: NodeHandle, notifier: &mut Notifier) -> Option<&mut dyn SynthUnit> {
        match self.get(handle, &NodeKind::Synthesizer, notifier)? {
            DspInstance::Synth(unit) => Some(unit.as_mut()),
            _ => None,
        }
    }

    pub fn transpose(&mut self, handle: NodeHandle, notifier: &mut Notifier) -> Option<&mut dyn TransposeUnit> {
        match self.get(handle, &NodeKind::MidiTranspose, notifier)? {
            DspInstance::Transpose(unit) => Some(unit.as_mut()),
            _ => None,
        }
    }

    /// Existing instance only; never constructs.
    pub fn instance(&self, handle: NodeHandle) -> Option<&DspInstance> {
        self.instances.get(handle).map(|pooled| &pooled.instance)
    }

    /// Creation serial of the live instance. Strictly increases per creation.
    pub fn serial(&self, handle: NodeHandle) -> Option<u64> {
        self.instances.get(handle).map(|pooled| pooled.serial)
    }

    /// Release and drop one instance. Returns whether one existed.
    pub fn free(&mut self, handle: NodeHandle) -> bool {
        match self.instances.remove(handle) {
            Some(mut pooled) => {
                pooled.instance.release();
                true
            }
            None => false,
        }
    }

    pub fn free_all(&mut self) {
        self.instances.drain_with(|_, mut pooled| pooled.instance.release());
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Drop for InstancePool {
    fn drop(&mut self) {
        self.free_all();
    }
}
