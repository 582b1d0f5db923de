use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable node identifier assigned by the editor.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.as_str().to_string()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a node is. Decides how the router and renderer treat it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Oscillator,
    Reverb,
    Speaker,
    Synthesizer,
    Sequencer,
    Arpeggiator,
    MidiInput,
    MidiTranspose,
    Lfo,
    /// Value source (number, bool, text or select widget).
    Value,
    /// Anything the engine has no behavior for.
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Oscillator => "oscillator",
            NodeKind::Reverb => "reverb",
            NodeKind::Speaker => "speaker",
            NodeKind::Synthesizer => "synth",
            NodeKind::Sequencer => "sequencer",
            NodeKind::Arpeggiator => "arpeggiator",
            NodeKind::MidiInput => "midi-input",
            NodeKind::MidiTranspose => "midi-transpose",
            NodeKind::Lfo => "lfo",
            NodeKind::Value => "value",
            NodeKind::Other(name) => name,
        }
    }

    /// Audio sink; the renderer's traversal roots.
    pub fn is_sink(&self) -> bool {
        matches!(self, NodeKind::Speaker)
    }

    /// Kinds backed by a persistent native instance.
    pub fn has_instance(&self) -> bool {
        matches!(
            self,
            NodeKind::Oscillator | NodeKind::Reverb | NodeKind::Synthesizer | NodeKind::MidiTranspose
        )
    }

    /// Kinds whose removal may leave notes hanging downstream.
    pub fn emits_notes(&self) -> bool {
        matches!(self, NodeKind::Sequencer | NodeKind::MidiInput)
    }
}

impl From<&str> for NodeKind {
    fn from(name: &str) -> Self {
        match name {
            "oscillator" => NodeKind::Oscillator,
            "reverb" => NodeKind::Reverb,
            "speaker" => NodeKind::Speaker,
            "synth" | "synthesizer" => NodeKind::Synthesizer,
            "sequencer" => NodeKind::Sequencer,
            "arpeggiator" => NodeKind::Arpeggiator,
            "midi-input" => NodeKind::MidiInput,
            "midi-transpose" => NodeKind::MidiTranspose,
            "lfo" => NodeKind::Lfo,
            "value" | "value-number" | "value-bool" | "value-text" | "value-string"
            | "value-select" => NodeKind::Value,
            other => NodeKind::Other(other.to_string()),
        }
    }
}

impl From<String> for NodeKind {
    fn from(name: String) -> Self {
        NodeKind::from(name.as_str())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Number(value as f64)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Number(value as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Kind-specific key/value params of a node.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params(HashMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Finite numbers only; a NaN from the editor reads as absent.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(ParamValue::Number(n)) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(ParamValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(ParamValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Truthiness the way the editor means it: `true`, non-zero, non-empty.
    pub fn truthy(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(ParamValue::Bool(b)) => *b,
            Some(ParamValue::Number(n)) => *n != 0.0 && !n.is_nan(),
            Some(ParamValue::Text(s)) => !s.is_empty(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A node as the editor describes it. Replaced wholesale on every update.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: NodeKind,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub params: Params,
}

impl NodeDescriptor {
    pub fn new(kind: impl Into<NodeKind>) -> Self {
        Self {
            kind: kind.into(),
            params: Params::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.params.set(key, value);
        self
    }

    pub fn oscillator() -> Self {
        Self::new(NodeKind::Oscillator)
    }

    pub fn reverb() -> Self {
        Self::new(NodeKind::Reverb)
    }

    pub fn speaker() -> Self {
        Self::new(NodeKind::Speaker)
    }

    pub fn synthesizer() -> Self {
        Self::new(NodeKind::Synthesizer)
    }

    pub fn sequencer() -> Self {
        Self::new(NodeKind::Sequencer)
    }

    pub fn transpose(semitones: i32) -> Self {
        Self::new(NodeKind::MidiTranspose).with("semitones", semitones)
    }
}
