use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::descriptor::NodeId;

/// Role tag on a connection endpoint.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortRole {
    AudioIn,
    AudioOut,
    MidiIn,
    MidiOut,
    /// A named parameter input (driven by a value node).
    Param(String),
}

impl From<&str> for PortRole {
    fn from(tag: &str) -> Self {
        match tag {
            "audio-in" | "input" => PortRole::AudioIn,
            "audio-out" | "output" => PortRole::AudioOut,
            "midi-in" => PortRole::MidiIn,
            "midi-out" | "midi" => PortRole::MidiOut,
            other => PortRole::Param(other.to_string()),
        }
    }
}

impl From<String> for PortRole {
    fn from(tag: String) -> Self {
        PortRole::from(tag.as_str())
    }
}

impl From<PortRole> for String {
    fn from(role: PortRole) -> Self {
        role.to_string()
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRole::AudioIn => f.write_str("audio-in"),
            PortRole::AudioOut => f.write_str("audio-out"),
            PortRole::MidiIn => f.write_str("midi-in"),
            PortRole::MidiOut => f.write_str("midi-out"),
            PortRole::Param(name) => f.write_str(name),
        }
    }
}

/// Directed edge between two node ports. An absent tag means the node's
/// primary port.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub from: NodeId,
    pub to: NodeId,
    #[cfg_attr(feature = "serde", serde(default, alias = "fromOutput"))]
    pub from_output_port: Option<PortRole>,
    #[cfg_attr(feature = "serde", serde(default, alias = "toInput"))]
    pub to_input_port: Option<PortRole>,
}

impl Connection {
    /// Primary-port connection with no role tags.
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            from_output_port: None,
            to_input_port: None,
        }
    }

    pub fn audio(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self::new(from, to).ports(PortRole::AudioOut, PortRole::AudioIn)
    }

    pub fn midi(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self::new(from, to).ports(PortRole::MidiOut, PortRole::MidiIn)
    }

    /// Value output driving a named param on the target.
    pub fn param(from: impl Into<NodeId>, to: impl Into<NodeId>, param: &str) -> Self {
        Self {
            to_input_port: Some(PortRole::Param(param.to_string())),
            ..Self::new(from, to)
        }
    }

    pub fn ports(mut self, from_output: PortRole, to_input: PortRole) -> Self {
        self.from_output_port = Some(from_output);
        self.to_input_port = Some(to_input);
        self
    }

    /// Leaves a MIDI output (an untagged output counts as MIDI).
    pub fn carries_midi(&self) -> bool {
        matches!(self.from_output_port, None | Some(PortRole::MidiOut))
    }

    /// Feeds the target's audio input from an audio output.
    pub fn carries_audio(&self) -> bool {
        matches!(self.from_output_port, None | Some(PortRole::AudioOut))
            && matches!(self.to_input_port, None | Some(PortRole::AudioIn))
    }

    /// Name of the target param this edge drives, if any.
    pub fn param_target(&self) -> Option<&str> {
        match (&self.from_output_port, &self.to_input_port) {
            (None | Some(PortRole::AudioOut), Some(PortRole::Param(name))) => Some(name),
            _ => None,
        }
    }
}
