use rtrb::Producer;
use tracing::{error, warn};

use crate::graph::NodeId;

/// Render thread → control thread messages.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotification {
    /// The engine needs a native module before it can make sound.
    NeedBootstrap,
    Ready {
        sample_rate: f32,
    },
    AckBootstrap,
    AckNode {
        id: NodeId,
    },
    AckRemove {
        id: NodeId,
    },
    AckConnections {
        count: usize,
    },
    AckClear,
    Error {
        message: String,
        fatal: bool,
    },
    Beat {
        index: u64,
        bpm: f64,
    },
    /// Playing sequencers will restart at step 0 on `beat`.
    SyncScheduled {
        beat: u64,
    },
    SequencerStep {
        id: NodeId,
        step: usize,
    },
    ArpNote {
        id: NodeId,
        note: u8,
    },
}

/// Best-effort sender. A full ring drops the notification.
pub struct Notifier {
    tx: Producer<EngineNotification>,
    dropped: u64,
}

impl Notifier {
    pub fn new(tx: Producer<EngineNotification>) -> Self {
        Self { tx, dropped: 0 }
    }

    pub fn send(&mut self, notification: EngineNotification) {
        if self.tx.push(notification).is_err() {
            self.dropped += 1;
        }
    }

    /// Log and forward an engine error.
    pub fn error(&mut self, message: impl Into<String>, fatal: bool) {
        let message = message.into();
        if fatal {
            error!(%message, "fatal engine error");
        } else {
            warn!(%message, "engine error");
        }
        self.send(EngineNotification::Error { message, fatal });
    }

    /// Notifications lost to a full ring since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
