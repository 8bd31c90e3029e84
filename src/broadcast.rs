//! Optional side channel mirroring session state to other devices.
//!
//! Wire format is a JSON object `{"event": "sync_timer", "payload": SessionState}`
//! on a topic keyed by session id. Delivery is last-write-wins; the engine
//! applies inbound payloads by overwrite.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::session::SessionState;

pub const SYNC_EVENT: &str = "sync_timer";

pub fn topic_for(session_id: &str) -> String {
    format!("workout:{session_id}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub event: String,
    pub payload: SessionState,
}

impl SyncMessage {
    pub fn sync(state: &SessionState) -> Self {
        Self {
            event: SYNC_EVENT.to_string(),
            payload: state.clone(),
        }
    }
}

pub trait RealtimeBroadcast: Send {
    fn topic(&self) -> &str;

    fn publish(&mut self, message: &SyncMessage) -> Result<(), EngineError>;

    /// Next inbound `sync_timer` message, if any arrived
    fn try_recv(&mut self) -> Option<SyncMessage>;
}

/// In-process transport carrying the JSON wire format over channels
#[derive(Debug)]
pub struct ChannelBroadcast {
    topic: String,
    tx: Sender<String>,
    rx: Receiver<String>,
}

impl ChannelBroadcast {
    /// Two connected endpoints on the same topic
    pub fn pair(topic: &str) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            Self {
                topic: topic.to_string(),
                tx: a_tx,
                rx: a_rx,
            },
            Self {
                topic: topic.to_string(),
                tx: b_tx,
                rx: b_rx,
            },
        )
    }

    /// Raw frame, for peers that speak the wire format directly
    pub fn send_raw(&self, frame: String) -> Result<(), EngineError> {
        self.tx.send(frame).map_err(|_| EngineError::BroadcastClosed {
            topic: self.topic.clone(),
        })
    }
}

impl RealtimeBroadcast for ChannelBroadcast {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&mut self, message: &SyncMessage) -> Result<(), EngineError> {
        let frame = serde_json::to_string(message)?;
        self.send_raw(frame)
    }

    fn try_recv(&mut self) -> Option<SyncMessage> {
        loop {
            let frame = match self.rx.try_recv() {
                Ok(frame) => frame,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            };
            match serde_json::from_str::<SyncMessage>(&frame) {
                Ok(msg) if msg.event == SYNC_EVENT => return Some(msg),
                Ok(msg) => tracing::debug!(event = %msg.event, "ignoring broadcast event"),
                Err(e) => tracing::warn!(topic = %self.topic, error = %e, "dropping malformed frame"),
            }
        }
    }
}
