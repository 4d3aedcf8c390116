//! In-memory peer replaying scripted replies.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use actorlink_core::error::TransportError;
use actorlink_core::types::{Action, BehaviorName};
use actorlink_exchange::protocol::{
    InboundMessage, InboundPayload, OutboundMessage, PROTOCOL_VERSION, PeerCommand, RemoteInfo,
};
use actorlink_exchange::transport::Transport;
use parking_lot::Mutex;

/// Messages a [`ScriptedPeer`] received, shared with the test.
pub type SentLog = Arc<Mutex<Vec<OutboundMessage>>>;

/// A [`Transport`] that answers each exchange with the next scripted reply.
///
/// Once the script runs out every exchange fails with
/// [`TransportError::Disconnected`].
#[derive(Debug, Default)]
pub struct ScriptedPeer {
    replies: VecDeque<Result<InboundMessage, TransportError>>,
    sent: SentLog,
    notified: SentLog,
}

impl ScriptedPeer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A peer whose first two replies complete a handshake at
    /// [`PROTOCOL_VERSION`].
    pub fn handshaking() -> Self {
        Self::new()
            .then_payload(InboundPayload {
                initialization: Some(Self::remote_info(PROTOCOL_VERSION)),
                ..InboundPayload::default()
            })
            .then_payload(InboundPayload::default())
    }

    /// Peer info declaring `communication_version`.
    pub fn remote_info(communication_version: &str) -> RemoteInfo {
        RemoteInfo {
            communication_version: communication_version.into(),
            package_version: env!("CARGO_PKG_VERSION").into(),
            seed: None,
            capabilities: HashMap::new(),
        }
    }

    #[must_use]
    pub fn then_message(mut self, message: InboundMessage) -> Self {
        self.replies.push_back(Ok(message));
        self
    }

    #[must_use]
    pub fn then_payload(self, payload: InboundPayload) -> Self {
        self.then_message(InboundMessage::ok(payload))
    }

    /// Reply carrying `actions` for one behavior and acknowledging it.
    #[must_use]
    pub fn then_actions(self, behavior: &str, actions: Vec<Action>) -> Self {
        let behavior = BehaviorName::from(behavior);
        self.then_payload(InboundPayload {
            actions: BTreeMap::from([(behavior.clone(), actions)]),
            acknowledged: vec![behavior],
            ..InboundPayload::default()
        })
    }

    #[must_use]
    pub fn then_command(self, command: PeerCommand) -> Self {
        self.then_payload(InboundPayload {
            command,
            ..InboundPayload::default()
        })
    }

    #[must_use]
    pub fn then_failure(mut self, err: TransportError) -> Self {
        self.replies.push_back(Err(err));
        self
    }

    /// Handle to every message sent through [`Transport::exchange`].
    pub fn sent_log(&self) -> SentLog {
        Arc::clone(&self.sent)
    }

    /// Handle to every message sent through [`Transport::notify`].
    pub fn notified_log(&self) -> SentLog {
        Arc::clone(&self.notified)
    }

    /// Scripted replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

impl Transport for ScriptedPeer {
    fn exchange(&mut self, message: &OutboundMessage) -> Result<InboundMessage, TransportError> {
        self.sent.lock().push(message.clone());
        self.replies
            .pop_front()
            .unwrap_or(Err(TransportError::Disconnected))
    }

    fn notify(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.notified.lock().push(message.clone());
        Ok(())
    }

    fn peer(&self) -> String {
        "scripted peer".into()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
