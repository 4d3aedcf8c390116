//! Wire messages exchanged with the decision service.
//!
//! Every exchange is one [`OutboundMessage`] answered by one
//! [`InboundMessage`]. Both are a status code plus an optional payload:
//!
//! | Direction | Payload | Carries |
//! |-----------|---------|---------|
//! | out | [`OutboundPayload`] | observation batches, behavior announcements, side-channel blob, greeting |
//! | in  | [`InboundPayload`]  | peer command, per-behavior actions, acknowledgements, side-channel blob, peer info |
//!
//! Actions carry no actor id. Each behavior's action list is parallel to the
//! order in which that behavior's observations were sent.

use std::collections::{BTreeMap, HashMap};

use actorlink_core::error::ExchangeError;
use actorlink_core::types::{Action, BehaviorName, BehaviorSpec, ObservationRecord};
use serde::{Deserialize, Serialize};

/// Communication version spoken by this crate.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Normal exchange.
pub const STATUS_OK: u16 = 200;

/// Local side is shutting down.
pub const STATUS_CLOSING: u16 = 400;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Status code plus optional payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<P> {
    pub status: u16,
    #[serde(default)]
    pub payload: Option<P>,
}

impl<P> Message<P> {
    /// A [`STATUS_OK`] message carrying `payload`.
    pub fn ok(payload: P) -> Self {
        Self {
            status: STATUS_OK,
            payload: Some(payload),
        }
    }

    /// The payload-less shutdown notice.
    pub const fn closing() -> Self {
        Self {
            status: STATUS_CLOSING,
            payload: None,
        }
    }

    pub const fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Message sent by the simulation host.
pub type OutboundMessage = Message<OutboundPayload>;

/// Message received from the decision service.
pub type InboundMessage = Message<InboundPayload>;

// ---------------------------------------------------------------------------
// Handshake info
// ---------------------------------------------------------------------------

/// Greeting sent on the first exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInfo {
    pub name: String,
    pub communication_version: String,
    pub package_version: String,
    #[serde(default)]
    pub capabilities: HashMap<String, bool>,
    #[serde(default)]
    pub seed: Option<i32>,
}

impl LocalInfo {
    /// Greeting for `name` speaking [`PROTOCOL_VERSION`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            communication_version: PROTOCOL_VERSION.into(),
            package_version: env!("CARGO_PKG_VERSION").into(),
            capabilities: HashMap::new(),
            seed: None,
        }
    }

    #[must_use]
    pub fn with_capability(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.capabilities.insert(name.into(), enabled);
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: i32) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Version and capability info the peer declares on its first reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteInfo {
    pub communication_version: String,
    pub package_version: String,
    #[serde(default)]
    pub seed: Option<i32>,
    #[serde(default)]
    pub capabilities: HashMap<String, bool>,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Everything the host sends for one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutboundPayload {
    /// Observation records per behavior, in submission order.
    #[serde(default)]
    pub batches: BTreeMap<BehaviorName, Vec<ObservationRecord>>,
    /// Specs of behaviors whose first traffic is in this message.
    #[serde(default)]
    pub announcements: Vec<BehaviorSpec>,
    /// Framed side-channel messages.
    #[serde(default)]
    pub side_channel: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialization: Option<LocalInfo>,
}

impl OutboundPayload {
    /// First handshake payload: the greeting and nothing else.
    pub fn greeting(info: LocalInfo) -> Self {
        Self {
            initialization: Some(info),
            ..Self::default()
        }
    }

    /// Total number of observation records across all behaviors.
    pub fn record_count(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }
}

/// Command the peer attaches to every reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerCommand {
    #[default]
    None,
    /// Episode boundary: drop outstanding decisions.
    Reset,
    /// Peer-initiated shutdown.
    Quit,
}

/// Everything the peer returns for one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundPayload {
    #[serde(default)]
    pub command: PeerCommand,
    /// Actions per behavior, parallel to the order observations were sent.
    #[serde(default)]
    pub actions: BTreeMap<BehaviorName, Vec<Action>>,
    /// Behaviors whose announced spec the peer accepted.
    #[serde(default)]
    pub acknowledged: Vec<BehaviorName>,
    #[serde(default)]
    pub side_channel: Vec<u8>,
    /// Only present on the first reply of a session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialization: Option<RemoteInfo>,
}

// ---------------------------------------------------------------------------
// Version negotiation
// ---------------------------------------------------------------------------

fn major_minor(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map_or(Some(0), |m| m.parse().ok())?;
    Some((major, minor))
}

/// Check that `remote` can talk to `local`.
///
/// Majors must match. Under major `0` every minor is breaking, so minors must
/// match as well. Patch levels are ignored.
///
/// # Errors
///
/// Returns [`ExchangeError::VersionMismatch`] if the versions are incompatible
/// or either one cannot be parsed.
pub fn negotiate_version(local: &str, remote: &str) -> Result<(), ExchangeError> {
    let mismatch = || ExchangeError::VersionMismatch {
        local: local.to_string(),
        remote: remote.to_string(),
    };
    let (local_major, local_minor) = major_minor(local).ok_or_else(mismatch)?;
    let (remote_major, remote_minor) = major_minor(remote).ok_or_else(mismatch)?;

    if local_major != remote_major || (local_major == 0 && local_minor != remote_minor) {
        return Err(mismatch());
    }
    Ok(())
}

/// Capabilities both sides enabled.
pub fn negotiate_capabilities(
    local: &HashMap<String, bool>,
    remote: &HashMap<String, bool>,
) -> HashMap<String, bool> {
    local
        .iter()
        .map(|(name, enabled)| {
            let remote_has = remote.get(name).copied().unwrap_or(false);
            (name.clone(), *enabled && remote_has)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use actorlink_core::types::{ActionSpec, ActorId, Observation};

    // ---- serialization ----

    #[test]
    fn closing_message_has_no_payload() {
        let msg = OutboundMessage::closing();
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"status":400,"payload":null}"#);
        assert!(!msg.is_ok());
    }

    #[test]
    fn greeting_carries_only_initialization() {
        let payload = OutboundPayload::greeting(LocalInfo::new("sim").with_seed(7));
        assert!(payload.batches.is_empty());
        assert!(payload.announcements.is_empty());
        let info = payload.initialization.unwrap();
        assert_eq!(info.communication_version, PROTOCOL_VERSION);
        assert_eq!(info.seed, Some(7));
    }

    #[test]
    fn outbound_batches_keyed_by_behavior_name() {
        let mut payload = OutboundPayload::default();
        payload.batches.insert(
            BehaviorName::from("Ball"),
            vec![ObservationRecord::new(3, vec![Observation::new(vec![1.0])])],
        );
        payload.announcements.push(BehaviorSpec::new(
            "Ball",
            vec![vec![1]],
            ActionSpec::Continuous { size: 2 },
        ));
        let json = serde_json::to_value(&OutboundMessage::ok(payload.clone())).unwrap();
        assert_eq!(json["status"], 200);
        assert_eq!(json["payload"]["batches"]["Ball"][0]["actor_id"], 3);
        assert_eq!(json["payload"]["announcements"][0]["name"], "Ball");

        let back: OutboundMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.payload, Some(payload));
    }

    #[test]
    fn inbound_fields_default_when_absent() {
        let msg: InboundMessage = serde_json::from_str(r#"{"status":200,"payload":{}}"#).unwrap();
        let payload = msg.payload.unwrap();
        assert_eq!(payload.command, PeerCommand::None);
        assert!(payload.actions.is_empty());
        assert!(payload.acknowledged.is_empty());
        assert!(payload.side_channel.is_empty());
        assert!(payload.initialization.is_none());
    }

    #[test]
    fn inbound_missing_payload_is_none() {
        let msg: InboundMessage = serde_json::from_str(r#"{"status":200}"#).unwrap();
        assert!(msg.payload.is_none());
    }

    #[test]
    fn inbound_actions_and_command_parse() {
        let json = r#"{
            "status": 200,
            "payload": {
                "command": "reset",
                "actions": {"Ball": [{"continuous": [0.5, -0.2]}]},
                "acknowledged": ["Ball"]
            }
        }"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap();
        let payload = msg.payload.unwrap();
        assert_eq!(payload.command, PeerCommand::Reset);
        assert_eq!(
            payload.actions["Ball"],
            vec![Action::Continuous(vec![0.5, -0.2])]
        );
        assert_eq!(payload.acknowledged, vec![BehaviorName::from("Ball")]);
    }

    #[test]
    fn record_count_sums_all_behaviors() {
        let mut payload = OutboundPayload::default();
        let rec = |id: i32| ObservationRecord::new(ActorId(id), Vec::new());
        payload.batches.insert("A".into(), vec![rec(0), rec(1)]);
        payload.batches.insert("B".into(), vec![rec(0)]);
        assert_eq!(payload.record_count(), 3);
    }

    // ---- version negotiation ----

    #[test]
    fn same_major_is_compatible() {
        assert!(negotiate_version("1.0.0", "1.3.2").is_ok());
        assert!(negotiate_version("1.2", "1.0.0").is_ok());
    }

    #[test]
    fn different_major_is_rejected() {
        let err = negotiate_version("1.0.0", "2.0.0").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Protocol version mismatch: local 1.0.0, remote 2.0.0"
        );
    }

    #[test]
    fn zero_major_requires_same_minor() {
        assert!(negotiate_version("0.4.0", "0.4.9").is_ok());
        assert!(negotiate_version("0.4.0", "0.5.0").is_err());
    }

    #[test]
    fn unparsable_version_is_rejected() {
        assert!(matches!(
            negotiate_version("1.0.0", "banana"),
            Err(ExchangeError::VersionMismatch { .. })
        ));
    }

    // ---- capabilities ----

    #[test]
    fn capabilities_are_anded() {
        let local = HashMap::from([
            ("a".to_string(), true),
            ("b".to_string(), true),
            ("c".to_string(), false),
        ]);
        let remote = HashMap::from([("a".to_string(), true), ("c".to_string(), true)]);
        let negotiated = negotiate_capabilities(&local, &remote);
        assert!(negotiated["a"]);
        assert!(!negotiated["b"]);
        assert!(!negotiated["c"]);
        assert_eq!(negotiated.len(), 3);
    }
}
