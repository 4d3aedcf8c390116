//! Connection owner: handshake, per-step exchange, and shutdown notice.

use std::collections::HashMap;

use actorlink_core::error::{ExchangeError, TransportError};
use tracing::{debug, info, warn};

use crate::protocol::{
    InboundMessage, InboundPayload, LocalInfo, OutboundMessage, OutboundPayload, RemoteInfo,
    negotiate_capabilities, negotiate_version,
};
use crate::transport::Transport;

/// Proxy variables worth mentioning when the peer cannot be reached.
const PROXY_VARS: [&str; 8] = [
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "ALL_PROXY",
    "GRPC_PROXY",
    "http_proxy",
    "https_proxy",
    "all_proxy",
    "grpc_proxy",
];

/// Environment lookup used to inspect proxy settings.
pub type EnvLookup = fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Result of a successful handshake.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub remote: RemoteInfo,
    /// The peer's first real input, retrieved by the second round trip.
    pub first_input: InboundPayload,
}

/// Drives one transport through the exchange protocol.
pub struct ExchangeEngine<T: Transport> {
    transport: T,
    local: LocalInfo,
    remote: Option<RemoteInfo>,
    capabilities: HashMap<String, bool>,
    env: EnvLookup,
}

impl<T: Transport> ExchangeEngine<T> {
    pub fn new(transport: T, local: LocalInfo) -> Self {
        Self {
            transport,
            local,
            remote: None,
            capabilities: HashMap::new(),
            env: process_env,
        }
    }

    /// Replace the environment lookup used for proxy diagnostics.
    #[must_use]
    pub fn with_env_lookup(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    pub const fn local_info(&self) -> &LocalInfo {
        &self.local
    }

    /// Peer info, once the handshake has succeeded.
    pub const fn remote_info(&self) -> Option<&RemoteInfo> {
        self.remote.as_ref()
    }

    /// Capabilities enabled on both sides.
    pub const fn capabilities(&self) -> &HashMap<String, bool> {
        &self.capabilities
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Exchange versions and fetch the peer's first input.
    ///
    /// Two round trips: the first carries the greeting and returns the peer's
    /// info, the second is an empty poll returning its first real input.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::Initialization`] if the peer is unreachable, sends no
    ///   info, or sends info but no input
    /// - [`ExchangeError::VersionMismatch`] if the communication versions are
    ///   incompatible
    /// - [`ExchangeError::PeerStatus`] if the peer answers with a non-OK status
    pub fn handshake(&mut self) -> Result<Handshake, ExchangeError> {
        let greeting = OutboundMessage::ok(OutboundPayload::greeting(self.local.clone()));
        let first = self.round_trip(&greeting)?;
        let remote = first
            .and_then(|payload| payload.initialization)
            .ok_or_else(|| ExchangeError::Initialization {
                message: "peer replied without version info".into(),
            })?;

        negotiate_version(&self.local.communication_version, &remote.communication_version)?;

        let poll = OutboundMessage::ok(OutboundPayload::default());
        let Some(first_input) = self.round_trip(&poll)? else {
            warn!(
                local = %self.local.communication_version,
                remote = %remote.communication_version,
                "peer sent version info but no input; communication versions are likely incompatible"
            );
            return Err(ExchangeError::Initialization {
                message: format!(
                    "peer sent no input after the greeting (local version {}, remote version {})",
                    self.local.communication_version, remote.communication_version
                ),
            });
        };

        if remote.package_version != self.local.package_version {
            warn!(
                local = %self.local.package_version,
                remote = %remote.package_version,
                "peer package version differs"
            );
        }
        self.capabilities = negotiate_capabilities(&self.local.capabilities, &remote.capabilities);
        info!(
            peer = %self.transport.peer(),
            local_version = %self.local.communication_version,
            remote_version = %remote.communication_version,
            "handshake complete"
        );
        self.remote = Some(remote.clone());

        Ok(Handshake {
            remote,
            first_input,
        })
    }

    /// One handshake round trip. Transport failures become initialization errors.
    fn round_trip(
        &mut self,
        message: &OutboundMessage,
    ) -> Result<Option<InboundPayload>, ExchangeError> {
        let reply = self
            .transport
            .exchange(message)
            .map_err(|e| self.unreachable(&e))?;
        check_status(&reply)?;
        Ok(reply.payload)
    }

    fn unreachable(&self, err: &TransportError) -> ExchangeError {
        let mut message = format!("peer not reachable at {}: {err}", self.transport.peer());
        if let Some(hint) = proxy_hint(self.env) {
            message.push_str("; ");
            message.push_str(&hint);
        }
        ExchangeError::Initialization { message }
    }

    /// Send one step's payload and return the peer's reply.
    ///
    /// A reply without a payload is treated as an empty one.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::Transport`] on transport failure and
    /// [`ExchangeError::PeerStatus`] on a non-OK reply.
    pub fn exchange(&mut self, payload: OutboundPayload) -> Result<InboundPayload, ExchangeError> {
        debug!(
            records = payload.record_count(),
            behaviors = payload.batches.len(),
            announcements = payload.announcements.len(),
            side_channel_bytes = payload.side_channel.len(),
            "exchanging step"
        );
        let reply = self.transport.exchange(&OutboundMessage::ok(payload))?;
        check_status(&reply)?;
        Ok(reply.payload.unwrap_or_default())
    }

    /// Best-effort shutdown notice. Errors are logged and dropped.
    pub fn send_closing(&mut self) {
        if let Err(e) = self.transport.notify(&OutboundMessage::closing()) {
            debug!("closing notice not delivered: {e}");
        }
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for ExchangeEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeEngine")
            .field("transport", &self.transport)
            .field("local", &self.local)
            .field("remote", &self.remote)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

fn check_status(reply: &InboundMessage) -> Result<(), ExchangeError> {
    if reply.is_ok() {
        Ok(())
    } else {
        Err(ExchangeError::PeerStatus { code: reply.status })
    }
}

/// Describe any proxy settings found in the environment.
fn proxy_hint(env: EnvLookup) -> Option<String> {
    let found: Vec<String> = PROXY_VARS
        .iter()
        .filter_map(|key| env(key).filter(|v| !v.is_empty()).map(|v| format!("{key}={v}")))
        .collect();
    (!found.is_empty()).then(|| format!("proxy settings in effect: {}", found.join(", ")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
