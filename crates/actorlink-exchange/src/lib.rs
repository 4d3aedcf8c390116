//! Step-synchronous exchange between a simulation host and a decision service.
//!
//! The simulation submits one observation record per actor requesting a
//! decision, then calls [`Session::step`] once per simulation step. Each step
//! is a single request/response exchange:
//!
//! - [`batch`]: accumulates records and correlates returned actions to actors
//!   by position
//! - [`registry`]: behavior specs and their announcement state
//! - [`engine`]: handshake, exchange and shutdown over a [`Transport`]
//! - [`controller`]: session lifecycle and peer command dispatch
//! - [`session`]: the [`Session`] facade tying it all together
//! - [`protocol`] / [`framing`] / [`transport`]: wire types, length-prefixed
//!   JSON framing, and the TCP transport

pub mod batch;
pub mod controller;
pub mod engine;
pub mod framing;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use batch::StepBatchBuffer;
pub use controller::{SessionController, SessionState};
pub use engine::{ExchangeEngine, Handshake};
pub use protocol::{
    InboundMessage, InboundPayload, LocalInfo, OutboundMessage, OutboundPayload, PROTOCOL_VERSION,
    PeerCommand, RemoteInfo, negotiate_version,
};
pub use registry::{AnnouncementState, BehaviorRegistry};
pub use session::{Session, SharedSession};
pub use transport::{TcpTransport, Transport};

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        AnnouncementState, LocalInfo, PeerCommand, RemoteInfo, Session, SessionState,
        SharedSession, TcpTransport, Transport,
    };
}
