use thiserror::Error;

use crate::types::SideChannelId;

/// Top-level error type for actorlink.
#[derive(Debug, Error)]
pub enum ActorlinkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Side channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Side-channel registration and framing errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("A side channel with id {id} is already registered")]
    DuplicateChannel { id: SideChannelId },

    /// The side-channel blob cannot be split into frames. Fatal to the session.
    #[error("Corrupt side-channel data at byte {offset}: {reason}")]
    Framing { offset: usize, reason: String },

    #[error("Malformed side-channel message: {0}")]
    Malformed(String),
}

/// Errors raised by a transport while moving one message.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Peer closed the connection")]
    Disconnected,

    #[error("Timed out waiting for the peer")]
    Timeout,
}

/// Session-level exchange errors. Every variant except [`NotOpen`](Self::NotOpen)
/// and [`AlreadyOpened`](Self::AlreadyOpened) closes the session.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol version mismatch: local {local}, remote {remote}")]
    VersionMismatch { local: String, remote: String },

    #[error("Initialization failed: {message}")]
    Initialization { message: String },

    #[error("Side-channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Peer answered with status code {code}")]
    PeerStatus { code: u16 },

    #[error("Session is not open")]
    NotOpen,

    #[error("Session was already opened; sessions cannot be re-opened")]
    AlreadyOpened,
}

impl ExchangeError {
    /// Whether the error terminates the session.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::NotOpen | Self::AlreadyOpened)
    }
}
