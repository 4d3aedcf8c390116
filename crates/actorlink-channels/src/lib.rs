//! Side-channel multiplexing for actorlink.
//!
//! Side channels are auxiliary byte streams that ride along with every step
//! exchange, independent of any behavior:
//!
//! - [`side_channel`]: the [`SideChannel`] capability and its [`OutgoingQueue`]
//! - [`multiplexer`]: [`SideChannelMultiplexer`], which frames queued messages
//!   into one blob and routes inbound frames back to channels, caching frames
//!   for channels that have not registered yet
//! - [`message`]: little-endian reader/writer for typed channel payloads
//! - [`channels`]: built-in channels (raw bytes, float properties, engine
//!   configuration)
//!
//! # Wire format
//!
//! ```text
//! +-----------------+----------------+-----------------+
//! | Channel id (16B)| Length (4B LE) | Payload (Length)|  ... repeated
//! +-----------------+----------------+-----------------+
//! ```

pub mod channels;
pub mod message;
pub mod multiplexer;
pub mod side_channel;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use channels::{EngineConfig, EngineConfigurationChannel, FloatPropertiesChannel, RawBytesChannel};
pub use message::{IncomingMessage, OutgoingMessage};
pub use multiplexer::{CachedChannelMessage, SideChannelMultiplexer, encode_frames, split_frames};
pub use side_channel::{OutgoingQueue, SideChannel};

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        EngineConfig, EngineConfigurationChannel, FloatPropertiesChannel, IncomingMessage,
        OutgoingMessage, OutgoingQueue, RawBytesChannel, SideChannel, SideChannelMultiplexer,
    };
}
