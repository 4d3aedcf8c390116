//! Framing and routing of side-channel traffic.
//!
//! [`SideChannelMultiplexer`] owns the registered channels for one session.
//! Outbound, it concatenates every queued message into one blob of frames.
//! Inbound, it splits a blob back into frames and hands each payload to the
//! channel registered for its id. Frames for an id nobody has registered are
//! cached and replayed, in arrival order, the moment a channel with that id
//! registers.

use std::collections::BTreeMap;

use actorlink_core::error::ChannelError;
use actorlink_core::types::SideChannelId;
use tracing::{debug, warn};

use crate::side_channel::SideChannel;

/// Bytes used by the little-endian length prefix of each frame.
const LENGTH_PREFIX_LEN: usize = 4;

// ---------------------------------------------------------------------------
// CachedChannelMessage
// ---------------------------------------------------------------------------

/// An inbound frame held until a channel with a matching id registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedChannelMessage {
    pub id: SideChannelId,
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Frame helpers
// ---------------------------------------------------------------------------

fn write_frame(buf: &mut Vec<u8>, id: SideChannelId, payload: &[u8]) -> Result<(), ChannelError> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        ChannelError::Malformed(format!(
            "payload of {} bytes for channel {id} does not fit a u32 length prefix",
            payload.len()
        ))
    })?;
    buf.extend_from_slice(&id.to_wire_bytes());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(())
}

/// Encode `(id, payload)` pairs into one side-channel blob, in the given order.
///
/// # Errors
///
/// Returns [`ChannelError::Malformed`] if a payload exceeds `u32::MAX` bytes.
pub fn encode_frames<'a>(
    frames: impl IntoIterator<Item = (SideChannelId, &'a [u8])>,
) -> Result<Vec<u8>, ChannelError> {
    let mut buf = Vec::new();
    for (id, payload) in frames {
        write_frame(&mut buf, id, payload)?;
    }
    Ok(buf)
}

/// Split a side-channel blob into `(id, payload)` frames.
///
/// The whole blob is validated before anything is returned, so a corrupt blob
/// yields no frames at all. An empty blob yields an empty list.
///
/// # Errors
///
/// Returns [`ChannelError::Framing`] when a frame header is cut short or a
/// payload length runs past the end of the blob.
pub fn split_frames(bytes: &[u8]) -> Result<Vec<(SideChannelId, &[u8])>, ChannelError> {
    let mut frames = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let remaining = bytes.len() - offset;
        if remaining < SideChannelId::WIRE_LEN {
            return Err(ChannelError::Framing {
                offset,
                reason: format!("trailing {remaining} bytes cannot hold a channel id"),
            });
        }
        let mut id_bytes = [0u8; SideChannelId::WIRE_LEN];
        id_bytes.copy_from_slice(&bytes[offset..offset + SideChannelId::WIRE_LEN]);
        let id = SideChannelId::from_wire_bytes(id_bytes);
        offset += SideChannelId::WIRE_LEN;

        let remaining = bytes.len() - offset;
        if remaining < LENGTH_PREFIX_LEN {
            return Err(ChannelError::Framing {
                offset,
                reason: format!("truncated length prefix for channel {id}"),
            });
        }
        let mut len_bytes = [0u8; LENGTH_PREFIX_LEN];
        len_bytes.copy_from_slice(&bytes[offset..offset + LENGTH_PREFIX_LEN]);
        let len = u32::from_le_bytes(len_bytes) as usize;
        offset += LENGTH_PREFIX_LEN;

        let remaining = bytes.len() - offset;
        if len > remaining {
            return Err(ChannelError::Framing {
                offset,
                reason: format!("payload length {len} exceeds remaining {remaining} bytes"),
            });
        }
        frames.push((id, &bytes[offset..offset + len]));
        offset += len;
    }

    Ok(frames)
}

// ---------------------------------------------------------------------------
// SideChannelMultiplexer
// ---------------------------------------------------------------------------

/// Registered side channels plus the cache of frames nobody has claimed yet.
///
/// Channels are encoded in ascending id order.
#[derive(Default)]
pub struct SideChannelMultiplexer {
    channels: BTreeMap<SideChannelId, Box<dyn SideChannel>>,
    cache: Vec<CachedChannelMessage>,
}

impl SideChannelMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel and replay any cached frames addressed to it.
    ///
    /// Cached frames are delivered synchronously, in arrival order, before
    /// this returns. Frames for other ids stay cached.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::DuplicateChannel`] if a channel with the same id
    /// is already registered. The multiplexer is left unchanged.
    pub fn register(&mut self, channel: Box<dyn SideChannel>) -> Result<(), ChannelError> {
        let id = channel.id();
        if self.channels.contains_key(&id) {
            return Err(ChannelError::DuplicateChannel { id });
        }
        let channel = self.channels.entry(id).or_insert(channel);

        let (matching, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.cache).into_iter().partition(|m| m.id == id);
        self.cache = rest;
        if !matching.is_empty() {
            debug!(
                channel = %id,
                replayed = matching.len(),
                "replaying cached side-channel messages"
            );
        }
        for message in matching {
            channel.on_message(&message.payload);
        }
        Ok(())
    }

    /// Remove a channel. Returns `None` when no channel has that id.
    pub fn unregister(&mut self, id: SideChannelId) -> Option<Box<dyn SideChannel>> {
        self.channels.remove(&id)
    }

    pub fn contains(&self, id: SideChannelId) -> bool {
        self.channels.contains_key(&id)
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Ids of the registered channels in encode order.
    pub fn ids(&self) -> impl Iterator<Item = SideChannelId> + '_ {
        self.channels.keys().copied()
    }

    /// Typed access to a registered channel.
    pub fn channel<C: SideChannel>(&self, id: SideChannelId) -> Option<&C> {
        self.channels.get(&id)?.as_any().downcast_ref::<C>()
    }

    /// Typed mutable access to a registered channel.
    pub fn channel_mut<C: SideChannel>(&mut self, id: SideChannelId) -> Option<&mut C> {
        self.channels.get_mut(&id)?.as_any_mut().downcast_mut::<C>()
    }

    /// Frames waiting for a channel to register.
    pub fn cached(&self) -> &[CachedChannelMessage] {
        &self.cache
    }

    /// Whether any registered channel has queued outbound messages.
    pub fn has_outgoing(&mut self) -> bool {
        self.channels.values_mut().any(|c| !c.outgoing().is_empty())
    }

    /// Drain every channel's outbound queue into one blob.
    ///
    /// Returns an empty vector when nothing is queued.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Malformed`] if a payload is too large to frame.
    pub fn encode(&mut self) -> Result<Vec<u8>, ChannelError> {
        let mut buf = Vec::new();
        for (id, channel) in &mut self.channels {
            for payload in channel.outgoing().drain() {
                write_frame(&mut buf, *id, &payload)?;
            }
        }
        Ok(buf)
    }

    /// Route every frame in `bytes` to its channel, caching unclaimed frames.
    ///
    /// An empty blob is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Framing`] if the blob is corrupt. No frame is
    /// delivered or cached in that case.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        for (id, payload) in split_frames(bytes)? {
            if let Some(channel) = self.channels.get_mut(&id) {
                channel.on_message(payload);
            } else {
                warn!(
                    channel = %id,
                    bytes = payload.len(),
                    "unknown side channel id, caching message until a channel registers"
                );
                self.cache.push(CachedChannelMessage {
                    id,
                    payload: payload.to_vec(),
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SideChannelMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideChannelMultiplexer")
            .field("channels", &self.channels.keys().collect::<Vec<_>>())
            .field("cached", &self.cache.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
