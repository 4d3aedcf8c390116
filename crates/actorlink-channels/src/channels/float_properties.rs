use std::any::Any;
use std::collections::HashMap;

use actorlink_core::error::ChannelError;
use actorlink_core::types::SideChannelId;
use tracing::warn;

use crate::message::{IncomingMessage, OutgoingMessage};
use crate::side_channel::{OutgoingQueue, SideChannel};

/// String-keyed `f32` properties shared with the peer.
///
/// Every message carries one key/value pair. Either side may set a property;
/// the latest value wins.
#[derive(Debug)]
pub struct FloatPropertiesChannel {
    id: SideChannelId,
    properties: HashMap<String, f32>,
    outgoing: OutgoingQueue,
}

impl FloatPropertiesChannel {
    /// Id used when none is given.
    pub const DEFAULT_ID: SideChannelId =
        SideChannelId::from_u128(0x60cc_f7d0_4f7e_11ea_b238_784f_4387_d1f7);

    pub fn new() -> Self {
        Self::with_id(Self::DEFAULT_ID)
    }

    pub fn with_id(id: SideChannelId) -> Self {
        Self {
            id,
            properties: HashMap::new(),
            outgoing: OutgoingQueue::new(),
        }
    }

    /// Set a property locally and queue it for the peer.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Malformed`] if the key is too long to encode. Nothing is
    /// stored in that case.
    pub fn set(&mut self, key: impl Into<String>, value: f32) -> Result<(), ChannelError> {
        let key = key.into();
        let mut msg = OutgoingMessage::new();
        msg.write_string(&key)?.write_f32(value);
        self.outgoing.enqueue(msg.into_bytes());
        self.properties.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.properties.get(key).copied()
    }

    /// Look up a property, falling back to `default` when it was never set.
    pub fn get_or(&self, key: &str, default: f32) -> f32 {
        self.get(key).unwrap_or(default)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    fn parse(payload: &[u8]) -> Result<(String, f32), ChannelError> {
        let mut msg = IncomingMessage::new(payload);
        let key = msg.read_string()?;
        let value = msg.read_f32()?;
        Ok((key, value))
    }
}

impl Default for FloatPropertiesChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SideChannel for FloatPropertiesChannel {
    fn id(&self) -> SideChannelId {
        self.id
    }

    fn on_message(&mut self, payload: &[u8]) {
        match Self::parse(payload) {
            Ok((key, value)) => {
                self.properties.insert(key, value);
            }
            Err(e) => warn!(channel = %self.id, "dropping float property message: {e}"),
        }
    }

    fn outgoing(&mut self) -> &mut OutgoingQueue {
        &mut self.outgoing
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "FloatPropertiesChannel"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
