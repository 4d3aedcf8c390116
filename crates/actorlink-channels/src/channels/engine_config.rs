use std::any::Any;

use actorlink_core::error::ChannelError;
use actorlink_core::types::SideChannelId;
use tracing::{debug, warn};

use crate::message::{IncomingMessage, OutgoingMessage};
use crate::side_channel::{OutgoingQueue, SideChannel};

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Rendering and timing settings the peer asks the simulation to apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub width: i32,
    pub height: i32,
    pub quality_level: i32,
    /// Simulation speed multiplier.
    pub time_scale: f32,
    /// `-1` leaves the frame rate uncapped.
    pub target_frame_rate: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 80,
            quality_level: 1,
            time_scale: 20.0,
            target_frame_rate: -1,
        }
    }
}

impl EngineConfig {
    /// Encode as `i32 width, i32 height, i32 quality, f32 time scale, i32 frame rate`, all LE.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut msg = OutgoingMessage::new();
        msg.write_i32(self.width)
            .write_i32(self.height)
            .write_i32(self.quality_level)
            .write_f32(self.time_scale)
            .write_i32(self.target_frame_rate);
        msg.into_bytes()
    }

    /// Decode the layout written by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Malformed`] if the payload is too short.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, ChannelError> {
        let mut msg = IncomingMessage::new(payload);
        Ok(Self {
            width: msg.read_i32()?,
            height: msg.read_i32()?,
            quality_level: msg.read_i32()?,
            time_scale: msg.read_f32()?,
            target_frame_rate: msg.read_i32()?,
        })
    }
}

// ---------------------------------------------------------------------------
// EngineConfigurationChannel
// ---------------------------------------------------------------------------

/// Receives [`EngineConfig`] updates from the peer.
///
/// The simulation polls [`take_update`](Self::take_update) between steps and
/// applies whatever arrived.
#[derive(Debug)]
pub struct EngineConfigurationChannel {
    id: SideChannelId,
    current: EngineConfig,
    updated: bool,
    outgoing: OutgoingQueue,
}

impl EngineConfigurationChannel {
    pub const DEFAULT_ID: SideChannelId =
        SideChannelId::from_u128(0xe951_342c_4f7e_11ea_b238_784f_4387_d1f7);

    pub fn new() -> Self {
        Self {
            id: Self::DEFAULT_ID,
            current: EngineConfig::default(),
            updated: false,
            outgoing: OutgoingQueue::new(),
        }
    }

    /// Latest configuration, or the defaults if none has arrived.
    pub const fn current(&self) -> &EngineConfig {
        &self.current
    }

    /// The configuration received since the last call, if any.
    pub fn take_update(&mut self) -> Option<EngineConfig> {
        std::mem::take(&mut self.updated).then_some(self.current)
    }
}

impl Default for EngineConfigurationChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SideChannel for EngineConfigurationChannel {
    fn id(&self) -> SideChannelId {
        self.id
    }

    fn on_message(&mut self, payload: &[u8]) {
        match EngineConfig::from_bytes(payload) {
            Ok(config) => {
                debug!(?config, "engine configuration received");
                self.current = config;
                self.updated = true;
            }
            Err(e) => warn!(channel = %self.id, "dropping engine configuration message: {e}"),
        }
    }

    fn outgoing(&mut self) -> &mut OutgoingQueue {
        &mut self.outgoing
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "EngineConfigurationChannel"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
