use std::any::Any;
use std::collections::VecDeque;

use actorlink_core::types::SideChannelId;

use crate::side_channel::{OutgoingQueue, SideChannel};

/// Opaque byte stream under a caller-chosen id.
///
/// Inbound payloads are stored until the owner takes them.
#[derive(Debug)]
pub struct RawBytesChannel {
    id: SideChannelId,
    received: VecDeque<Vec<u8>>,
    outgoing: OutgoingQueue,
}

impl RawBytesChannel {
    pub const fn new(id: SideChannelId) -> Self {
        Self {
            id,
            received: VecDeque::new(),
            outgoing: OutgoingQueue::new(),
        }
    }

    /// Queue a payload for the next exchange.
    pub fn send_raw(&mut self, payload: impl Into<Vec<u8>>) {
        self.outgoing.enqueue(payload.into());
    }

    /// Take every payload received so far, oldest first.
    pub fn take_received(&mut self) -> Vec<Vec<u8>> {
        self.received.drain(..).collect()
    }

    /// Number of payloads waiting to be taken.
    pub fn pending(&self) -> usize {
        self.received.len()
    }
}

impl SideChannel for RawBytesChannel {
    fn id(&self) -> SideChannelId {
        self.id
    }

    fn on_message(&mut self, payload: &[u8]) {
        self.received.push_back(payload.to_vec());
    }

    fn outgoing(&mut self) -> &mut OutgoingQueue {
        &mut self.outgoing
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "RawBytesChannel"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
