//! The side-channel capability.

use std::any::Any;

use actorlink_core::types::SideChannelId;

// ---------------------------------------------------------------------------
// OutgoingQueue
// ---------------------------------------------------------------------------

/// Messages a channel has queued for the next exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingQueue {
    messages: Vec<Vec<u8>>,
}

impl OutgoingQueue {
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Queue one message payload.
    pub fn enqueue(&mut self, payload: Vec<u8>) {
        self.messages.push(payload);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Take every queued message in enqueue order, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.messages)
    }
}

// ---------------------------------------------------------------------------
// SideChannel
// ---------------------------------------------------------------------------

/// An endpoint for one side-channel stream.
///
/// Implementors own their outbound queue and decide what to do with inbound
/// payloads. The multiplexer only moves bytes; it never inspects them.
pub trait SideChannel: Any + Send {
    /// Identifier routing frames to this channel.
    fn id(&self) -> SideChannelId;

    /// Handle one inbound payload addressed to this channel.
    fn on_message(&mut self, payload: &[u8]);

    /// The channel's outbound queue.
    fn outgoing(&mut self) -> &mut OutgoingQueue;

    /// Queue one raw payload for the next exchange.
    fn enqueue(&mut self, payload: Vec<u8>) {
        self.outgoing().enqueue(payload);
    }

    /// Human-readable name for diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drains_in_order() {
        let mut queue = OutgoingQueue::new();
        queue.enqueue(vec![1]);
        queue.enqueue(vec![2, 3]);
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(drained, vec![vec![1], vec![2, 3]]);
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_on_empty_queue_is_empty() {
        let mut queue = OutgoingQueue::default();
        assert!(queue.drain().is_empty());
    }
}
