//! Behavior, record and side-channel fixtures.

use std::any::Any;
use std::sync::Arc;

use actorlink_channels::{OutgoingQueue, SideChannel};
use actorlink_core::types::{
    ActionSpec, ActorId, BehaviorSpec, Observation, ObservationRecord, SideChannelId,
};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Behaviors and records
// ---------------------------------------------------------------------------

/// `"Ball"`: one 8-float observation, 2 continuous actions.
pub fn ball_spec() -> BehaviorSpec {
    BehaviorSpec::new("Ball", vec![vec![8]], ActionSpec::Continuous { size: 2 })
}

/// `"Cube"`: a 4-float and a 3x3 observation, two discrete branches.
pub fn cube_spec() -> BehaviorSpec {
    BehaviorSpec::new(
        "Cube",
        vec![vec![4], vec![3, 3]],
        ActionSpec::Discrete {
            branches: vec![3, 2],
        },
    )
}

/// A non-terminal record for `actor` whose observations fit `spec`.
pub fn record(spec: &BehaviorSpec, actor: impl Into<ActorId>) -> ObservationRecord {
    let observations = spec
        .observation_shapes
        .iter()
        .map(|shape| Observation::zeros(shape.iter().product()))
        .collect();
    ObservationRecord::new(actor, observations)
}

// ---------------------------------------------------------------------------
// RecordingChannel
// ---------------------------------------------------------------------------

/// Payloads received by a [`RecordingChannel`], shared with the test.
pub type ReceivedLog = Arc<Mutex<Vec<Vec<u8>>>>;

/// A side channel that records every inbound payload.
///
/// The log is shared, so a test can keep reading it after the channel has
/// been handed to a session.
#[derive(Debug)]
pub struct RecordingChannel {
    id: SideChannelId,
    received: ReceivedLog,
    outgoing: OutgoingQueue,
}

impl RecordingChannel {
    pub fn new(id: SideChannelId) -> Self {
        Self {
            id,
            received: ReceivedLog::default(),
            outgoing: OutgoingQueue::new(),
        }
    }

    /// Handle to the inbound payload log.
    pub fn received_log(&self) -> ReceivedLog {
        Arc::clone(&self.received)
    }

    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().clone()
    }
}

impl SideChannel for RecordingChannel {
    fn id(&self) -> SideChannelId {
        self.id
    }

    fn on_message(&mut self, payload: &[u8]) {
        self.received.lock().push(payload.to_vec());
    }

    fn outgoing(&mut self) -> &mut OutgoingQueue {
        &mut self.outgoing
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "RecordingChannel"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
