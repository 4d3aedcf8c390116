//! Per-step observation batches and positional action correlation.
//!
//! Actions come back without actor ids. The buffer remembers, per behavior,
//! the order in which actors submitted observations this step and maps the
//! i-th returned action onto the i-th actor.

use std::collections::{BTreeMap, HashMap};

use actorlink_core::types::{Action, ActorId, BehaviorName, ObservationRecord};
use tracing::warn;

/// Observation records and outstanding decisions for the current step.
#[derive(Debug, Default)]
pub struct StepBatchBuffer {
    batches: BTreeMap<BehaviorName, Vec<ObservationRecord>>,
    /// Actors awaiting a decision, per behavior, in submission order.
    pending: BTreeMap<BehaviorName, Vec<ActorId>>,
    /// `None` marks a decision requested but not yet received.
    last_actions: HashMap<BehaviorName, HashMap<ActorId, Option<Action>>>,
    needs_exchange: bool,
}

impl StepBatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one actor's record for the next exchange.
    ///
    /// A `done` record ends the actor's episode: its last action is forgotten
    /// and any action later returned for it this step is dropped.
    pub fn add_observation(&mut self, behavior: &BehaviorName, record: ObservationRecord) {
        let actor = record.actor_id;
        let actions = self.last_actions.entry(behavior.clone()).or_default();
        if record.done {
            actions.remove(&actor);
        } else {
            actions.insert(actor, None);
        }

        self.pending.entry(behavior.clone()).or_default().push(actor);
        self.batches.entry(behavior.clone()).or_default().push(record);
        self.needs_exchange = true;
    }

    /// Whether anything was submitted since the last [`take_batch`](Self::take_batch).
    pub const fn needs_exchange(&self) -> bool {
        self.needs_exchange
    }

    /// Whether `behavior` has records queued for the next exchange.
    pub fn has_traffic(&self, behavior: &str) -> bool {
        self.batches.get(behavior).is_some_and(|records| !records.is_empty())
    }

    /// Drain every queued batch. Pending decision lists are kept.
    pub fn take_batch(&mut self) -> BTreeMap<BehaviorName, Vec<ObservationRecord>> {
        self.needs_exchange = false;
        std::mem::take(&mut self.batches)
    }

    /// Actors of `behavior` awaiting a decision, in submission order.
    pub fn pending(&self, behavior: &str) -> &[ActorId] {
        self.pending.get(behavior).map_or(&[][..], Vec::as_slice)
    }

    /// Whether any behavior has actors awaiting a decision.
    pub fn has_pending(&self) -> bool {
        self.pending.values().any(|actors| !actors.is_empty())
    }

    /// Assign `actions[i]` to the i-th pending actor of `behavior`.
    ///
    /// Only the overlapping prefix is applied when the lengths differ. Actors
    /// whose episode ended since submitting are skipped. Returns the number of
    /// actions stored.
    pub fn apply_actions(&mut self, behavior: &BehaviorName, actions: Vec<Action>) -> usize {
        let pending = self.pending.get(behavior).map_or(&[][..], Vec::as_slice);
        if actions.len() != pending.len() {
            warn!(
                %behavior,
                expected = pending.len(),
                received = actions.len(),
                "action count does not match pending decisions; applying the overlapping prefix"
            );
        }

        let Some(last) = self.last_actions.get_mut(behavior) else {
            return 0;
        };
        let mut applied = 0;
        for (actor, action) in pending.iter().zip(actions) {
            if let Some(slot) = last.get_mut(actor) {
                *slot = Some(action);
                applied += 1;
            }
        }
        applied
    }

    /// Drop every pending decision list.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Drop queued records and pending decisions. Received actions are kept.
    pub fn discard_queued(&mut self) {
        self.batches.clear();
        self.pending.clear();
        self.needs_exchange = false;
    }

    /// Most recent action received for `actor`, if any.
    pub fn action(&self, behavior: &str, actor: ActorId) -> Option<&Action> {
        self.last_actions.get(behavior)?.get(&actor)?.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
