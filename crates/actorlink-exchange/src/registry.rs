//! Known behaviors and whether the peer has accepted their specs.

use std::collections::{BTreeMap, BTreeSet};

use actorlink_core::types::{BehaviorName, BehaviorSpec};
use tracing::debug;

/// Announcement progress of one behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementState {
    /// Spec not yet acknowledged by the peer.
    Unannounced,
    Announced,
}

/// Specs of every behavior seen this session.
///
/// A behavior's spec is sent with the first message that carries traffic for
/// it and re-sent on every later message until the peer acknowledges it.
#[derive(Debug, Default)]
pub struct BehaviorRegistry {
    specs: BTreeMap<BehaviorName, BehaviorSpec>,
    announced: BTreeSet<BehaviorName>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a behavior under `spec.name`.
    ///
    /// Registering a known name is a no-op and keeps the first spec. Returns
    /// whether the behavior was new.
    pub fn register(&mut self, spec: BehaviorSpec) -> bool {
        if self.specs.contains_key(&spec.name) {
            return false;
        }
        debug!(behavior = %spec.name, "behavior registered");
        self.specs.insert(spec.name.clone(), spec);
        true
    }

    pub fn spec(&self, name: &str) -> Option<&BehaviorSpec> {
        self.specs.get(name)
    }

    pub fn state(&self, name: &str) -> Option<AnnouncementState> {
        self.specs.contains_key(name).then(|| {
            if self.announced.contains(name) {
                AnnouncementState::Announced
            } else {
                AnnouncementState::Unannounced
            }
        })
    }

    pub fn is_announced(&self, name: &str) -> bool {
        self.announced.contains(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &BehaviorName> {
        self.specs.keys()
    }

    /// Specs of unannounced behaviors for which `has_traffic` holds.
    pub fn announcements_due(
        &self,
        has_traffic: impl Fn(&BehaviorName) -> bool,
    ) -> Vec<BehaviorSpec> {
        self.specs
            .iter()
            .filter(|(name, _)| !self.announced.contains(*name) && has_traffic(*name))
            .map(|(_, spec)| spec.clone())
            .collect()
    }

    /// Mark `names` as announced. Unregistered names are ignored.
    pub fn confirm<'a>(&mut self, names: impl IntoIterator<Item = &'a BehaviorName>) {
        for name in names {
            if !self.specs.contains_key(name) {
                debug!(behavior = %name, "peer acknowledged an unregistered behavior");
                continue;
            }
            if self.announced.insert(name.clone()) {
                debug!(behavior = %name, "behavior spec acknowledged");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use actorlink_core::types::ActionSpec;

    fn spec(name: &str, size: usize) -> BehaviorSpec {
        BehaviorSpec::new(name, vec![vec![4]], ActionSpec::Continuous { size })
    }

    // ---- register ----

    #[test]
    fn register_is_idempotent_and_keeps_first_spec() {
        let mut registry = BehaviorRegistry::new();
        assert!(registry.register(spec("A", 2)));
        assert!(!registry.register(spec("A", 5)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.spec("A").unwrap().action_spec.size(), 2);
        assert_eq!(registry.state("A"), Some(AnnouncementState::Unannounced));
    }

    #[test]
    fn unknown_behavior_has_no_state() {
        let registry = BehaviorRegistry::new();
        assert_eq!(registry.state("ghost"), None);
        assert!(registry.is_empty());
    }

    // ---- announcements ----

    #[test]
    fn only_behaviors_with_traffic_are_due() {
        let mut registry = BehaviorRegistry::new();
        registry.register(spec("Ball", 2));
        registry.register(spec("Cube", 3));

        let due = registry.announcements_due(|name| name.as_str() == "Ball");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name.as_str(), "Ball");
    }

    #[test]
    fn confirmed_behaviors_are_no_longer_due() {
        let mut registry = BehaviorRegistry::new();
        registry.register(spec("Ball", 2));
        registry.confirm([&BehaviorName::from("Ball")]);

        assert!(registry.is_announced("Ball"));
        assert_eq!(registry.state("Ball"), Some(AnnouncementState::Announced));
        assert!(registry.announcements_due(|_| true).is_empty());
    }

    #[test]
    fn unconfirmed_behavior_stays_due() {
        let mut registry = BehaviorRegistry::new();
        registry.register(spec("Ball", 2));
        assert_eq!(registry.announcements_due(|_| true).len(), 1);
        assert_eq!(registry.announcements_due(|_| true).len(), 1);
    }

    #[test]
    fn confirming_unregistered_name_is_ignored() {
        let mut registry = BehaviorRegistry::new();
        registry.confirm([&BehaviorName::from("ghost")]);
        assert!(!registry.is_announced("ghost"));
        assert_eq!(registry.state("ghost"), None);
    }
}
