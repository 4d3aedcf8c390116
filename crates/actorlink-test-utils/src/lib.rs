//! Shared test fixtures and utilities for actorlink crates.
//!
//! Provides a scripted in-memory peer, behavior and record builders, a
//! recording side channel, and deterministic RNG setup.

pub mod fixtures;
pub mod peer;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use fixtures::{ReceivedLog, RecordingChannel, ball_spec, cube_spec, record};
pub use peer::{ScriptedPeer, SentLog};
pub use rng::{deterministic_vec, random_observation, seeded_rng};
