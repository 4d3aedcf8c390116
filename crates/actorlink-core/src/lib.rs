// actorlink-core: Types, errors and configuration for the actorlink exchange protocol.

pub mod config;
pub mod error;
pub mod types;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        config::ExchangeConfig,
        error::{ActorlinkError, ChannelError, ConfigError, ExchangeError, TransportError},
        types::{
            Action, ActionSpec, ActorId, BehaviorName, BehaviorSpec, Observation,
            ObservationRecord, SideChannelId,
        },
    };
}
