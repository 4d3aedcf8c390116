//! Built-in side channels.

mod engine_config;
mod float_properties;
mod raw_bytes;

pub use engine_config::{EngineConfig, EngineConfigurationChannel};
pub use float_properties::FloatPropertiesChannel;
pub use raw_bytes::RawBytesChannel;
