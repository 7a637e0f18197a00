// src/config/mod.rs
//! Fleet configuration: file loading (TOML/JSON), env overrides and validation.

pub mod fleet;
pub mod sensor;

pub use fleet::{CoordinatorConfig, FleetConfig, ENV_FLEET_API_ADDR, ENV_FLEET_CONFIG_PATH};
pub use sensor::SensorConfig;
