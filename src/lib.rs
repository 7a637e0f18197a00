// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregator;
pub mod api;
pub mod broker;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fleet;
pub mod generator;
pub mod metrics;
pub mod sensor;
pub mod types;
pub mod wire;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::{Event, EventAggregator};
pub use crate::broker::{Broker, MemoryBroker};
pub use crate::config::{CoordinatorConfig, FleetConfig, SensorConfig};
pub use crate::coordinator::{AnnouncementOutcome, DiscoveryCoordinator, SourceIngestor};
pub use crate::error::{ConfigError, DecodeError, FleetError, SubscriptionError, TransportError};
pub use crate::fleet::Fleet;
pub use crate::generator::{ValueGenerator, WalkBounds};
pub use crate::sensor::{AgentState, SensorAgent, SensorHandle};
pub use crate::types::{Reading, SourceId};
