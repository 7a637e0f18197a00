// src/error.rs
//! Typed error taxonomy for the fleet.
//!
//! Only `TransportError` and `ConfigError` ever reach a caller of a `start`
//! function. `SubscriptionError` and `DecodeError` are absorbed by the
//! coordinator and the ingestors and surface through logs and metrics.

use thiserror::Error;

/// Failure to declare, bind, consume from or publish to the broker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("broker connection is closed")]
    Closed,
    #[error("exchange not found: {0}")]
    ExchangeNotFound(String),
    #[error("queue not found: {0}")]
    QueueNotFound(String),
    #[error("queue {0} already has a consumer")]
    ConsumerBusy(String),
    #[error("exchange {name} already declared as {existing}")]
    ExchangeKindMismatch { name: String, existing: String },
}

/// Failure to attach an ingestor to a freshly discovered source queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("gave up subscribing to {source_id} after {attempts} attempts: {last}")]
    Exhausted {
        source_id: String,
        attempts: u32,
        last: TransportError,
    },
    #[error("subscription to {0} cancelled by shutdown")]
    Cancelled(String),
}

/// A message on a source queue that is not a valid reading.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed reading: {0}")]
    Malformed(#[from] rmp_serde::decode::Error),
    #[error("unsupported wire schema v{found} (expected v{expected})")]
    SchemaMismatch { expected: u16, found: u16 },
}

/// Invalid sensor / generator configuration. Always raised before any task starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("sensor name must not be empty")]
    EmptyName,
    #[error("sensor name {0:?} has leading or trailing whitespace")]
    PaddedName(String),
    #[error("update frequency must be > 0 (got {0})")]
    InvalidFrequency(u32),
    #[error("bounds must satisfy min < max and be finite (min={min}, max={max})")]
    InvalidBounds { min: f64, max: f64 },
    #[error("step size must be finite and > 0 (got {0})")]
    InvalidStep(f64),
    #[error("initial value {value} outside [{min}, {max}]")]
    InitialOutOfRange { value: f64, min: f64, max: f64 },
    #[error("duplicate sensor name in fleet config: {0}")]
    DuplicateName(String),
}

/// Top-level startup error.
#[derive(Error, Debug)]
pub enum FleetError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
