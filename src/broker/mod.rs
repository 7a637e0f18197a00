// src/broker/mod.rs
//! Message-broker contract used by sensors and the coordinator.
//!
//! The shape follows an AMQP-style broker: named exchanges (fanout or the
//! default direct exchange `""`), named queues bound to exchanges, and one
//! consumer stream per queue. Delivery is at-least-once and unordered across
//! queues; within one queue messages arrive in publish order.

pub mod memory;

use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

use crate::error::TransportError;

pub use memory::MemoryBroker;

/// Fanout exchange carrying empty-bodied discovery requests.
pub const DISCOVERY_EXCHANGE: &str = "SensorDiscovery";
/// Predeclared fanout exchange carrying source announcements.
pub const ANNOUNCE_EXCHANGE: &str = "amq.fanout";
/// Default direct exchange: the routing key is the destination queue name.
pub const DEFAULT_EXCHANGE: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Fanout,
    Direct,
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeKind::Fanout => f.write_str("fanout"),
            ExchangeKind::Direct => f.write_str("direct"),
        }
    }
}

/// One message as handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
}

/// Consumer side of a queue. Yields `None` once the queue is deleted or the broker closes.
pub type DeliveryStream = mpsc::UnboundedReceiver<Delivery>;

#[async_trait]
pub trait Broker: Send + Sync {
    /// Idempotent for the same kind; a different kind is an error.
    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), TransportError>;

    /// Declare a queue and return its name. An empty name asks for a server-named queue.
    async fn declare_queue(&self, name: &str) -> Result<String, TransportError>;

    async fn bind_queue(&self, queue: &str, exchange: &str) -> Result<(), TransportError>;

    /// Attach the single consumer of `queue`. Fails if the queue does not exist yet.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream, TransportError>;

    /// Fire-and-forget publish. Unroutable messages on the default exchange are dropped.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
    ) -> Result<(), TransportError>;

    /// Remove a queue; its consumer stream ends.
    async fn delete_queue(&self, queue: &str) -> Result<(), TransportError>;

    /// Tear down the connection; every stream ends and later calls fail with `Closed`.
    async fn close(&self);
}
