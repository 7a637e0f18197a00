// src/fleet.rs
//! Runtime assembly: one broker, one aggregator, one coordinator and the
//! configured sensors, all hanging off a single shutdown token.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregator::EventAggregator;
use crate::broker::{Broker, MemoryBroker};
use crate::config::FleetConfig;
use crate::coordinator::{DiscoveryCoordinator, IngestSummary, SourceRegistry};
use crate::error::FleetError;
use crate::sensor::{SensorAgent, SensorHandle};
use crate::types::{Reading, SourceId};

pub struct Fleet {
    broker: Arc<dyn Broker>,
    aggregator: Arc<EventAggregator<Reading>>,
    coordinator: DiscoveryCoordinator,
    sensors: Vec<SensorHandle>,
    shutdown: CancellationToken,
}

impl Fleet {
    /// Start a fleet on a fresh in-process broker.
    pub async fn start(cfg: &FleetConfig) -> Result<Self, FleetError> {
        Self::start_on(cfg, Arc::new(MemoryBroker::new())).await
    }

    /// Start a fleet on the given broker. Configuration is validated before
    /// anything touches the broker.
    pub async fn start_on(cfg: &FleetConfig, broker: Arc<dyn Broker>) -> Result<Self, FleetError> {
        Self::start_with(cfg, broker, Arc::new(EventAggregator::new())).await
    }

    /// Start a fleet that publishes into `aggregator`. Handlers registered on
    /// it beforehand see every reading, including the very first ones.
    pub async fn start_with(
        cfg: &FleetConfig,
        broker: Arc<dyn Broker>,
        aggregator: Arc<EventAggregator<Reading>>,
    ) -> Result<Self, FleetError> {
        cfg.validate()?;

        let shutdown = CancellationToken::new();
        let coordinator = DiscoveryCoordinator::new(
            broker.clone(),
            aggregator.clone(),
            cfg.coordinator.clone(),
            shutdown.child_token(),
        );
        coordinator.start_discovery().await?;

        let mut sensors = Vec::with_capacity(cfg.sensors.len());
        for sc in &cfg.sensors {
            match SensorAgent::start(sc.clone(), broker.clone(), shutdown.child_token()).await {
                Ok(h) => sensors.push(h),
                Err(e) => {
                    warn!(sensor = %sc.name, error = %e, "sensor failed to start; rolling back");
                    for s in sensors {
                        s.stop().await;
                    }
                    coordinator.shutdown().await;
                    broker.close().await;
                    return Err(e);
                }
            }
        }

        info!(sensors = sensors.len(), "fleet started");
        Ok(Self {
            broker,
            aggregator,
            coordinator,
            sensors,
            shutdown,
        })
    }

    pub fn aggregator(&self) -> Arc<EventAggregator<Reading>> {
        self.aggregator.clone()
    }

    pub fn coordinator(&self) -> &DiscoveryCoordinator {
        &self.coordinator
    }

    pub fn registry(&self) -> Arc<SourceRegistry> {
        self.coordinator.registry()
    }

    pub fn broker(&self) -> Arc<dyn Broker> {
        self.broker.clone()
    }

    pub fn sensor_ids(&self) -> Vec<SourceId> {
        self.sensors.iter().map(|s| s.id().clone()).collect()
    }

    /// Token cancelled when the fleet stops; handy for graceful HTTP shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop sensors, then the coordinator, then close the broker.
    pub async fn stop(self) -> Vec<(SourceId, IngestSummary)> {
        for s in self.sensors {
            s.stop().await;
        }
        let summaries = self.coordinator.shutdown().await;
        self.shutdown.cancel();
        self.broker.close().await;
        info!("fleet stopped");
        summaries
    }
}
