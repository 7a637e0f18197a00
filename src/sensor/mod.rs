// src/sensor/mod.rs
//! Simulated telemetry source.
//!
//! A sensor announces itself once at start, re-announces on every discovery
//! request, and publishes one reading per tick to its own queue.

use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker::{
    Broker, DeliveryStream, ExchangeKind, ANNOUNCE_EXCHANGE, DEFAULT_EXCHANGE, DISCOVERY_EXCHANGE,
};
use crate::config::SensorConfig;
use crate::error::{FleetError, TransportError};
use crate::generator::ValueGenerator;
use crate::types::{DiscoveryAnnouncement, Reading, SourceId};
use crate::wire::encode_reading;

/// Lifecycle of a sensor. `Streaming` is held until `stop()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Starting,
    Announced,
    Streaming,
    Stopped,
}

pub struct SensorAgent;

impl SensorAgent {
    /// Validate `cfg`, declare queues, announce, and spawn the responder and
    /// reading loops. Transport failures here are fatal for the sensor.
    pub async fn start(
        cfg: SensorConfig,
        broker: Arc<dyn Broker>,
        shutdown: CancellationToken,
    ) -> Result<SensorHandle, FleetError> {
        cfg.validate()?;
        let generator = ValueGenerator::from_seed(cfg.bounds(), cfg.seed)?;
        Self::start_with_generator(cfg, generator, broker, shutdown).await
    }

    /// Same as [`SensorAgent::start`] with a caller-built generator.
    pub async fn start_with_generator(
        cfg: SensorConfig,
        generator: ValueGenerator,
        broker: Arc<dyn Broker>,
        shutdown: CancellationToken,
    ) -> Result<SensorHandle, FleetError> {
        cfg.validate()?;
        let id = SourceId::new(cfg.name.as_str());
        let (state_tx, state_rx) = watch::channel(AgentState::Starting);

        let data_queue = broker.declare_queue(id.as_str()).await?;
        broker
            .declare_exchange(DISCOVERY_EXCHANGE, ExchangeKind::Fanout)
            .await?;

        announce(broker.as_ref(), &id).await?;
        let _ = state_tx.send(AgentState::Announced);

        let discovery_queue = broker.declare_queue("").await?;
        broker
            .bind_queue(&discovery_queue, DISCOVERY_EXCHANGE)
            .await?;
        let requests = broker.consume(&discovery_queue).await?;

        let responder = tokio::spawn(respond_to_discovery(
            id.clone(),
            broker.clone(),
            requests,
            shutdown.clone(),
        ));
        let readings = tokio::spawn(publish_readings(
            id.clone(),
            cfg.clone(),
            generator,
            broker.clone(),
            shutdown.clone(),
        ));
        let _ = state_tx.send(AgentState::Streaming);
        info!(source = %id, period_ms = cfg.period().as_millis() as u64, "sensor streaming");

        Ok(SensorHandle {
            id,
            data_queue,
            discovery_queue,
            broker,
            shutdown,
            state_tx,
            state_rx,
            tasks: vec![responder, readings],
        })
    }
}

/// Owned handle to a running sensor's tasks.
pub struct SensorHandle {
    id: SourceId,
    data_queue: String,
    discovery_queue: String,
    broker: Arc<dyn Broker>,
    shutdown: CancellationToken,
    state_tx: watch::Sender<AgentState>,
    state_rx: watch::Receiver<AgentState>,
    tasks: Vec<JoinHandle<()>>,
}

impl SensorHandle {
    pub fn id(&self) -> &SourceId {
        &self.id
    }

    pub fn state(&self) -> AgentState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<AgentState> {
        self.state_rx.clone()
    }

    /// Re-publish the announcement outside the discovery protocol.
    pub async fn announce(&self) -> Result<(), TransportError> {
        announce(self.broker.as_ref(), &self.id).await
    }

    /// Stop both loops and remove the sensor's queues. Deleting the data
    /// queue closes the stream of whichever ingestor consumes it.
    pub async fn stop(self) {
        self.shutdown.cancel();
        for t in self.tasks {
            if let Err(e) = t.await {
                warn!(source = %self.id, error = %e, "sensor task ended abnormally");
            }
        }
        for q in [&self.discovery_queue, &self.data_queue] {
            if let Err(e) = self.broker.delete_queue(q).await {
                debug!(source = %self.id, queue = %q, error = %e, "queue already gone");
            }
        }
        let _ = self.state_tx.send(AgentState::Stopped);
        info!(source = %self.id, "sensor stopped");
    }
}

async fn announce(broker: &dyn Broker, id: &SourceId) -> Result<(), TransportError> {
    let ann = DiscoveryAnnouncement::new(id.clone());
    broker.publish(ANNOUNCE_EXCHANGE, "", ann.to_bytes()).await?;
    debug!(source = %id, "announced");
    Ok(())
}

async fn respond_to_discovery(
    id: SourceId,
    broker: Arc<dyn Broker>,
    mut requests: DeliveryStream,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            req = requests.recv() => {
                if req.is_none() {
                    debug!(source = %id, "discovery request stream closed");
                    break;
                }
                match announce(broker.as_ref(), &id).await {
                    Ok(()) => {}
                    Err(TransportError::Closed) => break,
                    Err(e) => warn!(source = %id, error = %e, "re-announcement failed"),
                }
            }
        }
    }
}

async fn publish_readings(
    id: SourceId,
    cfg: SensorConfig,
    mut generator: ValueGenerator,
    broker: Arc<dyn Broker>,
    shutdown: CancellationToken,
) {
    let period = cfg.period();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let value = generator.tick();
        let reading = Reading::new(id.clone(), value, Utc::now());
        let body = match encode_reading(&reading) {
            Ok(b) => b,
            Err(e) => {
                warn!(source = %id, error = %e, "could not encode reading");
                continue;
            }
        };

        match broker.publish(DEFAULT_EXCHANGE, id.as_str(), body).await {
            Ok(()) => {
                counter!("fleet_sensor_readings_published_total").increment(1);
                debug!(source = %id, value, "reading sent");
            }
            Err(TransportError::Closed) => {
                warn!(source = %id, "broker closed; reading loop stopped");
                break;
            }
            Err(e) => warn!(source = %id, error = %e, "publish failed"),
        }
    }
}
