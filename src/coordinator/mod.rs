// src/coordinator/mod.rs
//! Discovery coordinator: learns about sources from their announcements and
//! keeps exactly one ingestion stream per source.

pub mod ingestor;
pub mod registry;

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregator::EventAggregator;
use crate::broker::{Broker, DeliveryStream, ExchangeKind, ANNOUNCE_EXCHANGE, DISCOVERY_EXCHANGE};
use crate::config::CoordinatorConfig;
use crate::error::{SubscriptionError, TransportError};
use crate::metrics::ensure_metrics_described;
use crate::types::{Reading, SourceId};

pub use ingestor::{IngestSummary, SourceIngestor};
pub use registry::SourceRegistry;

/// What happened to one announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementOutcome {
    /// New source; an ingestor is running.
    Registered,
    /// Already known; nothing changed.
    Duplicate,
    /// Could not attach to the source queue; the slot was released.
    Dropped,
}

struct Inner {
    broker: Arc<dyn Broker>,
    aggregator: Arc<EventAggregator<Reading>>,
    registry: Arc<SourceRegistry>,
    cfg: CoordinatorConfig,
    shutdown: CancellationToken,
}

/// Cheap to clone; clones share the registry and the shutdown signal.
#[derive(Clone)]
pub struct DiscoveryCoordinator {
    inner: Arc<Inner>,
    listener: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl DiscoveryCoordinator {
    pub fn new(
        broker: Arc<dyn Broker>,
        aggregator: Arc<EventAggregator<Reading>>,
        cfg: CoordinatorConfig,
        shutdown: CancellationToken,
    ) -> Self {
        ensure_metrics_described();
        Self {
            inner: Arc::new(Inner {
                broker,
                aggregator,
                registry: Arc::new(SourceRegistry::new()),
                cfg,
                shutdown,
            }),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    pub fn registry(&self) -> Arc<SourceRegistry> {
        self.inner.registry.clone()
    }

    pub fn known_sources(&self) -> Vec<SourceId> {
        self.inner.registry.ids()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Bind an ephemeral queue to the announcement channel, start listening
    /// and broadcast one discovery request. Calling it again only re-broadcasts.
    pub async fn start_discovery(&self) -> Result<(), TransportError> {
        let mut listener = self.listener.lock().await;
        if listener.is_none() {
            let broker = &self.inner.broker;
            broker
                .declare_exchange(DISCOVERY_EXCHANGE, ExchangeKind::Fanout)
                .await?;
            let queue = broker.declare_queue("").await?;
            broker.bind_queue(&queue, ANNOUNCE_EXCHANGE).await?;
            let announcements = broker.consume(&queue).await?;

            let handle = tokio::spawn(self.clone().listen(announcements));
            *listener = Some(handle);
            info!(queue = %queue, "listening for new sources");
        }
        drop(listener);
        self.request_discovery().await
    }

    /// Ask every running source to announce itself again.
    pub async fn request_discovery(&self) -> Result<(), TransportError> {
        self.inner
            .broker
            .publish(DISCOVERY_EXCHANGE, "", Vec::new())
            .await?;
        counter!("fleet_discovery_requests_total").increment(1);
        debug!("discovery request sent");
        Ok(())
    }

    async fn listen(self, mut announcements: DeliveryStream) {
        let mut pending = JoinSet::new();
        let shutdown = self.inner.shutdown.clone();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(_) = pending.join_next(), if !pending.is_empty() => {}
                msg = announcements.recv() => {
                    let Some(msg) = msg else {
                        warn!("announcement stream closed; discovery stopped");
                        break;
                    };
                    let Some(id) = SourceId::from_announcement(&msg.body) else {
                        warn!(bytes = msg.body.len(), "ignoring announcement without a usable identifier");
                        continue;
                    };
                    let this = self.clone();
                    pending.spawn(async move {
                        this.on_announcement(id).await;
                    });
                }
            }
        }

        pending.shutdown().await;
    }

    /// Handle one announcement. Idempotent: only the first announcement for an
    /// identifier opens a stream and spawns an ingestor.
    pub async fn on_announcement(&self, id: SourceId) -> AnnouncementOutcome {
        counter!("fleet_announcements_total").increment(1);
        let registry = &self.inner.registry;

        if !registry.try_reserve(&id) {
            counter!("fleet_announcements_duplicate_total").increment(1);
            debug!(source = %id, "duplicate announcement ignored");
            return AnnouncementOutcome::Duplicate;
        }

        let stream = match self.open_stream(&id).await {
            Ok(s) => s,
            Err(e) => {
                counter!("fleet_subscription_failures_total").increment(1);
                warn!(source = %id, error = %e, "could not attach ingestor; releasing source");
                registry.release(&id);
                return AnnouncementOutcome::Dropped;
            }
        };

        let ingestor = SourceIngestor::new(
            id.clone(),
            stream,
            self.inner.aggregator.clone(),
            self.inner.shutdown.child_token(),
        );
        if let Err(orphan) = registry.activate(&id, ingestor.spawn()) {
            orphan.abort();
            warn!(source = %id, "registry slot vanished before activation");
            return AnnouncementOutcome::Dropped;
        }

        info!(source = %id, "new source discovered");
        AnnouncementOutcome::Registered
    }

    /// Consume the source queue, backing off exponentially while it does not exist yet.
    async fn open_stream(&self, id: &SourceId) -> Result<DeliveryStream, SubscriptionError> {
        let cfg = &self.inner.cfg;
        let attempts = cfg.subscribe_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match self.inner.broker.consume(id.as_str()).await {
                Ok(stream) => return Ok(stream),
                Err(e) => e,
            };
            if attempt >= attempts {
                return Err(SubscriptionError::Exhausted {
                    source_id: id.to_string(),
                    attempts,
                    last: err,
                });
            }

            let delay = exponential_backoff(
                Duration::from_millis(cfg.backoff_base_ms),
                attempt,
                Duration::from_millis(cfg.backoff_max_ms),
            );
            counter!("fleet_subscription_retries_total").increment(1);
            debug!(source = %id, attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying subscription");

            tokio::select! {
                _ = self.inner.shutdown.cancelled() => {
                    return Err(SubscriptionError::Cancelled(id.to_string()));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Stop discovery and every ingestor, and wait for them.
    /// Returns each ingestor's summary.
    pub async fn shutdown(&self) -> Vec<(SourceId, IngestSummary)> {
        self.inner.shutdown.cancel();

        let listener = self.listener.lock().await.take();
        if let Some(h) = listener {
            if let Err(e) = h.await {
                warn!(error = %e, "discovery listener ended abnormally");
            }
        }

        let mut summaries = Vec::new();
        for (id, handle) in self.inner.registry.take_handles() {
            match handle.await {
                Ok(s) => summaries.push((id, s)),
                Err(e) => warn!(source = %id, error = %e, "ingestor ended abnormally"),
            }
        }
        summaries.sort_by(|a, b| a.0.cmp(&b.0));
        info!(sources = summaries.len(), "coordinator stopped");
        summaries
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
pub(crate) fn exponential_backoff(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << shift).min(cap)
}
