// src/coordinator/ingestor.rs
use metrics::counter;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregator::EventAggregator;
use crate::broker::DeliveryStream;
use crate::types::{Reading, SourceId};
use crate::wire::decode_reading;

/// Counters reported by an ingestor when its loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub received: u64,
    pub published: u64,
    pub dropped: u64,
}

/// Drains one source queue into the aggregator.
pub struct SourceIngestor {
    source: SourceId,
    topic: String,
    stream: DeliveryStream,
    aggregator: Arc<EventAggregator<Reading>>,
    shutdown: CancellationToken,
}

impl SourceIngestor {
    pub fn new(
        source: SourceId,
        stream: DeliveryStream,
        aggregator: Arc<EventAggregator<Reading>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            topic: source.reading_topic(),
            source,
            stream,
            aggregator,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<IngestSummary> {
        tokio::spawn(self.run())
    }

    /// Runs until the stream closes or shutdown is signalled.
    /// Undecodable messages are logged and skipped.
    pub async fn run(mut self) -> IngestSummary {
        let mut summary = IngestSummary::default();
        info!(source = %self.source, topic = %self.topic, "ingestor started");

        loop {
            let delivery = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!(source = %self.source, "ingestor cancelled");
                    break;
                }
                d = self.stream.recv() => match d {
                    Some(d) => d,
                    None => {
                        info!(source = %self.source, "source stream closed");
                        break;
                    }
                },
            };
            summary.received += 1;

            match decode_reading(&delivery.body) {
                Ok(reading) => {
                    counter!("fleet_ingest_readings_total").increment(1);
                    debug!(source = %self.source, value = reading.value, "reading received");
                    self.aggregator.publish(&self.topic, reading);
                    summary.published += 1;
                }
                Err(e) => {
                    counter!("fleet_ingest_decode_errors_total").increment(1);
                    warn!(source = %self.source, error = %e, bytes = delivery.body.len(), "dropping undecodable message");
                    summary.dropped += 1;
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::Delivery;
    use chrono::Utc;
    use tokio::sync::mpsc;

    fn delivery(body: Vec<u8>) -> Delivery {
        Delivery {
            exchange: String::new(),
            routing_key: "s1".into(),
            body,
        }
    }

    #[tokio::test]
    async fn counts_published_and_dropped_until_stream_closes() {
        let agg: Arc<EventAggregator<Reading>> = Arc::new(EventAggregator::new());
        let mut rx = agg.subscribe_channel("reading_s1");
        let (tx, stream) = mpsc::unbounded_channel();
        let ing = SourceIngestor::new(
            SourceId::new("s1"),
            stream,
            agg.clone(),
            CancellationToken::new(),
        );
        let handle = ing.spawn();

        let r = Reading::new(SourceId::new("s1"), 2.5, Utc::now());
        tx.send(delivery(b"junk".to_vec())).unwrap();
        tx.send(delivery(crate::wire::encode_reading(&r).unwrap()))
            .unwrap();
        drop(tx);

        let summary = handle.await.unwrap();
        assert_eq!(
            summary,
            IngestSummary {
                received: 2,
                published: 1,
                dropped: 1
            }
        );
        assert_eq!(rx.recv().await.unwrap().payload, r);
    }

    #[tokio::test]
    async fn stops_on_cancellation() {
        let agg: Arc<EventAggregator<Reading>> = Arc::new(EventAggregator::new());
        let (_tx, stream) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let handle =
            SourceIngestor::new(SourceId::new("s1"), stream, agg, token.clone()).spawn();
        token.cancel();
        assert_eq!(handle.await.unwrap(), IngestSummary::default());
    }
}
