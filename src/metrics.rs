use anyhow::Context;
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "fleet_discovery_requests_total",
            "Discovery requests broadcast by the coordinator."
        );
        describe_counter!(
            "fleet_announcements_total",
            "Source announcements received by the coordinator."
        );
        describe_counter!(
            "fleet_announcements_duplicate_total",
            "Announcements for sources that were already registered."
        );
        describe_gauge!(
            "fleet_sources_registered",
            "Sources with an active or pending ingestion stream."
        );
        describe_counter!(
            "fleet_subscription_retries_total",
            "Retries while attaching to a source queue."
        );
        describe_counter!(
            "fleet_subscription_failures_total",
            "Sources released after exhausting subscription retries."
        );
        describe_counter!(
            "fleet_ingest_readings_total",
            "Readings decoded and published to the aggregator."
        );
        describe_counter!(
            "fleet_ingest_decode_errors_total",
            "Queue messages dropped because they did not decode."
        );
        describe_counter!(
            "fleet_sensor_readings_published_total",
            "Readings published by simulated sensors."
        );
        describe_counter!(
            "fleet_events_unrouted_total",
            "Aggregator events published to a topic without handlers."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder for this process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Prometheus exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
