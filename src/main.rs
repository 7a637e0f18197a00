//! Sensor fleet: binary entrypoint.
//! Runs the configured simulated sensors and a discovery coordinator on an
//! in-process broker, logs every reading, and optionally serves the
//! introspection routes. Stops on Ctrl+C.

use anyhow::Context;
use sensor_fleet::api::{create_router, AppState};
use sensor_fleet::metrics::Metrics;
use sensor_fleet::{Event, EventAggregator, Fleet, FleetConfig, MemoryBroker, Reading, SourceId};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sensor_fleet=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = FleetConfig::load_default().context("loading fleet config")?;

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = ?e, "metrics disabled");
            None
        }
    };

    let aggregator: Arc<EventAggregator<Reading>> = Arc::new(EventAggregator::new());
    for sc in &cfg.sensors {
        aggregator.register(
            SourceId::new(sc.name.as_str()).reading_topic(),
            |ev: &Event<Reading>| {
                info!(
                    source = %ev.payload.source,
                    value = ev.payload.value,
                    ts = %ev.payload.timestamp,
                    "reading"
                );
            },
        );
    }

    let fleet = Fleet::start_with(&cfg, Arc::new(MemoryBroker::new()), aggregator)
        .await
        .context("fleet startup failed")?;

    let server = match &cfg.api_addr {
        Some(addr) => {
            let state = AppState {
                registry: fleet.registry(),
                metrics: metrics.as_ref().map(|m| m.handle.clone()),
            };
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding api on {addr}"))?;
            info!(%addr, "introspection api listening");
            let token = fleet.shutdown_token();
            Some(tokio::spawn(async move {
                axum::serve(listener, create_router(state))
                    .with_graceful_shutdown(token.cancelled_owned())
                    .await
            }))
        }
        None => None,
    };

    info!("fleet running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl+C")?;
    info!("Ctrl+C received, shutting down...");

    for (source, s) in fleet.stop().await {
        info!(%source, received = s.received, published = s.published, dropped = s.dropped, "ingestor summary");
    }
    if let Some(server) = server {
        server.await.context("api task")?.context("api server")?;
    }

    Ok(())
}
