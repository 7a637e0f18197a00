// tests/sensor_agent.rs
use sensor_fleet::broker::{Broker, MemoryBroker, ANNOUNCE_EXCHANGE, DISCOVERY_EXCHANGE};
use sensor_fleet::wire::decode_reading;
use sensor_fleet::{
    AgentState, ConfigError, FleetError, SensorAgent, SensorConfig, SourceId, ValueGenerator,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Queue bound to the announcement exchange, so announcements can be observed.
async fn announcement_spy(broker: &MemoryBroker) -> sensor_fleet::broker::DeliveryStream {
    let q = broker.declare_queue("").await.unwrap();
    broker.bind_queue(&q, ANNOUNCE_EXCHANGE).await.unwrap();
    broker.consume(&q).await.unwrap()
}

#[tokio::test]
async fn announces_on_start_and_on_every_request() {
    let broker = Arc::new(MemoryBroker::new());
    let mut spy = announcement_spy(&broker).await;

    let handle = SensorAgent::start(
        SensorConfig::named("sensor1"),
        broker.clone(),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(handle.state(), AgentState::Streaming);
    assert_eq!(handle.id(), &SourceId::new("sensor1"));

    let first = timeout(Duration::from_secs(1), spy.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.body, b"sensor1");

    for _ in 0..2 {
        broker
            .publish(DISCOVERY_EXCHANGE, "", Vec::new())
            .await
            .unwrap();
        let again = timeout(Duration::from_secs(1), spy.recv())
            .await
            .expect("re-announcement")
            .unwrap();
        assert_eq!(again.body, b"sensor1");
    }

    handle.announce().await.unwrap();
    assert_eq!(spy.recv().await.unwrap().body, b"sensor1");

    handle.stop().await;
}

#[tokio::test]
async fn readings_on_own_queue_are_bounded_and_ordered() {
    let broker = Arc::new(MemoryBroker::new());
    let mut cfg = SensorConfig::named("boiler");
    cfg.frequency_hz = 200;
    cfg.min = 10.0;
    cfg.max = 12.0;
    cfg.step = 0.5;
    let generator = ValueGenerator::from_seed(cfg.bounds(), Some(3)).unwrap();

    let handle =
        SensorAgent::start_with_generator(cfg, generator, broker.clone(), CancellationToken::new())
            .await
            .unwrap();
    let mut data = broker.consume("boiler").await.unwrap();

    let mut prev = None;
    for _ in 0..20 {
        let d = timeout(Duration::from_secs(2), data.recv())
            .await
            .expect("reading in time")
            .unwrap();
        let r = decode_reading(&d.body).unwrap();
        assert_eq!(r.source, SourceId::new("boiler"));
        assert!((10.0..=12.0).contains(&r.value), "{} escaped bounds", r.value);
        if let Some((ts, value)) = prev {
            assert!(r.timestamp >= ts);
            let jump: f64 = r.value - value;
            assert!(jump.abs() <= 0.5 + 1e-9, "step {jump} larger than configured");
        }
        prev = Some((r.timestamp, r.value));
    }

    handle.stop().await;
}

#[tokio::test]
async fn stop_removes_queues_and_reports_stopped() {
    let broker = Arc::new(MemoryBroker::new());
    let handle = SensorAgent::start(
        SensorConfig::named("s"),
        broker.clone(),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(broker.queue_exists("s"));
    let mut state = handle.watch_state();
    let before = broker.queue_count();
    assert_eq!(before, 2);

    let mut data = broker.consume("s").await.unwrap();
    handle.stop().await;

    assert!(!broker.queue_exists("s"));
    assert_eq!(broker.queue_count(), 0);
    assert_eq!(*state.borrow_and_update(), AgentState::Stopped);
    // The consumer stream ends once buffered readings are drained.
    while data.recv().await.is_some() {}
}

#[tokio::test]
async fn parent_token_stops_the_loops() {
    let broker = Arc::new(MemoryBroker::new());
    let parent = CancellationToken::new();
    let mut cfg = SensorConfig::named("fast");
    cfg.frequency_hz = 500;
    let handle = SensorAgent::start(cfg, broker.clone(), parent.child_token())
        .await
        .unwrap();

    parent.cancel();
    timeout(Duration::from_secs(2), handle.stop())
        .await
        .expect("stop after cancel is prompt");
}

#[tokio::test]
async fn invalid_config_fails_before_touching_the_broker() {
    let broker = Arc::new(MemoryBroker::new());
    let mut cfg = SensorConfig::named("bad");
    cfg.min = 5.0;
    cfg.max = 5.0;

    let err = SensorAgent::start(cfg, broker.clone(), CancellationToken::new())
        .await
        .err()
        .expect("config rejected");
    assert!(matches!(
        err,
        FleetError::Config(ConfigError::InvalidBounds { .. })
    ));
    assert_eq!(broker.queue_count(), 0);

    let mut cfg = SensorConfig::named("");
    cfg.frequency_hz = 0;
    let err = SensorAgent::start(cfg, broker.clone(), CancellationToken::new())
        .await
        .err()
        .expect("config rejected");
    assert!(matches!(err, FleetError::Config(ConfigError::EmptyName)));
}

#[tokio::test]
async fn closed_broker_is_a_transport_error() {
    let broker = Arc::new(MemoryBroker::new());
    broker.close().await;
    let err = SensorAgent::start(
        SensorConfig::named("late"),
        broker.clone(),
        CancellationToken::new(),
    )
    .await
    .err()
    .expect("start fails");
    assert!(matches!(err, FleetError::Transport(_)));
}
