// tests/fleet.rs
use sensor_fleet::broker::MemoryBroker;
use sensor_fleet::{
    ConfigError, EventAggregator, Fleet, FleetConfig, FleetError, Reading, SensorConfig, SourceId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

#[tokio::test]
async fn invalid_fleet_config_is_rejected_before_startup() {
    let broker = Arc::new(MemoryBroker::new());
    let cfg = FleetConfig {
        sensors: vec![SensorConfig::named("twin"), SensorConfig::named("twin")],
        ..FleetConfig::default()
    };

    let err = Fleet::start_on(&cfg, broker.clone())
        .await
        .err()
        .expect("duplicate names rejected");
    assert!(matches!(
        err,
        FleetError::Config(ConfigError::DuplicateName(ref n)) if n == "twin"
    ));
    assert_eq!(broker.queue_count(), 0);
}

#[tokio::test]
async fn stopping_a_fleet_ends_every_ingestor() {
    let mut cfg = FleetConfig {
        sensors: vec![SensorConfig::named("a"), SensorConfig::named("b")],
        ..FleetConfig::default()
    };
    for s in &mut cfg.sensors {
        s.frequency_hz = 100;
    }
    let broker = Arc::new(MemoryBroker::new());
    let fleet = Fleet::start_on(&cfg, broker.clone()).await.unwrap();
    assert_eq!(
        fleet.sensor_ids(),
        vec![SourceId::new("a"), SourceId::new("b")]
    );

    let reg = fleet.registry();
    timeout(Duration::from_secs(5), async {
        while !(reg.is_active(&SourceId::new("a")) && reg.is_active(&SourceId::new("b"))) {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("both sources active");

    let token = fleet.shutdown_token();
    let summaries = timeout(Duration::from_secs(5), fleet.stop())
        .await
        .expect("fleet stops promptly");
    assert!(token.is_cancelled());
    assert_eq!(
        summaries.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>(),
        vec![SourceId::new("a"), SourceId::new("b")]
    );
    assert_eq!(broker.queue_count(), 0);
}

#[tokio::test]
async fn names_differing_only_by_whitespace_cannot_share_a_queue() {
    let broker = Arc::new(MemoryBroker::new());
    let cfg = FleetConfig {
        sensors: vec![SensorConfig::named("a"), SensorConfig::named("a ")],
        ..FleetConfig::default()
    };
    assert_eq!(
        cfg.validate(),
        Err(ConfigError::PaddedName("a ".into()))
    );

    let err = Fleet::start_on(&cfg, broker.clone())
        .await
        .err()
        .expect("padded name rejected");
    assert!(matches!(
        err,
        FleetError::Config(ConfigError::PaddedName(_))
    ));
    assert_eq!(broker.queue_count(), 0);
}

#[tokio::test]
async fn handlers_registered_before_start_see_every_reading() {
    let mut sensor = SensorConfig::named("early");
    sensor.frequency_hz = 200;
    let cfg = FleetConfig {
        sensors: vec![sensor],
        ..FleetConfig::default()
    };
    let agg: Arc<EventAggregator<Reading>> = Arc::new(EventAggregator::new());
    let mut events = agg.subscribe_channel("reading_early");

    let fleet = Fleet::start_with(&cfg, Arc::new(MemoryBroker::new()), agg.clone())
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&fleet.aggregator(), &agg));
    for _ in 0..5 {
        timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("reading in time")
            .expect("channel open");
    }

    let summaries = fleet.stop().await;
    let mut seen = 5;
    while events.try_recv().is_ok() {
        seen += 1;
    }
    // Nothing was ingested before the handler existed.
    assert_eq!(summaries[0].1.published, seen);
}
