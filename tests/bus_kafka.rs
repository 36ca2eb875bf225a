//! Kafka bus integration tests using testcontainers.
//!
//! Run with: cargo test --test bus_kafka --features kafka -- --nocapture
//!
//! Uses Redpanda, which speaks the Kafka protocol and starts in seconds.

#![cfg(feature = "kafka")]

use std::time::Duration;

use logpipe::bus::kafka::{KafkaBusConfig, KafkaPublisher, KafkaSubscriber};
use logpipe::bus::{PollOutcome, Publisher, Subscriber};
use logpipe::config::KafkaConfig;
use logpipe::event::{Event, Level};
use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    GenericImage, ImageExt,
};

/// Pick a host port in 29000-29999 that varies between test threads.
fn generate_test_port() -> u16 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos()
        .hash(&mut hasher);

    29000 + (hasher.finish() % 1000) as u16
}

/// Start Redpanda advertising the fixed host port.
///
/// Clients learn broker addresses from metadata, so the advertised listener
/// has to match the port mapped on the host.
async fn start_kafka() -> (testcontainers::ContainerAsync<GenericImage>, String) {
    let host_port = generate_test_port();
    let advertised_addr = format!("localhost:{}", host_port);

    // with_wait_for must come before with_mapped_port
    let image = GenericImage::new("redpandadata/redpanda", "v24.1.1")
        .with_wait_for(WaitFor::message_on_stderr("Successfully started Redpanda"));

    let container = image
        .with_mapped_port(host_port, ContainerPort::Tcp(9092))
        .with_cmd([
            "redpanda",
            "start",
            "--mode",
            "dev-container",
            "--smp",
            "1",
            "--memory",
            "512M",
            "--overprovisioned",
            "--kafka-addr",
            "0.0.0.0:9092",
            "--advertise-kafka-addr",
            &advertised_addr,
        ])
        .with_startup_timeout(Duration::from_secs(120))
        .start()
        .await
        .expect("Failed to start Redpanda container");

    tokio::time::sleep(Duration::from_secs(3)).await;

    println!("Kafka available at: {}", advertised_addr);
    (container, advertised_addr)
}

fn bus_config(bootstrap: &str, group_id: String) -> KafkaBusConfig {
    KafkaBusConfig::from_config(&KafkaConfig {
        bootstrap_servers: bootstrap.to_string(),
        group_id,
        ..Default::default()
    })
}

fn unique_topic(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

/// Poll until `count` records arrive or `within` elapses.
async fn collect(
    subscriber: &mut KafkaSubscriber,
    count: usize,
    within: Duration,
) -> Vec<logpipe::bus::Record> {
    let deadline = tokio::time::Instant::now() + within;
    let mut records = Vec::new();
    while records.len() < count && tokio::time::Instant::now() < deadline {
        match subscriber.poll(Duration::from_millis(100)).await {
            PollOutcome::Record(record) => records.push(record),
            PollOutcome::Empty => {}
            PollOutcome::Error(e) => println!("Broker error while polling: {}", e),
        }
    }
    records
}

#[tokio::test]
async fn test_kafka_publish_and_consume() {
    let (_container, bootstrap) = start_kafka().await;
    let topic = unique_topic("event-logs");

    let publisher = KafkaPublisher::connect(&bus_config(&bootstrap, String::new()))
        .expect("Failed to connect publisher");
    let mut subscriber =
        KafkaSubscriber::connect(&bus_config(&bootstrap, unique_topic("event-consumer-group")))
            .expect("Failed to connect subscriber");
    subscriber.subscribe(&[topic.as_str()]).expect("Failed to subscribe");

    let events: Vec<Event> = (0..3)
        .map(|i| {
            Event::new(
                1_700_000_000 + i,
                Level::Info,
                "user-service",
                format!("Запрос обработан #{}", i),
            )
        })
        .collect();

    for (i, event) in events.iter().enumerate() {
        let report = publisher
            .publish(&topic, &format!("event-{}", i), &event.encode())
            .expect("Failed to submit")
            .await
            .expect("Delivery failed");
        assert!(report.offset >= 0);
    }

    let records = collect(&mut subscriber, 3, Duration::from_secs(30)).await;
    assert_eq!(records.len(), 3, "Expected three records");

    // Single partition: broker order is publish order
    for (i, (record, event)) in records.iter().zip(&events).enumerate() {
        assert_eq!(record.topic, topic);
        assert_eq!(record.key_str(), Some(format!("event-{}", i).as_str()));
        assert_eq!(&Event::decode(&record.payload).unwrap(), event);
    }
}

#[tokio::test]
async fn test_kafka_poll_returns_empty_when_idle() {
    let (_container, bootstrap) = start_kafka().await;
    let topic = unique_topic("idle");

    let mut subscriber = KafkaSubscriber::connect(&bus_config(&bootstrap, unique_topic("idle-group")))
        .expect("Failed to connect subscriber");
    subscriber.subscribe(&[topic.as_str()]).expect("Failed to subscribe");

    let start = std::time::Instant::now();
    let outcome = subscriber.poll(Duration::from_millis(200)).await;

    assert!(!matches!(outcome, PollOutcome::Record(_)));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_kafka_subscriber_requires_group() {
    let result = KafkaSubscriber::connect(&bus_config("localhost:9092", String::new()));
    assert!(result.is_err());
}
