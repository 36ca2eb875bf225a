//! End-to-end producer → broker → consumer tests over the channel broker.
//!
//! Run with: cargo test --test pipeline

use std::time::Duration;

use logpipe::bus::{ChannelBroker, PollOutcome, Publisher, Subscriber};
use logpipe::config::{ConsumerConfig, ProducerConfig};
use logpipe::consumer::{Consumer, EventSink, FileSink};
use logpipe::event::Event;
use logpipe::producer::Producer;
use logpipe::shutdown;

const TIMESTAMP: i64 = 1_700_000_000;

/// Collect every record already buffered for `subscriber`.
async fn drain_records<S: Subscriber>(subscriber: &mut S) -> Vec<Vec<u8>> {
    let mut payloads = Vec::new();
    while let PollOutcome::Record(record) = subscriber.poll(Duration::from_millis(10)).await {
        payloads.push(record.payload);
    }
    payloads
}

#[tokio::test(start_paused = true)]
async fn test_produced_events_land_in_event_log() {
    let dir = tempfile::tempdir().unwrap();
    let consumer_config = ConsumerConfig {
        log_path: dir.path().join("events.log"),
        ..Default::default()
    };
    let producer_config = ProducerConfig {
        seed: Some(7),
        ..Default::default()
    };

    let broker = ChannelBroker::new();
    let mut observer = broker.subscriber();
    observer.subscribe(&[producer_config.topic.as_str()]).unwrap();

    let file = FileSink::open(&consumer_config.log_path).unwrap();
    let sinks: Vec<Box<dyn EventSink>> = vec![Box::new(file)];
    let consumer = Consumer::start(broker.subscriber(), sinks, &consumer_config).unwrap();
    let producer = Producer::new(broker.publisher(), &producer_config).with_clock(|| TIMESTAMP);

    let (trigger, shutdown) = shutdown::channel();
    let producer_task = tokio::spawn(producer.run(shutdown.clone()));
    let consumer_task = tokio::spawn(consumer.run(shutdown));

    tokio::time::sleep(Duration::from_millis(7000)).await;
    trigger.trigger();

    let produced = producer_task.await.unwrap();
    let consumed = consumer_task.await.unwrap();

    assert_eq!(produced.published, 3);
    assert_eq!(produced.delivered, 3);
    assert_eq!(consumed.persisted, 3);
    assert_eq!(consumed.decode_errors, 0);

    let expected: String = drain_records(&mut observer)
        .await
        .iter()
        .map(|payload| Event::decode(payload).unwrap().format_line())
        .collect();
    let written = std::fs::read_to_string(&consumer_config.log_path).unwrap();
    assert_eq!(written, expected);
    assert_eq!(written.lines().count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_record_between_valid_events() {
    let dir = tempfile::tempdir().unwrap();
    let consumer_config = ConsumerConfig {
        log_path: dir.path().join("events.log"),
        ..Default::default()
    };

    let broker = ChannelBroker::new();
    let file = FileSink::open(&consumer_config.log_path).unwrap();
    let sinks: Vec<Box<dyn EventSink>> = vec![Box::new(file)];
    let consumer = Consumer::start(broker.subscriber(), sinks, &consumer_config).unwrap();

    let (trigger, shutdown) = shutdown::channel();
    let consumer_task = tokio::spawn(consumer.run(shutdown));

    let publisher = broker.publisher();
    let first = Event::new(TIMESTAMP, logpipe::event::Level::Info, "user-service", "first");
    let last = Event::new(TIMESTAMP, logpipe::event::Level::Error, "order-service", "last");
    let encoded = first.encode();

    for (key, payload) in [
        ("event-0", encoded.clone()),
        ("event-1", encoded[..encoded.len() / 2].to_vec()),
        ("event-2", last.encode()),
    ] {
        publisher
            .publish(&consumer_config.topic, key, &payload)
            .unwrap()
            .await
            .unwrap();
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    trigger.trigger();
    let report = consumer_task.await.unwrap();

    assert_eq!(report.received, 3);
    assert_eq!(report.decode_errors, 1);
    assert_eq!(report.persisted, 2);
    assert_eq!(
        std::fs::read_to_string(&consumer_config.log_path).unwrap(),
        format!("{}{}", first.format_line(), last.format_line())
    );
}
