//! Broker client capability set.
//!
//! This module contains:
//! - `Publisher` trait: non-blocking submission with a per-message delivery handle
//! - `Subscriber` trait: topic subscription and bounded-wait polling
//! - Bus error and record types
//! - Implementations: Kafka, in-process channel broker, Mock
//!
//! Connecting is each backend's constructor; closing is `Drop`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::config::{MessagingConfig, MessagingType};

// Implementation modules
pub mod channel;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod mock;

// Re-exports
pub use channel::{ChannelBroker, ChannelPublisher, ChannelSubscriber};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaBusConfig, KafkaPublisher, KafkaSubscriber};
pub use mock::{MockPublisher, MockSubscriber};

// ============================================================================
// Traits
// ============================================================================

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Consumer lagged, {0} records skipped")]
    Lagged(u64),

    #[error("Broker closed")]
    Closed,

    #[error("{0} support requires the '{1}' feature")]
    NotEnabled(&'static str, &'static str),

    #[error("{0} broker only exists inside one process; use logpipe-standalone")]
    ProcessLocal(&'static str),
}

/// Broker confirmation that a published message was durably accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub partition: i32,
    pub offset: i64,
}

/// Resolves once the broker acknowledges (or rejects) one published message.
pub type DeliveryHandle = BoxFuture<'static, Result<DeliveryReport>>;

/// A record received from a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Opaque per-message identifier, kept only for traceability.
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn key_str(&self) -> Option<&str> {
        self.key.as_deref().and_then(|k| std::str::from_utf8(k).ok())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

/// Outcome of a single bounded-wait poll.
#[derive(Debug)]
pub enum PollOutcome {
    /// Nothing arrived within the wait.
    Empty,
    Record(Record),
    /// A broker-level error surfaced instead of a record.
    Error(BusError),
}

/// Producer-side broker client.
pub trait Publisher: Send + Sync {
    /// Submit one message for asynchronous delivery.
    ///
    /// Never blocks. A full internal queue or any other submission failure
    /// is returned immediately; nothing is retried.
    fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<DeliveryHandle>;
}

/// Consumer-side broker client.
#[async_trait]
pub trait Subscriber: Send {
    /// Subscribe to the given topics. Called once before polling.
    fn subscribe(&mut self, topics: &[&str]) -> Result<()>;

    /// Wait at most `timeout` for the next record.
    async fn poll(&mut self, timeout: Duration) -> PollOutcome;
}

// ============================================================================
// Factory
// ============================================================================

/// Connect a publisher for the configured backend.
///
/// The channel backend is rejected: its records never leave the process, so
/// channel publishers and subscribers must come from one shared
/// [`ChannelBroker`].
pub fn init_publisher(config: &MessagingConfig) -> Result<Box<dyn Publisher>> {
    match config.messaging_type {
        MessagingType::Kafka => {
            #[cfg(feature = "kafka")]
            {
                let kafka_config = KafkaBusConfig::from_config(&config.kafka);
                let publisher = KafkaPublisher::connect(&kafka_config)?;
                tracing::info!(messaging_type = "kafka", "Publisher initialized");
                Ok(Box::new(publisher))
            }

            #[cfg(not(feature = "kafka"))]
            {
                Err(BusError::NotEnabled("Kafka", "kafka"))
            }
        }
        MessagingType::Channel => Err(BusError::ProcessLocal("Channel")),
    }
}

/// Connect a subscriber for the configured backend.
pub fn init_subscriber(config: &MessagingConfig) -> Result<Box<dyn Subscriber>> {
    match config.messaging_type {
        MessagingType::Kafka => {
            #[cfg(feature = "kafka")]
            {
                let kafka_config = KafkaBusConfig::from_config(&config.kafka);
                let subscriber = KafkaSubscriber::connect(&kafka_config)?;
                tracing::info!(messaging_type = "kafka", "Subscriber initialized");
                Ok(Box::new(subscriber))
            }

            #[cfg(not(feature = "kafka"))]
            {
                Err(BusError::NotEnabled("Kafka", "kafka"))
            }
        }
        MessagingType::Channel => Err(BusError::ProcessLocal("Channel")),
    }
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<DeliveryHandle> {
        (**self).publish(topic, key, payload)
    }
}

#[async_trait]
impl<S: Subscriber + ?Sized> Subscriber for Box<S> {
    fn subscribe(&mut self, topics: &[&str]) -> Result<()> {
        (**self).subscribe(topics)
    }

    async fn poll(&mut self, timeout: Duration) -> PollOutcome {
        (**self).poll(timeout).await
    }
}
