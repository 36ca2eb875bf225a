//! Kafka broker clients.
//!
//! `KafkaPublisher` wraps a `FutureProducer`: submission enqueues into
//! librdkafka's internal queue and returns at once, the delivery future
//! resolves when the broker acknowledges.
//! `KafkaSubscriber` wraps a `StreamConsumer` polled with a bounded wait.
//! Offsets are auto-committed, so a record is consumed whether or not it
//! decodes.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use tracing::info;

use super::{
    BusError, DeliveryHandle, DeliveryReport, PollOutcome, Publisher, Record, Result, Subscriber,
};
use crate::config::KafkaConfig;

/// Configuration for Kafka connection.
#[derive(Clone, Debug)]
pub struct KafkaBusConfig {
    /// Kafka bootstrap servers (comma-separated).
    pub bootstrap_servers: String,
    /// Client identifier reported to the broker.
    pub client_id: Option<String>,
    /// Consumer group ID (required for subscribing).
    pub group_id: Option<String>,
    /// Producer acknowledgment level (`all`, `1`, `0`).
    pub acks: String,
    /// Where a new consumer group starts (`earliest`, `latest`).
    pub auto_offset_reset: String,
    /// SASL username (optional, for authenticated clusters).
    pub sasl_username: Option<String>,
    /// SASL password (optional, for authenticated clusters).
    pub sasl_password: Option<String>,
    /// SASL mechanism (PLAIN, SCRAM-SHA-256, SCRAM-SHA-512).
    pub sasl_mechanism: Option<String>,
    /// Security protocol (PLAINTEXT, SSL, SASL_PLAINTEXT, SASL_SSL).
    pub security_protocol: Option<String>,
    /// SSL CA certificate path (for SSL connections).
    pub ssl_ca_location: Option<String>,
}

impl KafkaBusConfig {
    /// Build from the application's messaging section.
    ///
    /// Empty client or group ids are left unset. SASL applies only when
    /// username, password and mechanism are all present, and then defaults
    /// the protocol to `SASL_SSL`.
    pub fn from_config(config: &KafkaConfig) -> Self {
        let sasl = match (
            &config.sasl_username,
            &config.sasl_password,
            &config.sasl_mechanism,
        ) {
            (Some(user), Some(pass), Some(mechanism)) => {
                Some((user.clone(), pass.clone(), mechanism.clone()))
            }
            _ => None,
        };

        let security_protocol = config
            .security_protocol
            .clone()
            .or_else(|| sasl.as_ref().map(|_| "SASL_SSL".to_string()));
        let (sasl_username, sasl_password, sasl_mechanism) = match sasl {
            Some((user, pass, mechanism)) => (Some(user), Some(pass), Some(mechanism)),
            None => (None, None, None),
        };

        Self {
            bootstrap_servers: config.bootstrap_servers.clone(),
            client_id: non_empty(&config.client_id),
            group_id: non_empty(&config.group_id),
            acks: config.acks.clone(),
            auto_offset_reset: config.auto_offset_reset.clone(),
            sasl_username,
            sasl_password,
            sasl_mechanism,
            security_protocol,
            ssl_ca_location: config.ssl_ca_location.clone(),
        }
    }

    /// Build a ClientConfig for producers.
    fn build_producer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", &self.bootstrap_servers);
        config.set("acks", &self.acks);

        if let Some(ref client_id) = self.client_id {
            config.set("client.id", client_id);
        }

        self.apply_security_config(&mut config);
        config
    }

    /// Build a ClientConfig for consumers.
    fn build_consumer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", &self.bootstrap_servers);
        config.set("enable.auto.commit", "true");
        config.set("auto.offset.reset", &self.auto_offset_reset);

        if let Some(ref group_id) = self.group_id {
            config.set("group.id", group_id);
        }

        self.apply_security_config(&mut config);
        config
    }

    /// Apply security settings to a ClientConfig.
    fn apply_security_config(&self, config: &mut ClientConfig) {
        if let Some(ref protocol) = self.security_protocol {
            config.set("security.protocol", protocol);
        }

        if let Some(ref mechanism) = self.sasl_mechanism {
            config.set("sasl.mechanism", mechanism);
        }

        if let Some(ref username) = self.sasl_username {
            config.set("sasl.username", username);
        }

        if let Some(ref password) = self.sasl_password {
            config.set("sasl.password", password);
        }

        if let Some(ref ca_location) = self.ssl_ca_location {
            config.set("ssl.ca.location", ca_location);
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Kafka publisher. Dropping it releases the client.
pub struct KafkaPublisher {
    producer: FutureProducer,
}

impl KafkaPublisher {
    /// Create the producer client.
    pub fn connect(config: &KafkaBusConfig) -> Result<Self> {
        let producer: FutureProducer = config
            .build_producer_config()
            .create()
            .map_err(|e| BusError::Connection(format!("Failed to create Kafka producer: {}", e)))?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            client_id = ?config.client_id,
            acks = %config.acks,
            "Connected to Kafka"
        );

        Ok(Self { producer })
    }
}

impl Publisher for KafkaPublisher {
    fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<DeliveryHandle> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(e, _)| BusError::Publish(e.to_string()))?;

        Ok(Box::pin(async move {
            match delivery.await {
                Ok(Ok((partition, offset))) => Ok(DeliveryReport { partition, offset }),
                Ok(Err((e, _))) => Err(BusError::Delivery(e.to_string())),
                Err(_) => Err(BusError::Delivery(
                    "delivery report canceled".to_string(),
                )),
            }
        }))
    }
}

/// Kafka subscriber. Dropping it leaves the group and releases the client.
pub struct KafkaSubscriber {
    consumer: StreamConsumer,
}

impl KafkaSubscriber {
    /// Create the consumer client.
    pub fn connect(config: &KafkaBusConfig) -> Result<Self> {
        if config.group_id.is_none() {
            return Err(BusError::Connection(
                "No consumer group configured (messaging.kafka.group_id)".to_string(),
            ));
        }

        let consumer: StreamConsumer = config
            .build_consumer_config()
            .create()
            .map_err(|e| BusError::Connection(format!("Failed to create Kafka consumer: {}", e)))?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            group_id = ?config.group_id,
            "Connected to Kafka"
        );

        Ok(Self { consumer })
    }

    fn to_record<M: Message>(message: &M) -> Record {
        Record {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(|k| k.to_vec()),
            payload: message.payload().unwrap_or_default().to_vec(),
        }
    }
}

#[async_trait]
impl Subscriber for KafkaSubscriber {
    fn subscribe(&mut self, topics: &[&str]) -> Result<()> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| BusError::Subscribe(format!("Failed to subscribe to topics: {}", e)))?;

        info!(topics = ?topics, "Subscribed to Kafka topics");
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> PollOutcome {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => PollOutcome::Empty,
            Ok(Ok(message)) => PollOutcome::Record(Self::to_record(&message)),
            Ok(Err(e)) => PollOutcome::Error(BusError::Broker(e.to_string())),
        }
    }
}
