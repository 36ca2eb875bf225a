//! In-process channel broker for standalone mode.
//!
//! Uses a tokio broadcast channel as a single-partition topic log shared by
//! publishers and subscribers of one process. Ideal for local runs and
//! testing without an external broker.
//!
//! Subscribers only observe records published after they were created.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{
    BusError, DeliveryHandle, DeliveryReport, PollOutcome, Publisher, Record, Result, Subscriber,
};

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 1024;

/// In-memory broker shared by linked publishers and subscribers.
#[derive(Clone)]
pub struct ChannelBroker {
    sender: broadcast::Sender<Record>,
    next_offset: Arc<AtomicI64>,
}

impl Default for ChannelBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelBroker {
    /// Create a broker with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Create a broker retaining at most `capacity` unread records per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        info!(capacity, "Channel broker initialized");
        Self {
            sender,
            next_offset: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Create a publisher linked to this broker.
    pub fn publisher(&self) -> ChannelPublisher {
        ChannelPublisher {
            broker: self.clone(),
        }
    }

    /// Create a subscriber linked to this broker.
    pub fn subscriber(&self) -> ChannelSubscriber {
        ChannelSubscriber {
            receiver: self.sender.subscribe(),
            topics: None,
        }
    }
}

/// Publisher half of a [`ChannelBroker`].
pub struct ChannelPublisher {
    broker: ChannelBroker,
}

impl Publisher for ChannelPublisher {
    fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<DeliveryHandle> {
        let offset = self.broker.next_offset.fetch_add(1, Ordering::SeqCst);
        let record = Record {
            topic: topic.to_string(),
            partition: 0,
            offset,
            key: Some(key.as_bytes().to_vec()),
            payload: payload.to_vec(),
        };

        // The log accepts the record even with no live subscribers
        match self.broker.sender.send(record) {
            Ok(receivers) => debug!(topic, key, offset, receivers, "Published to channel"),
            Err(_) => debug!(topic, key, offset, "Published to channel (no receivers)"),
        }

        let report = DeliveryReport {
            partition: 0,
            offset,
        };
        Ok(Box::pin(async move { Ok(report) }))
    }
}

/// Subscriber half of a [`ChannelBroker`].
pub struct ChannelSubscriber {
    receiver: broadcast::Receiver<Record>,
    topics: Option<Vec<String>>,
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    fn subscribe(&mut self, topics: &[&str]) -> Result<()> {
        if topics.is_empty() {
            return Err(BusError::Subscribe("no topics given".to_string()));
        }
        self.topics = Some(topics.iter().map(|t| t.to_string()).collect());
        info!(topics = ?topics, "Subscribed to channel topics");
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> PollOutcome {
        let Some(topics) = self.topics.as_ref() else {
            return PollOutcome::Error(BusError::Subscribe("not subscribed".to_string()));
        };
        let deadline = Instant::now() + timeout;

        loop {
            match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                Err(_) => return PollOutcome::Empty,
                Ok(Ok(record)) => {
                    if topics.iter().any(|t| *t == record.topic) {
                        return PollOutcome::Record(record);
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    return PollOutcome::Error(BusError::Lagged(skipped));
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    tokio::time::sleep_until(deadline).await;
                    return PollOutcome::Error(BusError::Closed);
                }
            }
        }
    }
}
