//! Mock broker clients for testing.
//!
//! `MockPublisher` records submissions and lets tests decide when (and how)
//! each delivery acknowledges. `MockSubscriber` replays scripted poll outcomes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{
    BusError, DeliveryHandle, DeliveryReport, PollOutcome, Publisher, Record, Result, Subscriber,
};

/// How the mock resolves delivery handles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckMode {
    /// Acknowledge successfully at submission.
    #[default]
    Immediate,
    /// Hold every acknowledgment until the test releases it.
    Manual,
}

#[derive(Default)]
struct MockPublisherState {
    published: Vec<Record>,
    pending: HashMap<String, oneshot::Sender<Result<DeliveryReport>>>,
    fail_on_publish: bool,
    ack_mode: AckMode,
}

/// Mock publisher for testing. Clones share state.
#[derive(Clone, Default)]
pub struct MockPublisher {
    state: Arc<Mutex<MockPublisherState>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ack_mode(ack_mode: AckMode) -> Self {
        let publisher = Self::new();
        publisher.lock().ack_mode = ack_mode;
        publisher
    }

    fn lock(&self) -> MutexGuard<'_, MockPublisherState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_fail_on_publish(&self, fail: bool) {
        self.lock().fail_on_publish = fail;
    }

    pub fn published_count(&self) -> usize {
        self.lock().published.len()
    }

    pub fn published(&self) -> Vec<Record> {
        self.lock().published.clone()
    }

    /// Keys whose acknowledgment is still held.
    pub fn pending_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().pending.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Release a held acknowledgment as delivered. Returns false if unknown.
    pub fn ack(&self, key: &str) -> bool {
        let mut state = self.lock();
        let Some(offset) = state
            .published
            .iter()
            .position(|r| r.key_str() == Some(key))
        else {
            return false;
        };
        match state.pending.remove(key) {
            Some(tx) => tx
                .send(Ok(DeliveryReport {
                    partition: 0,
                    offset: offset as i64,
                }))
                .is_ok(),
            None => false,
        }
    }

    /// Release a held acknowledgment as a delivery failure.
    pub fn fail(&self, key: &str, reason: &str) -> bool {
        match self.lock().pending.remove(key) {
            Some(tx) => tx.send(Err(BusError::Delivery(reason.to_string()))).is_ok(),
            None => false,
        }
    }
}

impl Publisher for MockPublisher {
    fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<DeliveryHandle> {
        let mut state = self.lock();
        if state.fail_on_publish {
            return Err(BusError::Publish("Mock publish failure".to_string()));
        }

        let offset = state.published.len() as i64;
        state.published.push(Record {
            topic: topic.to_string(),
            partition: 0,
            offset,
            key: Some(key.as_bytes().to_vec()),
            payload: payload.to_vec(),
        });

        match state.ack_mode {
            AckMode::Immediate => {
                let report = DeliveryReport {
                    partition: 0,
                    offset,
                };
                Ok(Box::pin(async move { Ok(report) }))
            }
            AckMode::Manual => {
                let (tx, rx) = oneshot::channel();
                state.pending.insert(key.to_string(), tx);
                Ok(Box::pin(async move {
                    rx.await
                        .unwrap_or_else(|_| Err(BusError::Delivery("acknowledgment dropped".to_string())))
                }))
            }
        }
    }
}

/// Mock subscriber replaying scripted poll outcomes.
///
/// Once the script is exhausted every poll waits out its timeout and
/// reports `Empty`.
#[derive(Default)]
pub struct MockSubscriber {
    script: VecDeque<PollOutcome>,
    subscribed: Vec<String>,
    fail_on_subscribe: bool,
    polls: usize,
}

impl MockSubscriber {
    pub fn new(script: impl IntoIterator<Item = PollOutcome>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn failing_subscribe() -> Self {
        Self {
            fail_on_subscribe: true,
            ..Default::default()
        }
    }

    pub fn subscribed(&self) -> &[String] {
        &self.subscribed
    }

    pub fn polls(&self) -> usize {
        self.polls
    }
}

#[async_trait]
impl Subscriber for MockSubscriber {
    fn subscribe(&mut self, topics: &[&str]) -> Result<()> {
        if self.fail_on_subscribe {
            return Err(BusError::Subscribe("Mock subscribe failure".to_string()));
        }
        self.subscribed = topics.iter().map(|t| t.to_string()).collect();
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> PollOutcome {
        self.polls += 1;
        match self.script.pop_front() {
            Some(outcome) => outcome,
            None => {
                tokio::time::sleep(timeout).await;
                PollOutcome::Empty
            }
        }
    }
}
