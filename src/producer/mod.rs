//! Producer loop.
//!
//! Synthesizes one event per cadence tick and submits it for asynchronous
//! publish. Acknowledgments are matched back to their delivery records as
//! they arrive, interleaved with ticks and the shutdown signal through a
//! single `select!`.
//!
//! ## State machine
//! ```text
//! Running --(interrupt)--> Draining --(all acked | drain bound)--> Stopped
//! ```
//!
//! Submission is at-most-once: a failed submission is logged and that
//! tick's event is dropped. Delivery failures are logged, never retried.

mod generator;
mod tracker;

pub use generator::{messages_for, EventGenerator, SERVICES};
pub use tracker::{DeliveryRecord, DeliveryTracker};

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::bus::{self, DeliveryReport, Publisher};
use crate::config::ProducerConfig;
use crate::shutdown::Shutdown;

/// Producer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Running,
    Draining,
    Stopped,
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerReport {
    /// Events accepted for delivery.
    pub published: u64,
    pub delivered: u64,
    pub delivery_failures: u64,
    /// Ticks whose event was dropped because submission failed.
    pub submit_failures: u64,
    /// Keys of records still unacknowledged at the drain bound, in
    /// sequence order.
    pub abandoned: Vec<String>,
}

/// Acknowledgment for one sequence number.
struct Ack {
    seq: u64,
    result: bus::Result<DeliveryReport>,
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Publishes synthetic events on a fixed cadence with delivery tracking.
pub struct Producer<P: Publisher> {
    publisher: P,
    topic: String,
    interval: Duration,
    drain_timeout: Duration,
    generator: EventGenerator,
    tracker: DeliveryTracker,
    next_seq: u64,
    state: ProducerState,
    report: ProducerReport,
    acks_tx: mpsc::UnboundedSender<Ack>,
    acks_rx: mpsc::UnboundedReceiver<Ack>,
    clock: fn() -> i64,
}

impl<P: Publisher> Producer<P> {
    pub fn new(publisher: P, config: &ProducerConfig) -> Self {
        let (acks_tx, acks_rx) = mpsc::unbounded_channel();
        Self {
            publisher,
            topic: config.topic.clone(),
            interval: config.interval(),
            drain_timeout: config.drain_timeout(),
            generator: EventGenerator::new(config.seed),
            tracker: DeliveryTracker::new(),
            next_seq: 0,
            state: ProducerState::Running,
            report: ProducerReport::default(),
            acks_tx,
            acks_rx,
            clock: unix_now,
        }
    }

    /// Replace the timestamp source (seconds since epoch).
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    /// Run until shutdown, drain, then release the publisher.
    pub async fn run(mut self, mut shutdown: Shutdown) -> ProducerReport {
        info!(
            topic = %self.topic,
            interval_ms = self.interval.as_millis() as u64,
            "Producer started. Press Ctrl+C to stop."
        );

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.state == ProducerState::Running {
            tokio::select! {
                _ = ticker.tick() => self.tick(),
                Some(ack) = self.acks_rx.recv() => self.settle(ack),
                _ = shutdown.recv() => self.transition(ProducerState::Draining),
            }
        }

        self.drain().await;
        self.transition(ProducerState::Stopped);

        let Self {
            publisher, report, ..
        } = self;
        drop(publisher);

        info!(
            published = report.published,
            delivered = report.delivered,
            delivery_failures = report.delivery_failures,
            submit_failures = report.submit_failures,
            abandoned = report.abandoned.len(),
            "Producer stopped"
        );
        report
    }

    fn transition(&mut self, next: ProducerState) {
        debug!(from = ?self.state, to = ?next, "Producer state change");
        self.state = next;
    }

    /// Synthesize and submit one event.
    fn tick(&mut self) {
        let event = self.generator.next_event((self.clock)());
        let key = format!("event-{}", self.next_seq);

        let handle = match self.publisher.publish(&self.topic, &key, &event.encode()) {
            Ok(handle) => handle,
            Err(e) => {
                self.report.submit_failures += 1;
                error!(key = %key, error = %e, "Failed to submit event, dropping it");
                return;
            }
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.report.published += 1;

        info!(
            key = %key,
            level = %event.level,
            service = %event.service,
            message = %event.message,
            "Published event"
        );

        self.tracker.insert(
            seq,
            DeliveryRecord {
                key,
                level: event.level,
                service: event.service,
                submitted_at: Instant::now(),
            },
        );

        let acks = self.acks_tx.clone();
        tokio::spawn(async move {
            let result = handle.await;
            // Receiver is gone once the drain bound passed
            let _ = acks.send(Ack { seq, result });
        });
    }

    /// Match an acknowledgment to its delivery record.
    fn settle(&mut self, ack: Ack) {
        let Some(record) = self.tracker.settle(ack.seq) else {
            warn!(seq = ack.seq, "Acknowledgment for unknown delivery record");
            return;
        };

        match ack.result {
            Ok(report) => {
                self.report.delivered += 1;
                debug!(
                    key = %record.key,
                    partition = report.partition,
                    offset = report.offset,
                    latency_ms = record.age().as_millis() as u64,
                    "Delivered"
                );
            }
            Err(e) => {
                self.report.delivery_failures += 1;
                error!(
                    key = %record.key,
                    level = %record.level,
                    service = %record.service,
                    error = %e,
                    "Delivery failed"
                );
            }
        }
    }

    /// Wait for outstanding acknowledgments up to the drain bound.
    async fn drain(&mut self) {
        let deadline = Instant::now() + self.drain_timeout;
        info!(
            outstanding = self.tracker.len(),
            drain_timeout_ms = self.drain_timeout.as_millis() as u64,
            "Draining outstanding deliveries"
        );

        while !self.tracker.is_empty() {
            tokio::select! {
                Some(ack) = self.acks_rx.recv() => self.settle(ack),
                _ = sleep_until(deadline) => break,
            }
        }

        for (seq, record) in self.tracker.abandon_all() {
            warn!(
                seq,
                key = %record.key,
                age_ms = record.age().as_millis() as u64,
                "Abandoning unacknowledged delivery"
            );
            self.report.abandoned.push(record.key);
        }
    }
}
