//! Consumer loop.
//!
//! Subscribes once, then polls with a bounded wait until shutdown. Every
//! record is decoded and, on success, written to each sink in delivery
//! order. Decode failures and broker errors are logged and skipped; the
//! record's offset still advances.
//!
//! Subscriber and sinks are owned by the loop and released when it ends,
//! on every exit path.

mod sink;

pub use sink::{ConsoleSink, EventSink, FileSink};

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::bus::{BusError, PollOutcome, Record, Subscriber};
use crate::config::ConsumerConfig;
use crate::event::Event;
use crate::shutdown::Shutdown;

/// Fatal consumer startup errors.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("Failed to subscribe: {0}")]
    Subscribe(#[source] BusError),

    #[error("Failed to open event log {path}: {source}")]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Consumer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Running,
    Stopped,
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Records taken from the broker, decodable or not.
    pub received: u64,
    /// Events written to at least one sink.
    pub persisted: u64,
    pub decode_errors: u64,
    pub broker_errors: u64,
    /// Individual sink writes that failed.
    pub sink_errors: u64,
}

/// Polls, decodes and persists events from one topic.
pub struct Consumer<S: Subscriber> {
    subscriber: S,
    sinks: Vec<Box<dyn EventSink>>,
    topic: String,
    poll_timeout: Duration,
    state: ConsumerState,
    report: ConsumerReport,
}

impl<S: Subscriber> Consumer<S> {
    /// Subscribe to the configured topic and enter `Running`.
    pub fn start(
        mut subscriber: S,
        sinks: Vec<Box<dyn EventSink>>,
        config: &ConsumerConfig,
    ) -> Result<Self, ConsumerError> {
        subscriber
            .subscribe(&[config.topic.as_str()])
            .map_err(ConsumerError::Subscribe)?;

        info!(
            topic = %config.topic,
            sinks = ?sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "Consumer subscribed"
        );

        Ok(Self {
            subscriber,
            sinks,
            topic: config.topic.clone(),
            poll_timeout: config.poll_timeout(),
            state: ConsumerState::Running,
            report: ConsumerReport::default(),
        })
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Poll until shutdown, then release the subscriber and sinks.
    ///
    /// Shutdown is checked before every poll; a poll already in flight
    /// completes and its record is persisted first.
    pub async fn run(mut self, shutdown: Shutdown) -> ConsumerReport {
        info!(
            topic = %self.topic,
            poll_timeout_ms = self.poll_timeout.as_millis() as u64,
            "Consumer started. Press Ctrl+C to stop."
        );

        while !shutdown.is_triggered() {
            let outcome = self.subscriber.poll(self.poll_timeout).await;
            self.handle(outcome);
        }

        self.state = ConsumerState::Stopped;
        self.close_sinks();

        let Self {
            subscriber, report, ..
        } = self;
        drop(subscriber);

        info!(
            received = report.received,
            persisted = report.persisted,
            decode_errors = report.decode_errors,
            broker_errors = report.broker_errors,
            sink_errors = report.sink_errors,
            "Consumer stopped"
        );
        report
    }

    fn handle(&mut self, outcome: PollOutcome) {
        match outcome {
            PollOutcome::Empty => {}
            PollOutcome::Record(record) => self.persist(record),
            PollOutcome::Error(e) => {
                self.report.broker_errors += 1;
                error!(error = %e, "Broker error");
            }
        }
    }

    /// Decode one record and write it to every sink.
    fn persist(&mut self, record: Record) {
        self.report.received += 1;

        let event = match Event::decode(&record.payload) {
            Ok(event) => event,
            Err(e) => {
                self.report.decode_errors += 1;
                error!(
                    record = %record,
                    key = ?record.key_str(),
                    error = %e,
                    "Failed to decode event, skipping"
                );
                return;
            }
        };

        let line = event.format_line();
        let mut written = 0;
        for sink in self.sinks.iter_mut() {
            match sink.write_line(&line) {
                Ok(()) => written += 1,
                Err(e) => {
                    self.report.sink_errors += 1;
                    error!(sink = sink.name(), error = %e, "Failed to write event");
                }
            }
        }

        if written == 0 {
            error!(record = %record, "Event reached no sink");
            return;
        }

        self.report.persisted += 1;
        debug!(record = %record, sinks = written, "Persisted event");
    }

    fn close_sinks(&mut self) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.close() {
                error!(sink = sink.name(), error = %e, "Failed to close sink");
            }
        }
    }
}
