//! logpipe-consumer: persisting log event subscriber
//!
//! Subscribes to the event topic, decodes each record and writes it to
//! stdout and an append-only log file. Malformed records and broker errors
//! are logged and skipped. Runs until Ctrl+C.
//!
//! ## Configuration
//! - LOGPIPE_CONFIG: Path to a YAML config file (optional)
//! - LOGPIPE__CONSUMER__LOG_PATH: Event log file (default: events.log)
//! - LOGPIPE__CONSUMER__POLL_TIMEOUT_MS: Bounded wait per poll (default: 100)
//! - LOGPIPE__MESSAGING__KAFKA__GROUP_ID: Consumer group (default: event-consumer-group)
//! - LOGPIPE_LOG: Log filter (default: info)
//!
//! Startup failures (connect, subscribe, open log file) exit non-zero.

use logpipe::bus::init_subscriber;
use logpipe::config::Config;
use logpipe::consumer::{ConsoleSink, Consumer, ConsumerError, EventSink, FileSink};
use logpipe::shutdown::{self, listen_for_interrupt};
use logpipe::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    let subscriber = init_subscriber(&config.messaging)?;

    let log_path = &config.consumer.log_path;
    let file = FileSink::open(log_path).map_err(|source| ConsumerError::Sink {
        path: log_path.clone(),
        source,
    })?;
    let sinks: Vec<Box<dyn EventSink>> = vec![Box::new(ConsoleSink), Box::new(file)];

    let consumer = Consumer::start(subscriber, sinks, &config.consumer)?;

    let (trigger, shutdown) = shutdown::channel();
    listen_for_interrupt(trigger);

    consumer.run(shutdown).await;

    Ok(())
}
