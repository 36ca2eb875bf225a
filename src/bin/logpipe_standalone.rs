//! logpipe-standalone: producer and consumer in one process
//!
//! Runs both loops over the in-process channel broker, for local runs
//! without Kafka. Both loops observe the same Ctrl+C; the producer drains
//! its deliveries while the consumer stops polling.
//!
//! ## Configuration
//! Same variables as logpipe-producer and logpipe-consumer; the messaging
//! section is ignored.

use tracing::info;

use logpipe::bus::ChannelBroker;
use logpipe::config::Config;
use logpipe::consumer::{ConsoleSink, Consumer, ConsumerError, EventSink, FileSink};
use logpipe::producer::Producer;
use logpipe::shutdown::{self, listen_for_interrupt};
use logpipe::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    let broker = ChannelBroker::new();

    let log_path = &config.consumer.log_path;
    let file = FileSink::open(log_path).map_err(|source| ConsumerError::Sink {
        path: log_path.clone(),
        source,
    })?;
    let sinks: Vec<Box<dyn EventSink>> = vec![Box::new(ConsoleSink), Box::new(file)];
    let consumer = Consumer::start(broker.subscriber(), sinks, &config.consumer)?;
    let producer = Producer::new(broker.publisher(), &config.producer);

    let (trigger, shutdown) = shutdown::channel();
    listen_for_interrupt(trigger);

    let (produced, consumed) = tokio::join!(producer.run(shutdown.clone()), consumer.run(shutdown));

    info!(
        published = produced.published,
        persisted = consumed.persisted,
        "logpipe-standalone stopped"
    );
    Ok(())
}
