//! logpipe-producer: synthetic log event publisher
//!
//! Publishes one random log event to the event topic every cadence tick and
//! tracks each delivery acknowledgment. On Ctrl+C it stops ticking and waits
//! (bounded) for outstanding acknowledgments before exiting.
//!
//! ## Architecture
//! ```text
//! [logpipe-producer] --(publish event-N)--> [broker: event-logs] --> consumers
//!         ^                                          |
//!         +---------------(delivery ack)-------------+
//! ```
//!
//! ## Configuration
//! - LOGPIPE_CONFIG: Path to a YAML config file (optional)
//! - LOGPIPE__PRODUCER__INTERVAL_MS: Cadence between events (default: 2000)
//! - LOGPIPE__PRODUCER__DRAIN_TIMEOUT_MS: Shutdown drain bound (default: 15000)
//! - LOGPIPE__MESSAGING__KAFKA__BOOTSTRAP_SERVERS: Broker list (default: localhost:9092)
//! - LOGPIPE_LOG: Log filter (default: info)

use logpipe::bus::init_publisher;
use logpipe::config::Config;
use logpipe::producer::Producer;
use logpipe::shutdown::{self, listen_for_interrupt};
use logpipe::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;

    let publisher = init_publisher(&config.messaging)?;

    let (trigger, shutdown) = shutdown::channel();
    listen_for_interrupt(trigger);

    Producer::new(publisher, &config.producer)
        .run(shutdown)
        .await;

    Ok(())
}
