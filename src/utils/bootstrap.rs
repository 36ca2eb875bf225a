//! Bootstrap utilities for logpipe binaries.
//!
//! Shared initialization code for the producer, consumer and standalone
//! binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with the LOGPIPE_LOG environment variable.
///
/// Defaults to "info" level if LOGPIPE_LOG is not set. Log output goes to
/// stderr so that stdout carries only persisted event lines.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
