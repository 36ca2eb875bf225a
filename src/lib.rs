//! logpipe - publish/subscribe log event pipeline
//!
//! A producer synthesizes structured log events and publishes them to a
//! broker topic with delivery tracking; a consumer subscribes to that topic,
//! decodes each event and records it to the console and an append-only
//! file. Both loops stop cooperatively on a process-wide interrupt.

pub mod bus;
pub mod config;
pub mod consumer;
pub mod event;
pub mod producer;
pub mod shutdown;
pub mod utils;
