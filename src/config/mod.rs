//! Application configuration.
//!
//! Aggregates the messaging, producer and consumer sections into a single
//! Config struct that can be loaded from YAML files or environment variables.

mod messaging;

pub use messaging::{KafkaConfig, MessagingConfig, MessagingType};

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "LOGPIPE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "LOGPIPE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "LOGPIPE_LOG";

/// Topic carrying encoded log events.
pub const DEFAULT_TOPIC: &str = "event-logs";

/// Configuration load failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker selection and connection settings.
    pub messaging: MessagingConfig,
    /// Producer loop settings.
    pub producer: ProducerConfig,
    /// Consumer loop settings.
    pub consumer: ConsumerConfig,
}

/// Producer loop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Topic events are published to.
    pub topic: String,
    /// Cadence between synthesized events, in milliseconds.
    pub interval_ms: u64,
    /// Upper bound on the shutdown drain, in milliseconds.
    pub drain_timeout_ms: u64,
    /// Fixed seed for reproducible event selection. Absent = OS entropy.
    pub seed: Option<u64>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            interval_ms: 2000,
            drain_timeout_ms: 15000,
            seed: None,
        }
    }
}

impl ProducerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Consumer loop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Topic to subscribe to.
    pub topic: String,
    /// Bounded wait per poll, in milliseconds.
    pub poll_timeout_ms: u64,
    /// Append-only event log file.
    pub log_path: PathBuf,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            poll_timeout_ms: 100,
            log_path: PathBuf::from("events.log"),
        }
    }
}

impl ConsumerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the loops cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.producer.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "producer.interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
