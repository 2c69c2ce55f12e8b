//! Service configuration.
//!
//! Loaded via the `config` crate from `FORGEBOT_*` environment variables,
//! e.g. `FORGEBOT_POLL_PERIOD_MS=30000`.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Settings for a [`ForgebotService`](crate::ForgebotService).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// How often the timeline is polled, in milliseconds.
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,

    /// Ceiling on steps executed in one chain run.
    #[serde(default = "default_max_chain_steps")]
    pub max_chain_steps: usize,

    /// Catalog file to load instead of the built-in catalog.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// Whether the daemon starts the timeline loop on boot.
    #[serde(default = "default_start_timeline")]
    pub start_timeline: bool,
}

fn default_poll_period_ms() -> u64 {
    60_000
}

fn default_max_chain_steps() -> usize {
    forgebot_ritual::DEFAULT_MAX_STEPS
}

fn default_start_timeline() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_period_ms: default_poll_period_ms(),
            max_chain_steps: default_max_chain_steps(),
            catalog_path: None,
            start_timeline: default_start_timeline(),
        }
    }
}

impl ServiceConfig {
    /// Returns the poll period as a duration.
    #[must_use]
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("FORGEBOT")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()
    }
}
