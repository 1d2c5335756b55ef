//! Tracing subscriber initialization.

use leadflow_core::{ConfigError, LeadflowError, LeadflowResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"leadflow_distribution=debug"`.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Read `LEADFLOW_LOG` and `LEADFLOW_LOG_JSON`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            filter: lookup("LEADFLOW_LOG")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.filter),
            json: lookup("LEADFLOW_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.json),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Output goes to stderr so that stdout stays free for program output.
/// Calling this a second time returns a `ConfigError`.
pub fn init_tracing(config: &TelemetryConfig) -> LeadflowResult<()> {
    let env_filter = EnvFilter::try_new(&config.filter).map_err(|e| {
        LeadflowError::Config(ConfigError::InvalidValue {
            field: "LEADFLOW_LOG".to_string(),
            value: config.filter.clone(),
            reason: e.to_string(),
        })
    })?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| {
        LeadflowError::Config(ConfigError::InvalidValue {
            field: "tracing_subscriber".to_string(),
            value: config.filter.clone(),
            reason: format!("Failed to init subscriber: {}", e),
        })
    })?;

    tracing::debug!(filter = %config.filter, json = config.json, "Tracing initialized");
    Ok(())
}
