//! Tracing subscriber initialization.
//!
//! VIGIL crates only emit `tracing` events. Applications embedding the
//! replay cache call [`init_tracing`] once at startup if they don't install
//! their own subscriber.

use std::str::FromStr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{ConfigError, VigilResult};

/// Default filter directive when `VIGIL_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "vigil_storage=info,vigil_core=info,warn";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable multi-field lines.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(ConfigError::InvalidValue {
                field: "log_format".to_string(),
                value: other.to_string(),
                reason: "expected json or pretty".to_string(),
            }),
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            format: LogFormat::default(),
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `VIGIL_LOG`: filter directive (default: [`DEFAULT_LOG_FILTER`])
    /// - `VIGIL_LOG_FORMAT`: `json` or `pretty` (default: `json`)
    ///
    /// An unrecognized format falls back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            filter: std::env::var("VIGIL_LOG").unwrap_or(defaults.filter),
            format: std::env::var("VIGIL_LOG_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.format),
        }
    }

    /// Parse the filter directive.
    pub fn env_filter(&self) -> VigilResult<EnvFilter> {
        EnvFilter::try_new(&self.filter).map_err(|e| {
            ConfigError::InvalidValue {
                field: "filter".to_string(),
                value: self.filter.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Install a global tracing subscriber.
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_tracing(config: &TelemetryConfig) -> VigilResult<()> {
    let env_filter = config.env_filter()?;

    let json_layer =
        (config.format == LogFormat::Json).then(|| tracing_subscriber::fmt::layer().json());
    let pretty_layer =
        (config.format == LogFormat::Pretty).then(|| tracing_subscriber::fmt::layer().pretty());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|e| ConfigError::TelemetryInit {
            reason: e.to_string(),
        })?;

    tracing::info!(
        filter = %config.filter,
        format = ?config.format,
        "Telemetry initialized"
    );

    Ok(())
}
