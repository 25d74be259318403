//! Configuration types

use crate::{ConfigError, DurationMs, VigilError, VigilResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Partition used when none (or a blank one) is configured.
pub const DEFAULT_PARTITION: &str = "replay";

/// Default validity window for a recorded message sighting.
pub const DEFAULT_ENTRY_DURATION: Duration = Duration::from_secs(300);

/// How an `(issuer, message)` pair is turned into a storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyEncoding {
    /// `{issuer_len}:{issuer}{message}`; reversible.
    #[default]
    LengthPrefixed,
    /// Hex SHA-256 of the length-prefixed form; fixed width, not reversible.
    Sha256,
}

impl KeyEncoding {
    /// Convert to configuration string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyEncoding::LengthPrefixed => "length-prefixed",
            KeyEncoding::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for KeyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for KeyEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "length-prefixed" | "length_prefixed" | "plain" => Ok(KeyEncoding::LengthPrefixed),
            "sha256" | "sha-256" | "hashed" => Ok(KeyEncoding::Sha256),
            other => Err(ConfigError::InvalidValue {
                field: "key_encoding".to_string(),
                value: other.to_string(),
                reason: "expected one of: length-prefixed, sha256".to_string(),
            }),
        }
    }
}

/// Replay cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayCacheConfig {
    /// Storage partition; blank or absent falls back to [`DEFAULT_PARTITION`].
    pub partition: Option<String>,
    /// How long a recorded sighting stays live.
    pub entry_duration: Duration,
    /// Composite key encoding.
    pub key_encoding: KeyEncoding,
}

impl Default for ReplayCacheConfig {
    fn default() -> Self {
        Self {
            partition: None,
            entry_duration: DEFAULT_ENTRY_DURATION,
            key_encoding: KeyEncoding::default(),
        }
    }
}

impl ReplayCacheConfig {
    /// Create a config with the given entry duration and default partition.
    pub fn new(entry_duration: Duration) -> Self {
        Self {
            entry_duration,
            ..Self::default()
        }
    }

    /// Set the storage partition.
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Set the entry duration.
    pub fn with_entry_duration(mut self, duration: Duration) -> Self {
        self.entry_duration = duration;
        self
    }

    /// Set the key encoding.
    pub fn with_key_encoding(mut self, encoding: KeyEncoding) -> Self {
        self.key_encoding = encoding;
        self
    }

    /// The partition actually used: trimmed, or the default when blank.
    pub fn resolved_partition(&self) -> String {
        resolve_partition(self.partition.as_deref())
    }

    /// The entry duration as a signed chrono duration, validated.
    pub fn entry_ttl(&self) -> VigilResult<chrono::Duration> {
        if self.entry_duration.is_zero() {
            return Err(invalid(
                "entry_duration",
                format!("{:?}", self.entry_duration),
                "entry_duration must be positive",
            ));
        }

        chrono::Duration::from_std(self.entry_duration).map_err(|_| {
            invalid(
                "entry_duration",
                format!("{:?}", self.entry_duration),
                "entry_duration exceeds the representable range",
            )
        })
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - entry_duration > 0
    /// - entry_duration fits in a signed timestamp offset
    pub fn validate(&self) -> VigilResult<()> {
        self.entry_ttl().map(|_| ())
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `VIGIL_REPLAY_PARTITION`: storage partition (default: `replay`)
    /// - `VIGIL_REPLAY_ENTRY_DURATION_MS`: entry duration in milliseconds (default: 300000)
    /// - `VIGIL_REPLAY_KEY_ENCODING`: `length-prefixed` or `sha256` (default: `length-prefixed`)
    ///
    /// Unlike the silent fallback for missing variables, a variable that is
    /// present but malformed (or a non-positive duration) is an error.
    pub fn from_env() -> VigilResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> VigilResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let partition = lookup("VIGIL_REPLAY_PARTITION").or(defaults.partition);

        let entry_duration = match lookup("VIGIL_REPLAY_ENTRY_DURATION_MS") {
            Some(raw) => parse_duration_ms(&raw)?,
            None => defaults.entry_duration,
        };

        let key_encoding = match lookup("VIGIL_REPLAY_KEY_ENCODING") {
            Some(raw) => raw.parse::<KeyEncoding>()?,
            None => defaults.key_encoding,
        };

        let config = Self {
            partition,
            entry_duration,
            key_encoding,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Trim a configured partition name, falling back to [`DEFAULT_PARTITION`].
pub fn resolve_partition(partition: Option<&str>) -> String {
    match partition.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_PARTITION.to_string(),
    }
}

fn parse_duration_ms(raw: &str) -> VigilResult<Duration> {
    let ms: DurationMs = raw.trim().parse().map_err(|_| {
        invalid(
            "entry_duration",
            raw.to_string(),
            "entry_duration must be an integer number of milliseconds",
        )
    })?;

    if ms <= 0 {
        return Err(invalid(
            "entry_duration",
            raw.to_string(),
            "entry_duration must be positive",
        ));
    }

    Ok(Duration::from_millis(ms as u64))
}

fn invalid(field: &str, value: String, reason: &str) -> VigilError {
    VigilError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
