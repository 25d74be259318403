//! VIGIL Core - Replay Cache Types
//!
//! Pure data structures shared by every VIGIL crate: the expiring-entry
//! capability, clocks, configuration, and the error taxonomy.
//! This crate contains no storage logic.

use chrono::{DateTime, Utc};

pub mod clock;
pub mod config;
pub mod error;
pub mod expiring;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{KeyEncoding, ReplayCacheConfig, DEFAULT_ENTRY_DURATION, DEFAULT_PARTITION};
pub use error::{ConfigError, StorageError, VigilError, VigilResult};
pub use expiring::{ExpiringObject, ReplayCacheEntry};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Duration in milliseconds, as read from configuration sources.
pub type DurationMs = i64;

/// Name of a storage partition.
pub type PartitionName = String;
