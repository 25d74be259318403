//! Error types for VIGIL operations

use thiserror::Error;

/// Storage backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Read failed for key {key} in partition {partition}: {reason}")]
    ReadFailed {
        partition: String,
        key: String,
        reason: String,
    },

    #[error("Write failed for key {key} in partition {partition}: {reason}")]
    WriteFailed {
        partition: String,
        key: String,
        reason: String,
    },

    #[error("Remove failed for key {key} in partition {partition}: {reason}")]
    RemoveFailed {
        partition: String,
        key: String,
        reason: String,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to initialize telemetry: {reason}")]
    TelemetryInit { reason: String },
}

/// Master error type for all VIGIL errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VigilError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl VigilError {
    /// Returns true if this error came from the storage backend.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this error came from configuration.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias for VIGIL operations.
pub type VigilResult<T> = Result<T, VigilError>;

// =============================================================================
// TESTS
// =============================================================================
