//! VIGIL Storage - Replay Cache and Storage Backends
//!
//! Defines the partitioned storage abstraction the replay cache writes
//! through, two reference backends (in-memory and LMDB), and the
//! [`ReplayCache`] itself.

pub mod lmdb_backend;
pub mod memory;
pub mod partition_key;
pub mod replay;
pub mod service;

pub use lmdb_backend::{LmdbStorageError, LmdbStorageService};
pub use memory::InMemoryStorageService;
pub use partition_key::PartitionScopedKey;
pub use replay::{ReplayCache, ReplayKey, ReplayStats};
pub use service::StorageService;

// Re-export core types so callers can depend on this crate alone
pub use vigil_core::{
    Clock, ExpiringObject, KeyEncoding, ManualClock, ReplayCacheConfig, ReplayCacheEntry,
    StorageError, SystemClock, Timestamp, VigilError, VigilResult, DEFAULT_PARTITION,
};
