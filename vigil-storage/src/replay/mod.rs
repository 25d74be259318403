//! Replay detection over a pluggable storage service.
//!
//! # Design
//!
//! A message is identified by its issuer and message ID. The first sighting
//! of a pair records an entry that stays live for the configured duration;
//! any further sighting while it is live is a replay. Entries are expired
//! lazily on read, never by a background sweeper.
//!
//! # Example
//!
//! ```ignore
//! let storage = Arc::new(InMemoryStorageService::new());
//! let cache = ReplayCache::new(storage, Duration::from_secs(300))?;
//!
//! assert!(!cache.is_replay("https://idp.example.org", "_a75adf55").await?);
//! assert!(cache.is_replay("https://idp.example.org", "_a75adf55").await?);
//! ```

pub mod cache;
pub mod key;
pub mod stats;

pub use cache::ReplayCache;
pub use key::ReplayKey;
pub use stats::ReplayStats;
