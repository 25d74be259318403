//! The replay cache.
//!
//! # Locking
//!
//! One instance-wide `tokio::sync::RwLock` guards every decision. Lookups take
//! the shared side; recording a sighting takes the exclusive side and
//! re-reads the entry before writing, so of several tasks racing to record the
//! same first sighting on one instance exactly one observes "not a replay".
//!
//! The lock is fair: queued writers are not starved by a stream of readers.
//!
//! It does not extend across processes. Two caches (in one process or many)
//! sharing a backend partition can both record the same first sighting if
//! their writes interleave; preventing that needs an atomic insert-if-absent
//! in the backend itself.
//!
//! # Failure Semantics
//!
//! | Failure                          | Outcome                                 |
//! |----------------------------------|-----------------------------------------|
//! | backend read                     | error returned to caller                |
//! | backend write after fresh verdict| logged, counted, still `Ok(false)`      |
//! | removal of an expired entry      | logged, counted, decision unchanged     |

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use vigil_core::config::resolve_partition;
use vigil_core::{
    Clock, ExpiringObject, KeyEncoding, ReplayCacheConfig, ReplayCacheEntry, SystemClock,
    VigilResult,
};

use super::key::ReplayKey;
use super::stats::ReplayStats;
use crate::service::StorageService;

/// Detects replayed messages by remembering `(issuer, message)` sightings.
///
/// # Type Parameters
///
/// - `S`: the storage service; may be unsized (`dyn StorageService<_>`)
pub struct ReplayCache<S>
where
    S: StorageService<ReplayCacheEntry> + ?Sized,
{
    /// Backing storage, shared with whoever else holds the `Arc`.
    storage: Arc<S>,
    /// Storage partition used by this cache.
    partition: String,
    /// How long a sighting stays live.
    entry_duration: Duration,
    /// `entry_duration` as a timestamp offset, validated at construction.
    entry_ttl: chrono::Duration,
    key_encoding: KeyEncoding,
    clock: Arc<dyn Clock>,
    lock: RwLock<()>,
    stats: std::sync::RwLock<ReplayStats>,
}

impl<S> ReplayCache<S>
where
    S: StorageService<ReplayCacheEntry> + ?Sized,
{
    /// Create a replay cache on the default partition.
    ///
    /// # Errors
    ///
    /// Fails if `entry_duration` is zero or too large to add to a timestamp.
    pub fn new(storage: Arc<S>, entry_duration: Duration) -> VigilResult<Self> {
        Self::from_config(storage, &ReplayCacheConfig::new(entry_duration))
    }

    /// Create a replay cache on a named partition.
    ///
    /// A blank or absent partition falls back to the default; any other name
    /// is trimmed.
    pub fn new_in_partition(
        storage: Arc<S>,
        partition: Option<&str>,
        entry_duration: Duration,
    ) -> VigilResult<Self> {
        let mut config = ReplayCacheConfig::new(entry_duration);
        config.partition = partition.map(str::to_string);
        Self::from_config(storage, &config)
    }

    /// Create a replay cache from a full configuration.
    pub fn from_config(storage: Arc<S>, config: &ReplayCacheConfig) -> VigilResult<Self> {
        let entry_ttl = config.entry_ttl()?;

        Ok(Self {
            storage,
            partition: resolve_partition(config.partition.as_deref()),
            entry_duration: config.entry_duration,
            entry_ttl,
            key_encoding: config.key_encoding,
            clock: Arc::new(SystemClock),
            lock: RwLock::new(()),
            stats: std::sync::RwLock::new(ReplayStats::default()),
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the partition this cache reads and writes.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Get the validity window of a recorded sighting.
    pub fn entry_duration(&self) -> Duration {
        self.entry_duration
    }

    /// Get the composite key encoding.
    pub fn key_encoding(&self) -> KeyEncoding {
        self.key_encoding
    }

    /// Get a reference to the storage service.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Snapshot of this instance's counters.
    pub fn stats(&self) -> ReplayStats {
        self.stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Check whether a message has been seen before.
    ///
    /// If the pair has no live entry, a sighting is recorded that stays live
    /// for the configured duration and `false` is returned. A replay leaves
    /// the existing entry untouched, so replays never extend the window.
    ///
    /// # Errors
    ///
    /// Only backend read failures are returned. A failed write after a fresh
    /// verdict is logged and the call still returns `Ok(false)`; at worst a
    /// later replay of this message goes undetected.
    pub async fn is_replay(&self, issuer_id: &str, message_id: &str) -> VigilResult<bool> {
        let key = ReplayKey::new(issuer_id, message_id).storage_key(self.key_encoding);

        let existing = {
            let _read = self.lock.read().await;
            self.storage.get(&self.partition, &key).await?
        };

        if let Some(entry) = existing {
            if !entry.is_expired_at(self.clock.now()) {
                tracing::debug!(
                    partition = %self.partition,
                    issuer_id = %issuer_id,
                    message_id = %message_id,
                    expires_at = %entry.expiration_time(),
                    "Replay of message detected"
                );
                self.record(|s| s.replays_detected += 1);
                return Ok(true);
            }
        }

        self.record_sighting(&key, issuer_id, message_id).await
    }

    /// Record a first sighting under the exclusive lock.
    ///
    /// Returns `true` if another task on this instance recorded the same
    /// pair between our lookup and acquiring the lock.
    async fn record_sighting(
        &self,
        key: &str,
        issuer_id: &str,
        message_id: &str,
    ) -> VigilResult<bool> {
        let _write = self.lock.write().await;
        let now = self.clock.now();

        match self.storage.get(&self.partition, key).await? {
            Some(entry) if !entry.is_expired_at(now) => {
                tracing::debug!(
                    partition = %self.partition,
                    issuer_id = %issuer_id,
                    message_id = %message_id,
                    expires_at = %entry.expiration_time(),
                    "Replay of message detected while recording sighting"
                );
                self.record(|s| s.replays_detected += 1);
                return Ok(true);
            }
            Some(expired) => {
                match self.storage.remove(&self.partition, key).await {
                    Ok(_) => {
                        tracing::debug!(
                            partition = %self.partition,
                            message_id = %message_id,
                            expired_at = %expired.expiration_time(),
                            "Removed expired replay cache entry"
                        );
                        self.count(|s| s.expired_cleaned += 1);
                    }
                    Err(e) => {
                        // The put below overwrites it anyway
                        tracing::warn!(
                            partition = %self.partition,
                            message_id = %message_id,
                            error = %e,
                            "Failed to remove expired replay cache entry"
                        );
                        self.count(|s| s.cleanup_failures += 1);
                    }
                }
            }
            None => {}
        }

        let entry = ReplayCacheEntry::expiring_after(now, self.entry_ttl)
            .unwrap_or_else(|| ReplayCacheEntry::new(DateTime::<Utc>::MAX_UTC));

        match self.storage.put(&self.partition, key, entry).await {
            Ok(()) => {
                tracing::debug!(
                    partition = %self.partition,
                    issuer_id = %issuer_id,
                    message_id = %message_id,
                    expires_at = %entry.expiration_time(),
                    "Recorded message sighting"
                );
                self.record(|s| s.fresh_sightings += 1);
            }
            Err(e) => {
                tracing::warn!(
                    partition = %self.partition,
                    issuer_id = %issuer_id,
                    message_id = %message_id,
                    error = %e,
                    "Failed to record message sighting; a replay of it may go undetected"
                );
                self.record(|s| {
                    s.fresh_sightings += 1;
                    s.write_failures += 1;
                });
            }
        }

        Ok(false)
    }

    /// Apply `f` to the counters and count the decision.
    ///
    /// Called exactly once per decided `is_replay`.
    fn record(&self, f: impl FnOnce(&mut ReplayStats)) {
        self.count(|stats| {
            stats.checks += 1;
            f(stats);
        });
    }

    /// Apply `f` to the counters without counting a decision.
    fn count(&self, f: impl FnOnce(&mut ReplayStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }
}

impl<S> fmt::Debug for ReplayCache<S>
where
    S: StorageService<ReplayCacheEntry> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayCache")
            .field("partition", &self.partition)
            .field("entry_duration", &self.entry_duration)
            .field("key_encoding", &self.key_encoding)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
