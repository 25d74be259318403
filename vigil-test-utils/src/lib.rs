//! VIGIL Test Utilities
//!
//! Centralized test infrastructure for the VIGIL workspace:
//! - Proptest generators for issuer and message identifiers
//! - A failure-injecting storage service
//! - Fixtures for common replay cache setups

// Re-export storage types from their source crate
pub use vigil_storage::{InMemoryStorageService, ReplayCache, ReplayKey, ReplayStats, StorageService};

// Re-export core types for convenience
pub use vigil_core::{
    Clock, ConfigError, ExpiringObject, KeyEncoding, ManualClock, ReplayCacheConfig,
    ReplayCacheEntry, StorageError, SystemClock, Timestamp, VigilError, VigilResult,
    DEFAULT_PARTITION,
};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

// ============================================================================
// FAILURE-INJECTING STORAGE
// ============================================================================

/// Storage wrapper that can be told to fail or slow down.
///
/// Wraps an [`InMemoryStorageService`]; every toggle can be flipped while a
/// cache is using it. A read delay widens race windows in concurrency tests.
#[derive(Debug)]
pub struct FlakyStorage<V> {
    inner: InMemoryStorageService<V>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_removes: AtomicBool,
    read_delay: Option<Duration>,
    reads: AtomicU64,
    writes: AtomicU64,
    removes: AtomicU64,
}

impl<V> Default for FlakyStorage<V> {
    fn default() -> Self {
        Self {
            inner: InMemoryStorageService::new(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_removes: AtomicBool::new(false),
            read_delay: None,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            removes: AtomicU64::new(0),
        }
    }
}

impl<V> FlakyStorage<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering every `get`.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    /// The wrapped storage, bypassing failure injection.
    pub fn inner(&self) -> &InMemoryStorageService<V> {
        &self.inner
    }

    /// Number of `get` calls seen, including failed ones.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `put` calls seen, including failed ones.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of `remove` calls seen, including failed ones.
    pub fn remove_count(&self) -> u64 {
        self.removes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<V> StorageService<V> for FlakyStorage<V>
where
    V: ExpiringObject + Clone + 'static,
{
    async fn get(&self, partition: &str, key: &str) -> VigilResult<Option<V>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::ReadFailed {
                partition: partition.to_string(),
                key: key.to_string(),
                reason: "injected read failure".to_string(),
            }
            .into());
        }
        self.inner.get(partition, key).await
    }

    async fn put(&self, partition: &str, key: &str, value: V) -> VigilResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed {
                partition: partition.to_string(),
                key: key.to_string(),
                reason: "injected write failure".to_string(),
            }
            .into());
        }
        self.inner.put(partition, key, value).await
    }

    async fn remove(&self, partition: &str, key: &str) -> VigilResult<bool> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(StorageError::RemoveFailed {
                partition: partition.to_string(),
                key: key.to_string(),
                reason: "injected remove failure".to_string(),
            }
            .into());
        }
        self.inner.remove(partition, key).await
    }

    async fn partitions(&self) -> VigilResult<Vec<String>> {
        self.inner.partitions().await
    }

    async fn keys(&self, partition: &str) -> VigilResult<Vec<String>> {
        self.inner.keys(partition).await
    }

    async fn purge_expired(&self, partition: &str, now: Timestamp) -> VigilResult<u64> {
        self.inner.purge_expired(partition, now).await
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// A fixed instant used as "now" by manual-clock fixtures.
pub fn fixed_epoch() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A unique SAML-style message ID (`_` followed by 32 hex digits).
pub fn new_message_id() -> String {
    format!("_{}", Uuid::now_v7().simple())
}

/// A replay cache over in-memory storage with a manual clock at [`fixed_epoch`].
pub struct ReplayFixture<S: StorageService<ReplayCacheEntry>> {
    pub storage: Arc<S>,
    pub clock: ManualClock,
    pub cache: ReplayCache<S>,
}

impl ReplayFixture<InMemoryStorageService<ReplayCacheEntry>> {
    /// Fixture on the default partition.
    pub fn in_memory(entry_duration: Duration) -> VigilResult<Self> {
        Self::with_storage(Arc::new(InMemoryStorageService::new()), entry_duration)
    }
}

impl ReplayFixture<FlakyStorage<ReplayCacheEntry>> {
    /// Fixture whose storage can be told to fail.
    pub fn flaky(entry_duration: Duration) -> VigilResult<Self> {
        Self::with_storage(Arc::new(FlakyStorage::new()), entry_duration)
    }
}

impl<S: StorageService<ReplayCacheEntry>> ReplayFixture<S> {
    /// Fixture over the given storage on the default partition.
    pub fn with_storage(storage: Arc<S>, entry_duration: Duration) -> VigilResult<Self> {
        let clock = ManualClock::new(fixed_epoch());
        let cache = ReplayCache::new(Arc::clone(&storage), entry_duration)?
            .with_clock(Arc::new(clock.clone()));
        Ok(Self {
            storage,
            clock,
            cache,
        })
    }

    /// Advance the fixture clock.
    pub fn advance(&self, by: Duration) {
        if let Ok(by) = chrono::Duration::from_std(by) {
            self.clock.advance(by);
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use proptest::prelude::*;

    /// Issuer entity IDs: URLs or URNs, as SAML issuers usually are.
    pub fn issuer_id_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{1,12}".prop_map(|host| format!("https://{}.example.org/idp", host)),
            "[a-z0-9]{1,16}".prop_map(|name| format!("urn:mace:example:{}", name)),
        ]
    }

    /// Message IDs: `_` followed by hex, like generated SAML IDs.
    pub fn message_id_strategy() -> impl Strategy<Value = String> {
        "[0-9a-f]{8,40}".prop_map(|hex| format!("_{}", hex))
    }

    /// Any string, for identifiers that come from untrusted input.
    pub fn arbitrary_id_strategy() -> impl Strategy<Value = String> {
        ".{0,40}"
    }

    /// A realistic `(issuer, message)` pair.
    pub fn id_pair_strategy() -> impl Strategy<Value = (String, String)> {
        (issuer_id_strategy(), message_id_strategy())
    }

    /// A set of distinct realistic pairs.
    pub fn distinct_pairs_strategy(max: usize) -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::hash_set(id_pair_strategy(), 1..=max)
            .prop_map(|set| set.into_iter().collect())
    }
}
