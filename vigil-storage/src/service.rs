//! Storage service trait for pluggable partitioned backends.
//!
//! The replay cache only ever talks to storage through this trait, so the
//! persistence engine (memory, LMDB, a shared distributed store) is the
//! deployer's choice.

use async_trait::async_trait;
use vigil_core::{ExpiringObject, PartitionName, Timestamp, VigilResult};

/// Partitioned key-value storage for values that know their own expiration.
///
/// Implementations manage their own internal consistency and must be safe to
/// share across tasks. They are not required to be linearizable across
/// independent cache instances; the replay cache supplies its own locking.
///
/// # Contract
///
/// - `get` of a missing key is `Ok(None)`, never an error.
/// - `put` upserts, replacing any value stored under the same key.
/// - `remove` is idempotent; removing an absent key is `Ok(false)`.
/// - Partitions are independent namespaces: the same key in two partitions
///   names two unrelated values.
#[async_trait]
pub trait StorageService<V>: Send + Sync
where
    V: ExpiringObject + Clone + 'static,
{
    /// Get the value stored under `key` in `partition`.
    async fn get(&self, partition: &str, key: &str) -> VigilResult<Option<V>>;

    /// Store `value` under `key` in `partition`, overwriting any existing value.
    async fn put(&self, partition: &str, key: &str, value: V) -> VigilResult<()>;

    /// Remove the value under `key`. Returns whether a value was present.
    async fn remove(&self, partition: &str, key: &str) -> VigilResult<bool>;

    /// Check whether a value (expired or not) is stored under `key`.
    async fn contains(&self, partition: &str, key: &str) -> VigilResult<bool> {
        Ok(self.get(partition, key).await?.is_some())
    }

    /// Names of all partitions currently holding at least one value.
    async fn partitions(&self) -> VigilResult<Vec<PartitionName>>;

    /// All keys stored in `partition`.
    async fn keys(&self, partition: &str) -> VigilResult<Vec<String>>;

    /// Delete every value in `partition` whose expiration is at or before `now`.
    ///
    /// This is a maintenance operation for deployers; the replay cache itself
    /// expires entries lazily and never calls it. Whether evicted values see
    /// [`ExpiringObject::on_expire`] depends on the backend.
    async fn purge_expired(&self, partition: &str, now: Timestamp) -> VigilResult<u64>;
}
