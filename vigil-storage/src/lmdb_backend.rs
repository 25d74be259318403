//! LMDB-backed storage service with partition isolation.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a durable,
//! memory-mapped store, so replay windows survive process restarts.
//!
//! # Partition Isolation
//!
//! All operations use [`PartitionScopedKey`], so every partition owns a
//! distinct key prefix and partition-wide scans never touch other partitions.
//!
//! # Value Format
//!
//! `[expiration: i64 unix millis, little endian, 8 bytes][serde_json value]`
//!
//! The expiration header lets `purge_expired` test expiry without
//! deserializing the value. It is rounded up to the next millisecond, so a
//! header never claims a value expired before it actually did.
//!
//! `purge_expired` deletes raw bytes and never calls
//! [`ExpiringObject::on_expire`](vigil_core::ExpiringObject::on_expire).
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The backend uses:
//! - Read transactions for `get`, `partitions`, and `keys`
//! - Write transactions for `put`, `remove`, and `purge_expired`
//!
//! `purge_expired` re-reads every candidate inside its write transaction, so
//! a value re-recorded after the scan is never deleted.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use serde::{de::DeserializeOwned, Serialize};
use vigil_core::{ExpiringObject, PartitionName, StorageError, Timestamp, VigilError, VigilResult};

use crate::partition_key::PartitionScopedKey;
use crate::service::StorageService;

/// Width of the expiration header preceding every stored value.
const HEADER_LEN: usize = 8;

/// Error type for LMDB storage operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStorageError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert LmdbStorageError to StorageError.
impl From<LmdbStorageError> for StorageError {
    fn from(e: LmdbStorageError) -> Self {
        match e {
            LmdbStorageError::Serialization(reason) | LmdbStorageError::Deserialization(reason) => {
                StorageError::Serialization { reason }
            }
            other => StorageError::TransactionFailed {
                reason: other.to_string(),
            },
        }
    }
}

impl From<LmdbStorageError> for VigilError {
    fn from(e: LmdbStorageError) -> Self {
        VigilError::Storage(e.into())
    }
}

/// LMDB-backed partitioned storage.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use vigil_storage::{LmdbStorageService, ReplayCache};
///
/// let storage = Arc::new(LmdbStorageService::new("/var/lib/vigil", 64)?);
/// let cache = ReplayCache::new(storage, Duration::from_secs(300))?;
/// ```
pub struct LmdbStorageService {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
}

impl std::fmt::Debug for LmdbStorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbStorageService")
            .field("path", &self.env.path())
            .finish()
    }
}

impl LmdbStorageService {
    /// Create a new LMDB storage service.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStorageError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStorageError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStorageError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    /// Number of values stored across all partitions.
    pub fn len(&self) -> Result<u64, LmdbStorageError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?;
        self.db
            .len(&rtxn)
            .map_err(|e| LmdbStorageError::Transaction(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, LmdbStorageError> {
        Ok(self.len()? == 0)
    }

    /// Iterate over entries matching a prefix and collect them.
    fn collect_with_prefix(
        &self,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, LmdbStorageError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?;

        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?;

        let mut entries = Vec::new();
        for result in iter {
            let (key, value) = result.map_err(|e| LmdbStorageError::Transaction(e.to_string()))?;
            if key.starts_with(prefix) {
                entries.push((key.to_vec(), value.to_vec()));
            }
        }

        Ok(entries)
    }
}

/// Serialize a value behind its expiration header.
fn encode_value<V>(value: &V) -> Result<Vec<u8>, LmdbStorageError>
where
    V: ExpiringObject + Serialize,
{
    let header = header_millis(value.expiration_time()).to_le_bytes();
    let body =
        serde_json::to_vec(value).map_err(|e| LmdbStorageError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Expiration in unix millis, rounded up when there is a sub-millisecond part.
fn header_millis(expiration: Timestamp) -> i64 {
    let millis = expiration.timestamp_millis();
    if expiration.timestamp_subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis.saturating_add(1)
    }
}

/// Read only the expiration header of a stored value.
fn decode_expiration(bytes: &[u8]) -> Result<Timestamp, LmdbStorageError> {
    let header: [u8; HEADER_LEN] = bytes
        .get(..HEADER_LEN)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| LmdbStorageError::Deserialization("Truncated value header".into()))?;

    let millis = i64::from_le_bytes(header);
    match DateTime::from_timestamp_millis(millis) {
        Some(expiration) => Ok(expiration),
        // Rounding up the latest representable instant lands one past it
        None if millis > 0 => Ok(DateTime::<Utc>::MAX_UTC),
        None => Err(LmdbStorageError::Deserialization(
            "Expiration out of range".into(),
        )),
    }
}

/// Deserialize a stored value, skipping its header.
fn decode_value<V>(bytes: &[u8]) -> Result<V, LmdbStorageError>
where
    V: DeserializeOwned,
{
    if bytes.len() < HEADER_LEN {
        return Err(LmdbStorageError::Deserialization(
            "Truncated value header".into(),
        ));
    }
    serde_json::from_slice(&bytes[HEADER_LEN..])
        .map_err(|e| LmdbStorageError::Deserialization(e.to_string()))
}

#[async_trait]
impl<V> StorageService<V> for LmdbStorageService
where
    V: ExpiringObject + Clone + Serialize + DeserializeOwned + 'static,
{
    async fn get(&self, partition: &str, key: &str) -> VigilResult<Option<V>> {
        let encoded_key = PartitionScopedKey::new(partition, key).encode();

        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?;

        let bytes = self
            .db
            .get(&rtxn, &encoded_key)
            .map_err(|e| StorageError::ReadFailed {
                partition: partition.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        match bytes {
            Some(bytes) => Ok(Some(decode_value(bytes)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, partition: &str, key: &str, value: V) -> VigilResult<()> {
        let encoded_key = PartitionScopedKey::new(partition, key).encode();
        let bytes = encode_value(&value)?;

        let write_failed = |reason: String| StorageError::WriteFailed {
            partition: partition.to_string(),
            key: key.to_string(),
            reason,
        };

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| write_failed(e.to_string()))?;

        self.db
            .put(&mut wtxn, &encoded_key, &bytes)
            .map_err(|e| write_failed(e.to_string()))?;

        wtxn.commit().map_err(|e| write_failed(e.to_string()))?;

        Ok(())
    }

    async fn remove(&self, partition: &str, key: &str) -> VigilResult<bool> {
        let encoded_key = PartitionScopedKey::new(partition, key).encode();

        let remove_failed = |reason: String| StorageError::RemoveFailed {
            partition: partition.to_string(),
            key: key.to_string(),
            reason,
        };

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| remove_failed(e.to_string()))?;

        let deleted = self
            .db
            .delete(&mut wtxn, &encoded_key)
            .map_err(|e| remove_failed(e.to_string()))?;

        wtxn.commit().map_err(|e| remove_failed(e.to_string()))?;

        Ok(deleted)
    }

    async fn partitions(&self) -> VigilResult<Vec<PartitionName>> {
        let entries = self.collect_with_prefix(&[])?;

        let names: BTreeSet<PartitionName> = entries
            .iter()
            .filter_map(|(key, _)| PartitionScopedKey::decode(key))
            .map(|scoped| scoped.partition().to_string())
            .collect();

        Ok(names.into_iter().collect())
    }

    async fn keys(&self, partition: &str) -> VigilResult<Vec<String>> {
        let prefix = PartitionScopedKey::partition_prefix(partition);
        let entries = self.collect_with_prefix(&prefix)?;

        Ok(entries
            .iter()
            .filter_map(|(key, _)| PartitionScopedKey::decode(key))
            .map(|scoped| scoped.key().to_string())
            .collect())
    }

    async fn purge_expired(&self, partition: &str, now: Timestamp) -> VigilResult<u64> {
        let prefix = PartitionScopedKey::partition_prefix(partition);
        let entries = self.collect_with_prefix(&prefix)?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        for (key, _) in &entries {
            // Re-check under the write transaction; the scan above may be stale
            let expiration = match self
                .db
                .get(&wtxn, key)
                .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?
            {
                Some(value) => decode_expiration(value),
                None => continue,
            };

            // Values with an unreadable header are left for the owner to inspect
            let Ok(expiration) = expiration else {
                continue;
            };

            if expiration <= now
                && self
                    .db
                    .delete(&mut wtxn, key)
                    .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?
            {
                deleted += 1;
            }
        }

        wtxn.commit()
            .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?;

        if deleted > 0 {
            tracing::debug!(partition = %partition, deleted, "Purged expired entries");
        }

        Ok(deleted)
    }
}
