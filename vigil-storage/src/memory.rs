//! In-memory storage service.
//!
//! Suitable for single-process deployments and tests. Nothing survives a
//! restart, so replay windows reset with the process.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use vigil_core::{ExpiringObject, PartitionName, StorageError, Timestamp, VigilResult};

use crate::service::StorageService;

type Partitions<V> = HashMap<PartitionName, HashMap<String, V>>;

/// In-memory partitioned storage.
///
/// Cloning yields another handle onto the same maps.
#[derive(Debug)]
pub struct InMemoryStorageService<V> {
    partitions: Arc<RwLock<Partitions<V>>>,
}

impl<V> Clone for InMemoryStorageService<V> {
    fn clone(&self) -> Self {
        Self {
            partitions: Arc::clone(&self.partitions),
        }
    }
}

impl<V> Default for InMemoryStorageService<V> {
    fn default() -> Self {
        Self {
            partitions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<V> InMemoryStorageService<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of values across all partitions.
    pub fn len(&self) -> usize {
        self.partitions
            .read()
            .map(|p| p.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything.
    pub fn clear(&self) -> VigilResult<()> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        partitions.clear();
        Ok(())
    }
}

#[async_trait]
impl<V> StorageService<V> for InMemoryStorageService<V>
where
    V: ExpiringObject + Clone + 'static,
{
    async fn get(&self, partition: &str, key: &str) -> VigilResult<Option<V>> {
        let partitions = self
            .partitions
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(partitions
            .get(partition)
            .and_then(|values| values.get(key))
            .cloned())
    }

    async fn put(&self, partition: &str, key: &str, value: V) -> VigilResult<()> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        partitions
            .entry(partition.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, partition: &str, key: &str) -> VigilResult<bool> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;

        let Some(values) = partitions.get_mut(partition) else {
            return Ok(false);
        };
        let removed = values.remove(key).is_some();
        if values.is_empty() {
            partitions.remove(partition);
        }
        Ok(removed)
    }

    async fn partitions(&self) -> VigilResult<Vec<PartitionName>> {
        let partitions = self
            .partitions
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let mut names: Vec<PartitionName> = partitions
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn keys(&self, partition: &str) -> VigilResult<Vec<String>> {
        let partitions = self
            .partitions
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let mut keys: Vec<String> = partitions
            .get(partition)
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn purge_expired(&self, partition: &str, now: Timestamp) -> VigilResult<u64> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;

        let Some(values) = partitions.get_mut(partition) else {
            return Ok(0);
        };

        let before_count = values.len();
        values.retain(|_, value| {
            if value.is_expired_at(now) {
                value.on_expire();
                false
            } else {
                true
            }
        });
        let deleted = (before_count - values.len()) as u64;

        if values.is_empty() {
            partitions.remove(partition);
        }

        if deleted > 0 {
            tracing::debug!(partition = %partition, deleted, "Purged expired entries");
        }

        Ok(deleted)
    }
}
