//! Partition-scoped key system for LMDB isolation.
//!
//! A `PartitionScopedKey` cannot be built without naming its partition, so
//! every byte key written to LMDB is prefixed by the partition it belongs to.

/// Separator byte between the partition name and the key.
///
/// 0xFF never occurs in UTF-8, so the first occurrence always marks the end
/// of the partition name.
const SEPARATOR: u8 = 0xFF;

/// A storage key scoped to a specific partition.
///
/// # Binary Format
///
/// - Bytes 0..p: partition name (UTF-8)
/// - Byte p: separator (0xFF)
/// - Bytes p+1..: key (UTF-8)
///
/// This format ensures:
/// - Keys are naturally grouped by partition
/// - A partition's keys share the `[partition][0xFF]` prefix for range scans
/// - Partition "a" with key "bc" never collides with partition "ab" with key "c"
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionScopedKey {
    partition: String,
    key: String,
}

impl PartitionScopedKey {
    /// Create a new partition-scoped key.
    pub fn new(partition: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            key: key.into(),
        }
    }

    /// Get the partition this key is scoped to.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Get the key within the partition.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Encode this key to bytes for LMDB storage.
    ///
    /// Format: [partition][0xFF][key]
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.partition.len() + 1 + self.key.len());
        bytes.extend_from_slice(self.partition.as_bytes());
        bytes.push(SEPARATOR);
        bytes.extend_from_slice(self.key.as_bytes());
        bytes
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` if:
    /// - The separator byte is missing
    /// - Either the partition or the key is not valid UTF-8
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let split = bytes.iter().position(|b| *b == SEPARATOR)?;

        let partition = std::str::from_utf8(&bytes[..split]).ok()?;
        let key = std::str::from_utf8(&bytes[split + 1..]).ok()?;

        Some(Self::new(partition, key))
    }

    /// Create a prefix for scanning all keys belonging to a partition.
    pub fn partition_prefix(partition: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(partition.len() + 1);
        prefix.extend_from_slice(partition.as_bytes());
        prefix.push(SEPARATOR);
        prefix
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        /// Property: Encode/decode roundtrip preserves partition and key.
        #[test]
        fn prop_encode_decode_roundtrip(partition in ".*", key in ".*") {
            let scoped = PartitionScopedKey::new(partition, key);
            let decoded = PartitionScopedKey::decode(&scoped.encode());
            prop_assert_eq!(Some(scoped), decoded);
        }

        /// Property: Encoding is injective.
        #[test]
        fn prop_encoding_is_injective(
            p1 in "[a-c]{0,3}",
            k1 in "[a-c]{0,3}",
            p2 in "[a-c]{0,3}",
            k2 in "[a-c]{0,3}",
        ) {
            let key1 = PartitionScopedKey::new(p1, k1);
            let key2 = PartitionScopedKey::new(p2, k2);

            if key1 == key2 {
                prop_assert_eq!(key1.encode(), key2.encode());
            } else {
                prop_assert_ne!(key1.encode(), key2.encode());
            }
        }

        /// Property: Partition prefix is a prefix of every key in that partition.
        #[test]
        fn prop_partition_prefix_is_prefix(partition in ".*", key in ".*") {
            let encoded = PartitionScopedKey::new(partition.clone(), key).encode();
            let prefix = PartitionScopedKey::partition_prefix(&partition);
            prop_assert!(encoded.starts_with(&prefix));
        }
    }
}
