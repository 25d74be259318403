//! Expiring values.
//!
//! Anything a storage backend holds on behalf of the replay cache knows when
//! it stops being valid. The capability is a trait rather than shared state,
//! so backends can evaluate expiry without knowing the concrete value type.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// A value that carries its own absolute expiration time.
pub trait ExpiringObject: Send + Sync {
    /// Absolute time at which this value expires.
    fn expiration_time(&self) -> Timestamp;

    /// Check expiry against an explicit instant.
    ///
    /// A value whose expiration is exactly `now` is already expired.
    fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expiration_time() <= now
    }

    /// Check expiry against the system clock.
    fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Hook invoked when a backend evicts this value during a purge.
    ///
    /// Not every backend can call it. `InMemoryStorageService` calls it for
    /// each value its `purge_expired` drops. `LmdbStorageService` purges by
    /// expiration header without deserializing values, so it never does.
    /// The replay cache's own lazy removal of an expired entry does not call
    /// it either.
    fn on_expire(&self) {}
}

/// Replay cache entry: records until when a message sighting stays live.
///
/// Entries are immutable. A replay never refreshes an existing entry; a new
/// sighting after expiry replaces it with a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplayCacheEntry {
    expiration_time: Timestamp,
}

impl ReplayCacheEntry {
    /// Create an entry expiring at the given instant.
    pub fn new(expiration_time: Timestamp) -> Self {
        Self { expiration_time }
    }

    /// Create an entry that expires `ttl` after `now`.
    ///
    /// Returns `None` if the result falls outside the representable range.
    pub fn expiring_after(now: Timestamp, ttl: chrono::Duration) -> Option<Self> {
        now.checked_add_signed(ttl).map(Self::new)
    }

    /// Time remaining until expiry, or `None` if already expired.
    pub fn remaining(&self, now: Timestamp) -> Option<std::time::Duration> {
        if self.is_expired_at(now) {
            None
        } else {
            (self.expiration_time - now).to_std().ok()
        }
    }
}

impl ExpiringObject for ReplayCacheEntry {
    fn expiration_time(&self) -> Timestamp {
        self.expiration_time
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    proptest! {
        /// Property: an entry is live strictly before its deadline and expired from it onward.
        #[test]
        fn prop_expiry_boundary(ttl_ms in 1i64..10_000_000, probe_ms in 0i64..20_000_000) {
            let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
            let entry = ReplayCacheEntry::expiring_after(base, Duration::milliseconds(ttl_ms))
                .expect("in range");
            let now = base + Duration::milliseconds(probe_ms);
            prop_assert_eq!(entry.is_expired_at(now), probe_ms >= ttl_ms);
        }
    }
}
