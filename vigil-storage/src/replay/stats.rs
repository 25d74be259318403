//! Replay cache statistics.

/// Counters for a single replay cache instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Number of `is_replay` calls that reached a decision.
    pub checks: u64,
    /// Number of calls that detected a replay.
    pub replays_detected: u64,
    /// Number of first sightings recorded.
    pub fresh_sightings: u64,
    /// Number of expired entries removed during lookups.
    pub expired_cleaned: u64,
    /// Number of fresh sightings whose write to storage failed.
    pub write_failures: u64,
    /// Number of expired-entry removals that failed.
    pub cleanup_failures: u64,
}

impl ReplayStats {
    /// Fraction of decided checks that were replays (0.0 to 1.0).
    pub fn replay_rate(&self) -> f64 {
        if self.checks == 0 {
            0.0
        } else {
            self.replays_detected as f64 / self.checks as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_rate() {
        let stats = ReplayStats {
            checks: 10,
            replays_detected: 3,
            fresh_sightings: 7,
            ..Default::default()
        };
        assert!((stats.replay_rate() - 0.3).abs() < 0.001);

        let empty = ReplayStats::default();
        assert!((empty.replay_rate() - 0.0).abs() < 0.001);
    }
}
