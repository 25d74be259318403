//! Property-based tests for replay decisions.
//!
//! Each case drives a cache with a manual clock through a random sequence
//! of checks and clock advances, and compares every decision against a
//! plain map of expiration times.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use vigil_test_utils::generators::*;
use vigil_test_utils::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime should build")
}

#[derive(Debug, Clone)]
enum Step {
    Check { pair: usize },
    Advance { millis: u64 },
}

fn step_strategy(pairs: usize) -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0..pairs).prop_map(|pair| Step::Check { pair }),
        1 => (0u64..3_000).prop_map(|millis| Step::Advance { millis }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: The first check of any pair is fresh and the second,
    /// within the window, is a replay.
    #[test]
    fn prop_first_fresh_then_replay(pairs in distinct_pairs_strategy(20)) {
        let rt = runtime();
        rt.block_on(async {
            let fixture = ReplayFixture::in_memory(Duration::from_secs(60)).unwrap();

            for (issuer, message) in &pairs {
                prop_assert!(!fixture.cache.is_replay(issuer, message).await.unwrap());
            }
            for (issuer, message) in &pairs {
                prop_assert!(fixture.cache.is_replay(issuer, message).await.unwrap());
            }
            prop_assert_eq!(fixture.storage.len(), pairs.len());
            Ok(())
        })?;
    }

    /// Property: Decisions match a map of expiration times under any
    /// interleaving of checks and clock advances.
    #[test]
    fn prop_decisions_match_model(
        pairs in distinct_pairs_strategy(4),
        duration_ms in 1u64..2_000,
        steps in prop::collection::vec(step_strategy(4), 1..60),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let fixture = ReplayFixture::in_memory(Duration::from_millis(duration_ms)).unwrap();
            let mut model: HashMap<usize, u64> = HashMap::new();
            let mut now_ms = 0u64;

            for step in &steps {
                match step {
                    Step::Advance { millis } => {
                        fixture.advance(Duration::from_millis(*millis));
                        now_ms += millis;
                    }
                    Step::Check { pair } => {
                        let pair = pair % pairs.len();
                        let (issuer, message) = &pairs[pair];

                        let expected = matches!(model.get(&pair), Some(exp) if *exp > now_ms);
                        if !expected {
                            model.insert(pair, now_ms + duration_ms);
                        }

                        let actual = fixture.cache.is_replay(issuer, message).await.unwrap();
                        prop_assert_eq!(actual, expected, "pair {} at {}ms", pair, now_ms);
                    }
                }
            }
            Ok(())
        })?;
    }

    /// Property: Identifiers from untrusted input never collide when their
    /// plain concatenations coincide.
    #[test]
    fn prop_split_point_matters(
        left in arbitrary_id_strategy(),
        right in arbitrary_id_strategy(),
        split in 0usize..40,
    ) {
        let joined = format!("{}{}", left, right);
        let boundaries: Vec<usize> = (0..=joined.len())
            .filter(|i| joined.is_char_boundary(*i))
            .collect();
        let at = boundaries[split % boundaries.len()];
        let (issuer, message) = joined.split_at(at);
        prop_assume!(issuer != left);

        let rt = runtime();
        rt.block_on(async {
            let fixture = ReplayFixture::in_memory(Duration::from_secs(60)).unwrap();

            prop_assert!(!fixture.cache.is_replay(&left, &right).await.unwrap());
            prop_assert!(!fixture.cache.is_replay(issuer, message).await.unwrap());
            Ok(())
        })?;
    }

    /// Property: Both key encodings give the same decisions.
    #[test]
    fn prop_key_encodings_agree(pairs in distinct_pairs_strategy(10)) {
        let rt = runtime();
        rt.block_on(async {
            let storage = Arc::new(InMemoryStorageService::<ReplayCacheEntry>::new());
            let prefixed = ReplayCache::from_config(
                Arc::clone(&storage),
                &ReplayCacheConfig::new(Duration::from_secs(60)).with_partition("prefixed"),
            )
            .unwrap();
            let hashed = ReplayCache::from_config(
                Arc::clone(&storage),
                &ReplayCacheConfig::new(Duration::from_secs(60))
                    .with_partition("hashed")
                    .with_key_encoding(KeyEncoding::Sha256),
            )
            .unwrap();

            for (issuer, message) in pairs.iter().chain(pairs.iter()) {
                prop_assert_eq!(
                    prefixed.is_replay(issuer, message).await.unwrap(),
                    hashed.is_replay(issuer, message).await.unwrap()
                );
            }
            Ok(())
        })?;
    }
}
