//! Concurrency tests for the replay cache.
//!
//! A slow storage read widens the window between lookup and recording so
//! that racing tasks really do overlap.

use std::sync::Arc;
use std::time::Duration;

use vigil_test_utils::*;

const TASKS: usize = 32;

async fn race_same_message(
    cache: Arc<ReplayCache<FlakyStorage<ReplayCacheEntry>>>,
    tasks: usize,
) -> Vec<bool> {
    let mut handles = Vec::with_capacity(tasks);
    for _ in 0..tasks {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            cache
                .is_replay("https://idp.example.org/idp", "_race")
                .await
                .expect("is_replay should succeed")
        }));
    }

    let mut results = Vec::with_capacity(tasks);
    for handle in handles {
        results.push(handle.await.expect("task should not panic"));
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_sightings_yield_exactly_one_fresh_verdict() {
    let storage = Arc::new(FlakyStorage::new().with_read_delay(Duration::from_millis(5)));
    let fixture = ReplayFixture::with_storage(storage, Duration::from_secs(60))
        .expect("fixture should build");
    let cache = Arc::new(fixture.cache);

    let results = race_same_message(Arc::clone(&cache), TASKS).await;

    let fresh = results.iter().filter(|replay| !**replay).count();
    assert_eq!(fresh, 1, "exactly one task may see a first sighting");
    assert_eq!(results.len() - fresh, TASKS - 1);

    let stats = cache.stats();
    assert_eq!(stats.checks, TASKS as u64);
    assert_eq!(stats.fresh_sightings, 1);
    assert_eq!(stats.replays_detected, (TASKS - 1) as u64);
    assert_eq!(fixture.storage.write_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_messages_are_all_fresh() {
    let storage = Arc::new(FlakyStorage::new().with_read_delay(Duration::from_millis(1)));
    let fixture = ReplayFixture::with_storage(storage, Duration::from_secs(60))
        .expect("fixture should build");
    let cache = Arc::new(fixture.cache);

    let mut handles = Vec::with_capacity(TASKS);
    for i in 0..TASKS {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            cache
                .is_replay("https://idp.example.org/idp", &format!("_msg{}", i))
                .await
                .expect("is_replay should succeed")
        }));
    }

    for handle in handles {
        assert!(!handle.await.expect("task should not panic"));
    }
    assert_eq!(fixture.storage.inner().len(), TASKS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn replays_after_the_race_are_detected() {
    let storage = Arc::new(FlakyStorage::new());
    let fixture = ReplayFixture::with_storage(storage, Duration::from_secs(60))
        .expect("fixture should build");
    let cache = Arc::new(fixture.cache);

    race_same_message(Arc::clone(&cache), 8).await;

    let again = race_same_message(Arc::clone(&cache), 8).await;
    assert!(again.iter().all(|replay| *replay));
}

#[tokio::test]
async fn caches_sharing_a_partition_see_each_others_sightings() {
    let storage = Arc::new(InMemoryStorageService::<ReplayCacheEntry>::new());
    let first = ReplayCache::new(Arc::clone(&storage), Duration::from_secs(60))
        .expect("cache should build");
    let second = ReplayCache::new(Arc::clone(&storage), Duration::from_secs(60))
        .expect("cache should build");

    assert!(!first.is_replay("issuer", "msg").await.unwrap());
    assert!(second.is_replay("issuer", "msg").await.unwrap());
}

#[tokio::test]
async fn caches_on_different_partitions_are_independent() {
    let storage = Arc::new(InMemoryStorageService::<ReplayCacheEntry>::new());
    let sp_a = ReplayCache::new_in_partition(
        Arc::clone(&storage),
        Some("sp-a"),
        Duration::from_secs(60),
    )
    .expect("cache should build");
    let sp_b = ReplayCache::new_in_partition(
        Arc::clone(&storage),
        Some("sp-b"),
        Duration::from_secs(60),
    )
    .expect("cache should build");

    assert!(!sp_a.is_replay("issuer", "msg").await.unwrap());
    assert!(!sp_b.is_replay("issuer", "msg").await.unwrap());
    assert!(sp_a.is_replay("issuer", "msg").await.unwrap());
    assert!(sp_b.is_replay("issuer", "msg").await.unwrap());

    let partitions = storage.partitions().await.unwrap();
    assert_eq!(partitions, vec!["sp-a", "sp-b"]);
}
