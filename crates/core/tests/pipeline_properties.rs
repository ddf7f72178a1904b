//! End-to-end checks of the pipeline's core guarantees: dispatch order,
//! deduplication, cache expiry and eviction, backoff, load shedding and tag
//! invalidation.

mod support;

use std::sync::Arc;
use std::time::Duration;

use courier_common::time::MockClock;
use courier_core::EntryOptions;
use courier_domain::{CacheOptions, CacheStrategy, ErrorKind, Priority, RequestOptions};
use support::{builder, client, test_config, MockTransport, Reply};

fn cached_with_tags(tags: &[&str]) -> RequestOptions {
    RequestOptions::new()
        .with_cache(CacheOptions::new(CacheStrategy::CacheFirst).with_tags(tags.iter().copied()))
}

/// Validates dispatch ordering for the single-slot scenario.
///
/// Assertions:
/// - Confirms requests queued as LOW, HIGH, NORMAL reach the transport as
///   HIGH, NORMAL, LOW.
#[tokio::test(start_paused = true)]
async fn dispatch_follows_priority_then_arrival() {
    let transport = Arc::new(MockTransport::new());
    let mut config = test_config();
    config.scheduler.max_concurrency = 1;
    let client = builder(config, &transport).build().unwrap();
    client.pause();

    let mut tasks = Vec::new();
    for (url, priority) in [("/low", Priority::Low), ("/high", Priority::High), ("/normal", Priority::Normal)] {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client.get(url, RequestOptions::new().with_priority(priority)).await
        }));
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(client.status().queue_length, 3);

    client.resume(None);
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(transport.urls(), vec!["/high", "/normal", "/low"]);
}

/// Validates deduplication for the concurrent identical GET scenario.
///
/// Assertions:
/// - Confirms five concurrent calls reach the transport once.
/// - Confirms every caller receives the same shared response.
/// - Confirms four callers are counted as deduplicated.
#[tokio::test(start_paused = true)]
async fn concurrent_identical_requests_share_one_execution() {
    let transport = Arc::new(MockTransport::with_delay(Duration::from_millis(50)));
    let client = client(&transport);

    let results = futures::future::join_all(
        (0..5).map(|_| client.get("/feed", RequestOptions::new())),
    )
    .await;

    assert_eq!(transport.call_count("/feed"), 1);
    let first = results[0].as_ref().unwrap().clone();
    for result in &results {
        assert!(Arc::ptr_eq(result.as_ref().unwrap(), &first));
    }
    assert_eq!(client.status().stats.deduplicated, 4);
    assert_eq!(client.status().stats.enqueued, 1);
}

/// Validates deduplication for the slow upstream scenario.
///
/// Assertions:
/// - Confirms an identical GET issued 1.5s into a 2s call joins it rather
///   than starting a second transport call.
/// - Confirms both callers receive the same shared response.
#[tokio::test(start_paused = true)]
async fn slow_request_is_joined_after_grace_period() {
    let transport = Arc::new(MockTransport::with_delay(Duration::from_secs(2)));
    let client = client(&transport);

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.get("/slow", RequestOptions::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let second = client.get("/slow", RequestOptions::new()).await.unwrap();

    assert_eq!(transport.call_count("/slow"), 1);
    assert!(Arc::ptr_eq(&second, &first.await.unwrap().unwrap()));
    assert_eq!(client.status().stats.deduplicated, 1);
}

/// Validates lazy TTL expiry for the short-lived entry scenario.
///
/// Assertions:
/// - Confirms an entry written with a 10ms ttl is gone after 15ms for both
///   `get` and `has`.
#[tokio::test]
async fn expired_entries_are_never_returned() {
    let clock = MockClock::new();
    let transport = Arc::new(MockTransport::new());
    let client = builder(test_config(), &transport).clock(clock.shared()).build().unwrap();
    let cache = client.cache();

    cache
        .set("a", b"1".to_vec(), EntryOptions::new().with_ttl(Duration::from_millis(10)))
        .await
        .unwrap();
    assert_eq!(cache.get("a").await, Some(b"1".to_vec()));

    clock.advance(Duration::from_millis(15));

    assert_eq!(cache.get("a").await, None);
    assert!(!cache.has("a").await);
    assert_eq!(client.cache_stats().expirations, 1);
}

/// Validates LRU eviction for the two-entry memory tier scenario.
///
/// Assertions:
/// - Confirms reading `a` before inserting `c` makes `b` the victim.
#[tokio::test]
async fn full_memory_tier_evicts_least_recently_used() {
    let clock = MockClock::new();
    let transport = Arc::new(MockTransport::new());
    let mut config = test_config();
    config.cache.max_memory_items = 2;
    let client = builder(config, &transport).clock(clock.shared()).build().unwrap();
    let cache = client.cache();

    cache.set("a", b"a".to_vec(), EntryOptions::new()).await.unwrap();
    clock.advance(Duration::from_millis(1));
    cache.set("b", b"b".to_vec(), EntryOptions::new()).await.unwrap();
    clock.advance(Duration::from_millis(1));
    assert!(cache.get("a").await.is_some());
    clock.advance(Duration::from_millis(1));
    cache.set("c", b"c".to_vec(), EntryOptions::new()).await.unwrap();

    assert!(cache.has("a").await);
    assert!(!cache.has("b").await);
    assert!(cache.has("c").await);
    assert_eq!(client.cache_stats().evictions, 1);
}

/// Validates exponential backoff for the recovering upstream scenario.
///
/// Assertions:
/// - Confirms three 503s followed by a 200 succeed within `max_retries = 3`.
/// - Confirms the gaps between attempts are 100, 200 and 400ms.
/// - Confirms three retries are counted.
#[tokio::test(start_paused = true)]
async fn retries_back_off_exponentially_until_success() {
    let transport = Arc::new(MockTransport::new());
    transport.script("/flaky", [Reply::status(503), Reply::status(503), Reply::status(503)]);
    transport.script("/flaky", [Reply::body("recovered")]);
    let client = client(&transport);

    let response = client.get("/flaky", RequestOptions::new()).await.unwrap();

    assert_eq!(response.text().unwrap(), "recovered");
    assert_eq!(transport.call_count("/flaky"), 4);
    let gaps = transport.gaps("/flaky");
    for (gap, expected) in gaps.iter().zip([100u64, 200, 400]) {
        let expected = Duration::from_millis(expected);
        assert!(
            *gap >= expected && *gap < expected + Duration::from_millis(5),
            "gap {gap:?} should be about {expected:?}"
        );
    }
    assert_eq!(client.status().stats.retried, 3);
}

/// Validates load shedding for the full queue scenario.
///
/// Assertions:
/// - Ensures the second request fails with `QueueOverflow` without waiting.
/// - Ensures the rejected request never appears in the queue.
#[tokio::test(start_paused = true)]
async fn full_queue_rejects_new_requests() {
    let transport = Arc::new(MockTransport::new());
    let mut config = test_config();
    config.scheduler.max_queue_size = 1;
    let client = builder(config, &transport).build().unwrap();
    client.pause();

    let queued = {
        let client = client.clone();
        tokio::spawn(async move { client.get("/first", RequestOptions::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    let err = client.get("/second", RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::QueueOverflow);
    assert!(!err.retryable());
    let urls: Vec<String> = client.queued_requests().into_iter().map(|s| s.url).collect();
    assert_eq!(urls, vec!["/first"]);
    assert_eq!(client.status().stats.rejected, 1);

    client.resume(None);
    assert!(queued.await.unwrap().is_ok());
    assert_eq!(transport.urls(), vec!["/first"]);
}

/// Validates tag invalidation for the mixed tag scenario.
///
/// Assertions:
/// - Confirms deleting `homework` removes both homework entries.
/// - Confirms the `chat` entry survives.
#[tokio::test]
async fn delete_by_tags_removes_only_matching_entries() {
    let transport = Arc::new(MockTransport::new());
    let client = client(&transport);

    client.get("/homework/1", cached_with_tags(&["homework"])).await.unwrap();
    client.get("/homework/2", cached_with_tags(&["homework", "math"])).await.unwrap();
    client.get("/chat/1", cached_with_tags(&["chat"])).await.unwrap();

    let removed = client.delete_by_tags(&["homework"]).await.unwrap();

    assert_eq!(removed, 2);
    let cache = client.cache();
    assert!(!cache.has("GET:/homework/1").await);
    assert!(!cache.has("GET:/homework/2").await);
    assert!(cache.has("GET:/chat/1").await);
    assert_eq!(cache.memory_len(), 1);
}
