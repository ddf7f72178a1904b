//! Integration tests for the pipeline over the real HTTP and filesystem
//! adapters.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use courier_common::codec::{CompressionAlgorithm, CompressionCodec};
use courier_domain::{CacheOptions, CacheStrategy, ErrorKind, RequestOptions, RetryPolicy};
use courier_infra::{FileStore, ManualConnectivity};
use support::{builder_for, CountingCredentials};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Validates the happy path for the JSON GET scenario.
///
/// Assertions:
/// - Confirms a relative url is resolved against `http.base_url`.
/// - Confirms the body decodes as JSON.
/// - Ensures a request id header is attached.
#[tokio::test]
async fn get_resolves_base_url_and_decodes_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lessons"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[1,2,3]"))
        .expect(1)
        .mount(&server)
        .await;
    let client = builder_for(&server).build().unwrap();

    let response = client.get("/lessons", RequestOptions::new()).await.unwrap();

    assert_eq!(response.json::<Vec<u32>>().unwrap(), vec![1, 2, 3]);
    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("x-request-id").is_some());
}

/// Validates retries for the flaky upstream scenario.
///
/// Assertions:
/// - Confirms two 503s followed by a 200 succeed.
/// - Confirms the server sees exactly three requests and two are counted as
///   retries.
#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    Mock::given(method("GET"))
        .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200).set_body_string("ready")
            }
        })
        .expect(3)
        .mount(&server)
        .await;
    let client = builder_for(&server).build().unwrap();

    let response = client.get("/report", RequestOptions::new()).await.unwrap();

    assert_eq!(response.text().unwrap(), "ready");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(client.status().stats.retried, 2);
}

/// Validates error classification for the missing resource scenario.
///
/// Assertions:
/// - Ensures a 404 surfaces as a non-retryable `Validation` error with its
///   status.
/// - Ensures it is sent only once.
#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such lesson"))
        .expect(1)
        .mount(&server)
        .await;
    let client = builder_for(&server).build().unwrap();

    let err = client.get("/lessons/99", RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.status_code(), Some(404));
    assert!(err.message().contains("no such lesson"));
}

/// Validates credential refresh for the expired session scenario.
///
/// Assertions:
/// - Confirms a 401 for `token-0` triggers one refresh.
/// - Confirms the replay carries `token-1` and succeeds.
#[tokio::test]
async fn unauthorized_response_refreshes_and_replays() {
    let server = MockServer::start().await;
    Mock::given(header("authorization", "Bearer token-0"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("grades"))
        .expect(1)
        .mount(&server)
        .await;
    let credentials = Arc::new(CountingCredentials::default());
    let client = builder_for(&server).credentials(credentials.clone()).build().unwrap();

    let response = client.get("/grades", RequestOptions::new()).await.unwrap();

    assert_eq!(response.text().unwrap(), "grades");
    assert_eq!(credentials.refreshes(), 1);
}

/// Validates offline fail-fast for the disconnected device scenario.
///
/// Assertions:
/// - Ensures a NORMAL request fails with a non-retryable `Network` error.
/// - Ensures nothing reaches the server until the link comes back.
#[tokio::test]
async fn offline_device_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let connectivity = Arc::new(ManualConnectivity::new(false));
    let client = builder_for(&server).connectivity(connectivity.clone()).build().unwrap();

    let err = client.get("/feed", RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(!err.retryable());
    assert!(server.received_requests().await.unwrap().is_empty());

    connectivity.set_online(true);
    assert!(client.get("/feed", RequestOptions::new()).await.is_ok());
}

/// Validates the per-request timeout for the stalled upstream scenario.
///
/// Assertions:
/// - Ensures a 50ms timeout against a 1s response fails with `Timeout`.
#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(1)))
        .mount(&server)
        .await;
    let client = builder_for(&server).build().unwrap();
    let options = RequestOptions::new()
        .with_timeout(Duration::from_millis(50))
        .with_retry(RetryPolicy::none());

    let err = client.get("/slow", options).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
}

/// Validates the file-backed persistent tier for the app restart scenario.
///
/// Assertions:
/// - Confirms a second client over the same directory answers from disk.
/// - Confirms the server is called once in total.
#[tokio::test]
async fn file_store_serves_cached_response_after_restart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/syllabus"))
        .respond_with(ResponseTemplate::new(200).set_body_string("chapter 1"))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let codec = Arc::new(CompressionCodec::new(CompressionAlgorithm::Gzip, 6));
    let options =
        RequestOptions::new().with_cache(CacheOptions::new(CacheStrategy::PersistentOnly));

    let first = builder_for(&server)
        .persistent_store(Arc::new(FileStore::open(dir.path()).await.unwrap()))
        .codec(codec.clone())
        .build()
        .unwrap();
    first.get("/syllabus", options.clone()).await.unwrap();
    first.shutdown();

    let second = builder_for(&server)
        .persistent_store(Arc::new(FileStore::open(dir.path()).await.unwrap()))
        .codec(codec)
        .build()
        .unwrap();
    let cached = second.get("/syllabus", options).await.unwrap();

    assert_eq!(cached.text().unwrap(), "chapter 1");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
