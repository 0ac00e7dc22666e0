use std::time::Duration;

use tokio_util::sync::CancellationToken;
use watchpost_client::{ReqwestFetcher, TextCleaner};
use watchpost_core::{AppError, Cleaner, FetchResult, Fetcher, RequestPolicy, RetryingFetcher};

use crate::integration::common::{AVAILABLE_PAGE, closed_port_url, spawn_server};

fn fast_policy() -> RequestPolicy {
    RequestPolicy {
        timeout: Duration::from_secs(2),
        inter_request_delay: Duration::ZERO,
        max_retries: 3,
        backoff_base: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn fetch_returns_body() {
    let server = spawn_server().await;
    let fetcher = ReqwestFetcher::new();

    let body = fetcher.fetch(&server.url("/listing")).await.unwrap();
    assert_eq!(body, AVAILABLE_PAGE);
    fetcher.close().await;
}

#[tokio::test]
async fn fetched_html_cleans_to_visible_text() {
    let server = spawn_server().await;
    let fetcher = ReqwestFetcher::new();

    let body = fetcher.fetch(&server.url("/listing")).await.unwrap();
    let text = TextCleaner::new().clean(&body).unwrap();
    assert_eq!(text, "Unit 4 Riverside Only 2 Bed left");
}

#[tokio::test]
async fn server_error_is_retryable_status() {
    let server = spawn_server().await;
    let fetcher = ReqwestFetcher::new();

    let err = fetcher.fetch(&server.url("/unavailable")).await.unwrap_err();
    assert!(matches!(err, AppError::HttpStatus { status: 503, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn not_found_is_reported_with_status() {
    let server = spawn_server().await;
    let url = server.url("/missing");
    let fetcher = ReqwestFetcher::new();

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert!(matches!(err, AppError::HttpStatus { status: 404, .. }));
    assert_eq!(
        err.describe_failure(&url),
        format!("HTTP 404 error occurred while checking {url}")
    );
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    let url = closed_port_url().await;
    let fetcher = ReqwestFetcher::new();

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert!(matches!(err, AppError::Network(_)), "unexpected error: {err:?}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = spawn_server().await;
    let fetcher = ReqwestFetcher::with_timeout(Duration::from_millis(200));

    let err = fetcher.fetch(&server.url("/slow")).await.unwrap_err();
    assert!(
        matches!(err, AppError::Timeout(after) if after == Duration::from_millis(200)),
        "unexpected error: {err:?}"
    );
    assert_eq!(err.to_string(), "Request timed out after 200ms");
}

#[tokio::test]
async fn retrying_fetcher_recovers_from_flaky_server() {
    let server = spawn_server().await;
    let fetcher = RetryingFetcher::new(ReqwestFetcher::new(), fast_policy());

    let result = fetcher
        .fetch(&server.url("/flaky"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(result, FetchResult::Content(ref body) if body == AVAILABLE_PAGE));
    assert_eq!(server.state.flaky_hits.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retrying_fetcher_gives_up_on_persistent_errors() {
    let server = spawn_server().await;
    let fetcher = RetryingFetcher::new(ReqwestFetcher::new(), fast_policy());

    let result = fetcher
        .fetch(&server.url("/unavailable"), &CancellationToken::new())
        .await
        .unwrap();

    match result {
        FetchResult::Failure(failure) => {
            assert_eq!(failure.attempts, 3);
            assert!(matches!(failure.error, AppError::HttpStatus { status: 503, .. }));
        }
        FetchResult::Content(_) => panic!("expected a failure"),
    }
}
