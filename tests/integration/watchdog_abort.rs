//! Watchdog aborts of stalled attempts

use crate::support::{executor_with, test_config};
use std::time::{Duration, Instant};
use steam_market_client::http::{HttpError, MarketRequest, RetryPolicy, TextHandler};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_stalled_attempt_is_aborted_and_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/market/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/market/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fast"))
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.request_timeout = Duration::from_millis(200);
    let executor = executor_with(config, "");
    let url = executor.config().endpoint("/market/").unwrap();

    let started = Instant::now();
    let body = executor
        .execute(&MarketRequest::get(url), &mut TextHandler)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(body, "fast");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(executor.watchdog().in_flight(), 0);
    // Aborts do not lower the rate; the final success raises it to the ceiling
    assert!((executor.governor().rate() - 1000.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_every_attempt_stalls() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/market/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.request_timeout = Duration::from_millis(150);
    config.retry = RetryPolicy::immediate(2);
    let executor = executor_with(config, "");
    let url = executor.config().endpoint("/market/").unwrap();

    let result = executor
        .execute(&MarketRequest::get(url), &mut TextHandler)
        .await;

    match result {
        Err(HttpError::ServiceUnavailable { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected ServiceUnavailable, got {other:?}"),
    }
    assert_eq!(executor.watchdog().in_flight(), 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_fast_requests_leave_registry_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let executor = executor_with(test_config(&server), "");
    for _ in 0..3 {
        let url = executor.config().endpoint("/market/").unwrap();
        executor
            .execute(&MarketRequest::get(url), &mut TextHandler)
            .await
            .unwrap()
            .unwrap();
    }
    assert_eq!(executor.watchdog().in_flight(), 0);
}
