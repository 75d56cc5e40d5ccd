//! Retry behavior of the request executor against a mock market

use crate::support::{executor, executor_with, test_config};
use std::net::TcpListener;
use steam_market_client::http::{HttpError, MarketRequest, TextHandler};
use wiremock::matchers::{body_string, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn get_market(server: &MockServer, cookies: &str) -> (Result<String, HttpError>, f64) {
    let executor = executor(server, cookies);
    let url = executor.config().endpoint("/market/").unwrap();
    let result = executor
        .execute(&MarketRequest::get(url), &mut TextHandler)
        .await
        .and_then(|inner| inner);
    (result, executor.governor().rate())
}

#[tokio::test]
async fn test_throttled_five_times_then_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/market/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(5)
        .expect(5)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/market/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("market"))
        .expect(1)
        .mount(&server)
        .await;

    let (result, _) = get_market(&server, "").await;
    assert_eq!(result.unwrap(), "market");
    assert_eq!(server.received_requests().await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_always_throttled_is_service_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/market/"))
        .respond_with(ResponseTemplate::new(429))
        .expect(6)
        .mount(&server)
        .await;

    let (result, rate) = get_market(&server, "").await;
    match result {
        Err(HttpError::ServiceUnavailable { attempts, url }) => {
            assert_eq!(attempts, 6);
            assert!(url.ends_with("/market/"));
        }
        other => panic!("expected ServiceUnavailable, got {other:?}"),
    }
    // Six throttles, no successes
    assert!((rate - 1000.0 * 0.95f64.powi(6)).abs() < 1e-6);
}

#[tokio::test]
async fn test_client_error_goes_to_handler_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/market/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .expect(1)
        .mount(&server)
        .await;

    let (result, _) = get_market(&server, "").await;
    match result {
        Err(HttpError::Rejected { status, body }) => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(body, "gone");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/market/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let (result, _) = get_market(&server, "").await;
    assert!(matches!(result, Err(HttpError::Rejected { .. })));
}

#[tokio::test]
async fn test_governor_feedback() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/market/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/market/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (result, rate) = get_market(&server, "").await;
    assert!(result.is_ok());
    // Two throttles then one success: 1000 * 0.95 * 0.95 * 1.05
    assert!((rate - 947.625).abs() < 1e-6, "rate was {rate}");
}

#[tokio::test]
async fn test_rejection_still_raises_rate() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let executor = executor(&server, "");
    executor.governor().record_throttled();
    let before = executor.governor().rate();

    let url = executor.config().endpoint("/market/").unwrap();
    let _ = executor
        .execute(&MarketRequest::get(url), &mut TextHandler)
        .await
        .unwrap();

    assert!((executor.governor().rate() - before * 1.05).abs() < 1e-6);
}

#[tokio::test]
async fn test_missing_session_sends_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let executor = executor(&server, "steamLoginSecure=abc");
    let url = executor.config().endpoint("/market/sellitem/").unwrap();
    let request = MarketRequest::post(url, [("appid", "730")]).session_required(true);

    let result = executor.execute(&request, &mut TextHandler).await;
    match result {
        Err(HttpError::MissingSession { url }) => assert!(url.ends_with("/market/sellitem/")),
        other => panic!("expected MissingSession, got {other:?}"),
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_post_form_and_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/market/sellitem/"))
        .and(body_string("appid=730&contextid=2&sessionid=abc123"))
        .and(header(
            "content-type",
            "application/x-www-form-urlencoded; charset=UTF-8",
        ))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(header("x-prototype-version", "1.7"))
        .and(header_regex("cookie", "sessionid=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let executor = executor(&server, "sessionid=abc123");
    let url = executor.config().endpoint("/market/sellitem/").unwrap();
    let request =
        MarketRequest::post(url, [("appid", "730"), ("contextid", "2")]).session_required(true);

    let body = executor
        .execute(&request, &mut TextHandler)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_default_referer_and_host() {
    let server = MockServer::start().await;
    let config = test_config(&server);
    let referer = format!("{}/market/", config.origin());

    Mock::given(method("GET"))
        .and(path("/market/"))
        .and(header("referer", referer.as_str()))
        .and(header("host", config.host_header().as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let executor = executor_with(config, "");
    let url = executor.config().endpoint("/market/").unwrap();
    executor
        .execute(&MarketRequest::get(url), &mut TextHandler)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_refused_connection_exhausts_retries() {
    // Bind then release a port so nothing is listening on it
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let server = MockServer::start().await;
    let mut config = test_config(&server);
    config.base_url = format!("http://127.0.0.1:{port}").parse().unwrap();

    let executor = executor_with(config, "");
    let url = executor.config().endpoint("/market/").unwrap();
    let result = executor
        .execute(&MarketRequest::get(url), &mut TextHandler)
        .await;

    match result {
        Err(HttpError::ServiceUnavailable { attempts, .. }) => assert_eq!(attempts, 6),
        other => panic!("expected ServiceUnavailable, got {other:?}"),
    }
    // Connection faults do not feed the governor
    assert!((executor.governor().rate() - 1000.0).abs() < 1e-6);
}
