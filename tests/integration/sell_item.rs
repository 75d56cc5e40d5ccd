//! Selling items against a mock market

use crate::support::executor;
use steam_market_client::http::HttpError;
use steam_market_client::market::{MarketClient, MarketError};
use steam_market_client::InventoryItem;
use wiremock::matchers::{body_string, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn item() -> InventoryItem {
    InventoryItem {
        asset_id: "23851264931".to_string(),
        context_id: 2,
        instance_id: "0".to_string(),
        app_id: 730,
        market_hash_name: "Chroma Case".to_string(),
        marketable: true,
    }
}

#[tokio::test]
async fn test_sell_returns_receipt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/market/sellitem/"))
        .and(body_string(
            "appid=730&contextid=2&assetid=23851264931&amount=1&price=250&sessionid=abc123",
        ))
        .and(header_regex("referer", "/my/inventory/$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"success":true,"requires_confirmation":1,"needs_mobile_confirmation":true,"needs_email_confirmation":false,"email_domain":""}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let market = MarketClient::new(executor(&server, "sessionid=abc123"));
    let receipt = market.sell_item(&item(), 250).await.unwrap();

    assert!(receipt.requires_confirmation);
    assert!(receipt.needs_mobile_confirmation);
    assert!(!receipt.needs_email_confirmation);
}

#[tokio::test]
async fn test_sell_of_missing_item_is_flagged() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/market/sellitem/"))
        .respond_with(ResponseTemplate::new(502).set_body_string(
            r#"{"success":false,"message":"The item specified is no longer in your inventory or is not allowed to be traded on the Community Market."}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let market = MarketClient::new(executor(&server, "sessionid=abc123"));
    match market.sell_item(&item(), 250).await {
        Err(MarketError::Sell(e)) => assert!(e.item_not_in_inventory),
        other => panic!("expected Sell error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sell_refusal_keeps_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/market/sellitem/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"success":false,"message":"You already have a listing for this item pending confirmation."}"#,
        ))
        .mount(&server)
        .await;

    let market = MarketClient::new(executor(&server, "sessionid=abc123"));
    match market.sell_item(&item(), 250).await {
        Err(MarketError::Sell(e)) => {
            assert!(!e.item_not_in_inventory);
            assert!(e.message.contains("pending confirmation"));
        }
        other => panic!("expected Sell error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sell_without_session_is_refused() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let market = MarketClient::new(executor(&server, "steamLoginSecure=abc"));
    let error = market.sell_item(&item(), 250).await.unwrap_err();

    assert!(matches!(
        error,
        MarketError::Http(HttpError::MissingSession { .. })
    ));
    assert!(error.is_fatal());
}

#[tokio::test]
async fn test_sell_validates_input() {
    let server = MockServer::start().await;
    let market = MarketClient::new(executor(&server, "sessionid=abc123"));

    let error = market.sell_item(&item(), 0).await.unwrap_err();
    assert!(matches!(error, MarketError::InvalidRequest(_)));

    let mut bad = item();
    bad.asset_id = "not-a-number".to_string();
    let error = market.sell_item(&bad, 250).await.unwrap_err();
    assert!(matches!(error, MarketError::InvalidRequest(_)));
}
