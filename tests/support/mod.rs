//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use steam_market_client::http::{
    ClientConfig, RateBounds, RateGovernor, RequestExecutor, RetryPolicy, SessionStore,
};
use wiremock::MockServer;

/// Config against a mock server: no backoff, a governor that never slows the test.
pub fn test_config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::with_base_url(&server.uri()).unwrap();
    config.retry = RetryPolicy::immediate(5);
    config.rate = RateBounds {
        min: 0.1,
        max: 1000.0,
        initial: 1000.0,
    };
    config.watchdog_tick = Duration::from_millis(50);
    config
}

/// Executor over `config` with a session seeded from `cookies`.
pub fn executor_with(config: ClientConfig, cookies: &str) -> Arc<RequestExecutor> {
    let session = SessionStore::seeded(config.base_url.clone(), cookies);
    let governor = Arc::new(RateGovernor::new(config.rate));
    Arc::new(RequestExecutor::new(config, session, governor).unwrap())
}

/// Executor against `server` with a session seeded from `cookies`.
pub fn executor(server: &MockServer, cookies: &str) -> Arc<RequestExecutor> {
    executor_with(test_config(server), cookies)
}

/// One listing entry of a render response.
pub fn listing_entry(listing_id: &str, asset_id: &str, fee: u64) -> String {
    format!(
        r#""{listing_id}": {{
            "listingid": "{listing_id}",
            "steamid_lister": "76561198000000{listing_id}",
            "converted_price": 100,
            "converted_fee": {fee},
            "converted_steam_fee": 5,
            "converted_publisher_fee": 10,
            "publisher_fee_app": 730,
            "publisher_fee_percent": "0.100000001490116119",
            "asset": {{ "currency": 0, "appid": 730, "contextid": "2", "id": "{asset_id}", "amount": "1" }}
        }}"#
    )
}

/// One asset entry of a render response.
pub fn asset_entry(asset_id: &str) -> String {
    format!(
        r#""{asset_id}": {{
            "id": "{asset_id}",
            "classid": "310776560",
            "tradable": 1,
            "market_hash_name": "Chroma Case"
        }}"#
    )
}

/// Render response with one asset per listing id (fee 15).
pub fn render_body(listing_ids: &[&str], total_count: Option<u64>) -> String {
    let listings: Vec<String> = listing_ids
        .iter()
        .map(|id| listing_entry(id, &format!("9{id}"), 15))
        .collect();
    let assets: Vec<String> = listing_ids
        .iter()
        .map(|id| asset_entry(&format!("9{id}")))
        .collect();
    let total = total_count
        .map(|total| format!(r#""total_count": {total},"#))
        .unwrap_or_default();

    let listinginfo = if listings.is_empty() {
        "[]".to_string()
    } else {
        format!("{{ {} }}", listings.join(","))
    };
    let assets = if assets.is_empty() {
        "[]".to_string()
    } else {
        format!(r#"{{ "730": {{ "2": {{ {} }} }} }}"#, assets.join(","))
    };

    format!(
        r#"{{
            "success": true,
            "start": 0,
            {total}
            "results_html": "<div class=\"market_listing_row\"></div>",
            "listinginfo": {listinginfo},
            "assets": {assets},
            "currency": [],
            "hovers": ""
        }}"#
    )
}
