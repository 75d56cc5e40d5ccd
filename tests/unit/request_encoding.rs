//! Form encoding of market requests

use steam_market_client::http::{MarketRequest, Method};
use url::Url;

fn sell_url() -> Url {
    Url::parse("https://steamcommunity.com/market/sellitem/").unwrap()
}

#[test]
fn test_form_keeps_field_order() {
    let request = MarketRequest::post(
        sell_url(),
        [("appid", "730"), ("contextid", "2"), ("assetid", "1"), ("amount", "1")],
    );
    assert_eq!(
        request.encode_form(None),
        "appid=730&contextid=2&assetid=1&amount=1"
    );
    assert_eq!(request.method(), Method::Post);
    assert!(request.options().ajax);
}

#[test]
fn test_values_are_encoded() {
    let request = MarketRequest::post(sell_url(), [("q", "AK-47 | Redline"), ("a", "x&y=z")]);
    assert_eq!(request.encode_form(None), "q=AK-47+%7C+Redline&a=x%26y%3Dz");
}

#[test]
fn test_pre_encoded_values_pass_through() {
    let request = MarketRequest::post(sell_url(), [("q", "AK-47%20%7C%20Redline")]).reencode(false);
    assert_eq!(request.encode_form(None), "q=AK-47+|+Redline");
}

#[test]
fn test_session_token_is_appended_last() {
    let request = MarketRequest::post(sell_url(), [("appid", "730")]).session_required(true);
    assert_eq!(request.encode_form(Some("abc")), "appid=730&sessionid=abc");

    let open = MarketRequest::post(sell_url(), [("appid", "730")]);
    assert_eq!(open.encode_form(Some("abc")), "appid=730");
}

#[test]
fn test_read_request_defaults() {
    let read = MarketRequest::get(sell_url());
    assert!(!read.is_write());
    assert!(read.form().is_empty());
    assert!(!read.options().ajax);
    assert!(read.referer_header().is_none());

    let read = read.referer("https://steamcommunity.com/market/listings/730/x");
    assert_eq!(
        read.referer_header(),
        Some("https://steamcommunity.com/market/listings/730/x")
    );
}
