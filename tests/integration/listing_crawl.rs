//! Paging and correlating listings against a mock market

use crate::support::{executor, render_body};
use rust_decimal::Decimal;
use steam_market_client::market::{CrawlStop, ListingQuery, MarketClient, MarketError};
use steam_market_client::shutdown::ShutdownCoordinator;
use steam_market_client::Listing;
use tokio::sync::mpsc;
use wiremock::matchers::{header, method, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RENDER_PATH: &str = r"^/market/listings/730/[^/]+/render/$";

fn page(listing_ids: &[&str], total_count: Option<u64>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/json")
        .set_body_string(render_body(listing_ids, total_count))
}

async fn mount_page(server: &MockServer, start: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path_regex(RENDER_PATH))
        .and(query_param("start", start))
        .respond_with(response)
        .mount(server)
        .await;
}

fn drain(mut rx: mpsc::Receiver<Listing>) -> Vec<Listing> {
    let mut listings = Vec::new();
    while let Ok(listing) = rx.try_recv() {
        listings.push(listing);
    }
    listings
}

#[tokio::test]
async fn test_single_page_is_correlated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(RENDER_PATH))
        .and(query_param("count", "100"))
        .and(query_param("currency", "1"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(page(&["101"], None))
        .expect(1)
        .mount(&server)
        .await;

    let market = MarketClient::new(executor(&server, ""));
    let page = market
        .listings_page(730, "Chroma Case", 0, 100)
        .await
        .unwrap();

    assert!(!page.malformed);
    assert_eq!(page.len(), 1);
    let listing = &page.listings[0];
    assert_eq!(listing.listing_id, "101");
    assert_eq!(listing.name, "Chroma Case");
    assert_eq!(listing.app_id, 730);
    assert_eq!(listing.subtotal, 100);
    assert_eq!(listing.fee, 15);
    assert_eq!(listing.total(), 115);
    assert_eq!(listing.publisher_app_id, 730);
    assert!(listing.publisher_fee_percent > Decimal::ZERO);
}

#[tokio::test]
async fn test_item_name_is_percent_encoded_in_path() {
    let server = MockServer::start().await;
    let market = MarketClient::new(executor(&server, ""));

    let url = market.listings_url(730, "Chroma 2 Case", 10, 20).unwrap();
    assert_eq!(url.path(), "/market/listings/730/Chroma%202%20Case/render/");

    let url = market
        .listings_url(730, "AK-47 | Redline (Field-Tested)", 0, 10)
        .unwrap();
    assert_eq!(
        url.path(),
        "/market/listings/730/AK-47%20%7C%20Redline%20%28Field-Tested%29/render/"
    );
    assert!(url.query().unwrap().contains("start=10&count=20"));
}

#[tokio::test]
async fn test_crawl_pages_until_total() {
    let server = MockServer::start().await;
    mount_page(&server, "0", page(&["1", "2"], Some(3))).await;
    mount_page(&server, "2", page(&["3"], Some(3))).await;

    let market = MarketClient::new(executor(&server, ""));
    let (tx, rx) = mpsc::channel(64);
    let query = ListingQuery::new(730, "Chroma Case").page_size(2);

    let summary = market.crawl_listings(&query, tx).await.unwrap();

    assert_eq!(summary.stop, CrawlStop::Exhausted);
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.listings, 3);
    assert_eq!(summary.total_count, Some(3));
    let ids: Vec<String> = drain(rx).into_iter().map(|l| l.listing_id).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_crawl_skips_malformed_page() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "0",
        ResponseTemplate::new(200).set_body_string("<html>Sorry!</html>"),
    )
    .await;
    mount_page(&server, "2", page(&["3"], Some(3))).await;

    let market = MarketClient::new(executor(&server, ""));
    let (tx, rx) = mpsc::channel(64);
    let query = ListingQuery::new(730, "Chroma Case").page_size(2);

    let summary = market.crawl_listings(&query, tx).await.unwrap();

    assert_eq!(summary.skipped_pages, 1);
    assert_eq!(summary.listings, 1);
    assert_eq!(summary.stop, CrawlStop::Exhausted);
    assert_eq!(drain(rx)[0].listing_id, "3");
}

#[tokio::test]
async fn test_crawl_skips_rejected_page() {
    let server = MockServer::start().await;
    mount_page(&server, "0", ResponseTemplate::new(500)).await;
    mount_page(&server, "2", page(&["3"], Some(3))).await;

    let market = MarketClient::new(executor(&server, ""));
    let (tx, _rx) = mpsc::channel(64);
    let query = ListingQuery::new(730, "Chroma Case").page_size(2);

    let summary = market.crawl_listings(&query, tx).await.unwrap();
    assert_eq!(summary.skipped_pages, 1);
    assert_eq!(summary.listings, 1);
}

#[tokio::test]
async fn test_crawl_stops_on_empty_page() {
    let server = MockServer::start().await;
    mount_page(&server, "0", page(&["1", "2"], None)).await;
    mount_page(&server, "2", page(&[], None)).await;

    let market = MarketClient::new(executor(&server, ""));
    let (tx, _rx) = mpsc::channel(64);
    let query = ListingQuery::new(730, "Chroma Case").page_size(2);

    let summary = market.crawl_listings(&query, tx).await.unwrap();
    assert_eq!(summary.stop, CrawlStop::EmptyPage);
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.listings, 2);
}

#[tokio::test]
async fn test_crawl_respects_page_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(RENDER_PATH))
        .respond_with(page(&["1"], Some(1000)))
        .mount(&server)
        .await;

    let market = MarketClient::new(executor(&server, ""));
    let (tx, _rx) = mpsc::channel(64);
    let query = ListingQuery::new(730, "Chroma Case").page_size(1).max_pages(3);

    let summary = market.crawl_listings(&query, tx).await.unwrap();
    assert_eq!(summary.stop, CrawlStop::PageLimit);
    assert_eq!(summary.pages, 3);
}

#[tokio::test]
async fn test_exhausted_retries_stop_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(RENDER_PATH))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let market = MarketClient::new(executor(&server, ""));
    let (tx, _rx) = mpsc::channel(64);
    let query = ListingQuery::new(730, "Chroma Case");

    let error = market.crawl_listings(&query, tx).await.unwrap_err();
    assert!(error.is_fatal());
    assert!(matches!(error, MarketError::Http(_)));
}

#[tokio::test]
async fn test_shutdown_stops_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(page(&["1"], Some(10)))
        .expect(0)
        .mount(&server)
        .await;

    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();
    let market = MarketClient::new(executor(&server, "")).with_shutdown(shutdown);
    let (tx, _rx) = mpsc::channel(64);

    let summary = market
        .crawl_listings(&ListingQuery::new(730, "Chroma Case"), tx)
        .await
        .unwrap();
    assert_eq!(summary.stop, CrawlStop::Shutdown);
    assert_eq!(summary.pages, 0);
}

#[tokio::test]
async fn test_dropped_receiver_stops_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(RENDER_PATH))
        .respond_with(page(&["1", "2"], Some(100)))
        .mount(&server)
        .await;

    let market = MarketClient::new(executor(&server, ""));
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let summary = market
        .crawl_listings(&ListingQuery::new(730, "Chroma Case").page_size(2), tx)
        .await
        .unwrap();
    assert_eq!(summary.stop, CrawlStop::ReceiverClosed);
    assert_eq!(summary.pages, 1);
    assert_eq!(summary.listings, 0);
}

#[tokio::test]
async fn test_invalid_query_is_refused() {
    let server = MockServer::start().await;
    let market = MarketClient::new(executor(&server, ""));
    let (tx, _rx) = mpsc::channel(1);

    let error = market
        .crawl_listings(&ListingQuery::new(730, "Chroma Case").page_size(0), tx)
        .await
        .unwrap_err();
    assert!(matches!(error, MarketError::InvalidRequest(_)));
}
