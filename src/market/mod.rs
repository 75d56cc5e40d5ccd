//! Market operations
//!
//! [`MarketClient`] wraps a shared [`RequestExecutor`] with the market's
//! endpoints: listing pages, full listing crawls and selling an inventory item.

use reqwest::StatusCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::http::{HttpError, MarketRequest, RequestExecutor};
use crate::metrics::CrawlMetrics;
use crate::shutdown::{self, SharedShutdown};
use crate::{url_name, InventoryItem, Listing};

pub mod handlers;
pub mod listing_parser;

pub use handlers::{ListingPageHandler, SellHandler, SellReceipt};
pub use listing_parser::{parse_listings, try_parse_listings, ListingPage};

/// Listings per page requested by default; the market caps it at 100
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper bound on pages fetched by one crawl
pub const MAX_PAGES: u32 = 10_000;

/// Text the market uses when the asset to sell is gone
const NOT_IN_INVENTORY: &str = "is no longer in your inventory";

/// Market errors
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// Request layer error
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Market answered with an error status
    #[error("market rejected request with status {status}: {message}")]
    Rejected {
        /// Status returned
        status: StatusCode,
        /// Body returned
        message: String,
    },

    /// Sell refused
    #[error(transparent)]
    Sell(#[from] SellError),

    /// Request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl MarketError {
    /// Whether a crawl must stop on this error rather than skip the page
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Http(e) => matches!(
                e,
                HttpError::ServiceUnavailable { .. }
                    | HttpError::MissingSession { .. }
                    | HttpError::PoolClosed
                    | HttpError::Config(_)
            ),
            Self::InvalidRequest(_) => true,
            Self::Rejected { .. } | Self::Sell(_) => false,
        }
    }
}

/// Result type for market operations
pub type MarketResult<T> = Result<T, MarketError>;

/// A sell refused by the market.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sell failed: {message}")]
pub struct SellError {
    /// Message returned by the market
    pub message: String,
    /// The asset is no longer in the inventory
    pub item_not_in_inventory: bool,
}

impl SellError {
    /// Classify a market message.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let item_not_in_inventory = message.contains(NOT_IN_INVENTORY);
        Self {
            message,
            item_not_in_inventory,
        }
    }
}

/// What to crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    /// App the item belongs to
    pub app_id: u32,
    /// Market hash name
    pub market_hash_name: String,
    /// Offset of the first listing
    pub start: u32,
    /// Listings per page
    pub page_size: u32,
    /// Stop after this many pages
    pub max_pages: Option<u32>,
}

impl ListingQuery {
    /// Crawl every listing of one item.
    pub fn new(app_id: u32, market_hash_name: impl Into<String>) -> Self {
        Self {
            app_id,
            market_hash_name: market_hash_name.into(),
            start: 0,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
        }
    }

    /// Page size to request.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Page limit.
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Offset to start from.
    pub fn start(mut self, start: u32) -> Self {
        self.start = start;
        self
    }

    /// Validate query parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.market_hash_name.is_empty() {
            return Err("Market hash name cannot be empty".to_string());
        }
        if self.page_size == 0 || self.page_size > DEFAULT_PAGE_SIZE {
            return Err(format!(
                "Page size must be between 1 and {DEFAULT_PAGE_SIZE}, got {}",
                self.page_size
            ));
        }
        Ok(())
    }
}

/// Why a crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrawlStop {
    /// Offset reached the reported total
    #[default]
    Exhausted,
    /// A page came back without listings and no total was known
    EmptyPage,
    /// Page limit reached
    PageLimit,
    /// Shutdown requested
    Shutdown,
    /// Receiver dropped
    ReceiverClosed,
}

/// Totals for a finished crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Pages requested
    pub pages: u32,
    /// Pages skipped as malformed or rejected
    pub skipped_pages: u32,
    /// Listings sent
    pub listings: u64,
    /// Last total reported by the market
    pub total_count: Option<u64>,
    /// Why the crawl ended
    pub stop: CrawlStop,
}

/// Market operations over a shared executor.
#[derive(Clone)]
pub struct MarketClient {
    executor: Arc<RequestExecutor>,
    shutdown: Option<SharedShutdown>,
}

impl MarketClient {
    /// Client using the process-wide shutdown coordinator, if one is registered.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self {
            executor,
            shutdown: None,
        }
    }

    /// Stop crawls when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Underlying executor.
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    /// URL of a listing render page.
    pub fn listings_url(
        &self,
        app_id: u32,
        market_hash_name: &str,
        start: u32,
        count: u32,
    ) -> MarketResult<Url> {
        let path = format!(
            "/market/listings/{app_id}/{}/render/",
            url_name(market_hash_name)
        );
        let mut url = self.executor.config().endpoint(&path)?;
        url.query_pairs_mut()
            .append_pair("query", "")
            .append_pair("start", &start.to_string())
            .append_pair("count", &count.to_string())
            .append_pair("country", "US")
            .append_pair("language", "english")
            .append_pair("currency", "1");
        Ok(url)
    }

    /// Fetch and correlate one page of listings.
    ///
    /// A body that cannot be parsed gives a page flagged `malformed`.
    pub async fn listings_page(
        &self,
        app_id: u32,
        market_hash_name: &str,
        start: u32,
        count: u32,
    ) -> MarketResult<ListingPage> {
        let url = self.listings_url(app_id, market_hash_name, start, count)?;
        let referer = self.item_page(app_id, market_hash_name)?;
        let request = MarketRequest::get(url).referer(referer.as_str()).ajax(true);
        self.executor
            .execute(&request, &mut ListingPageHandler)
            .await?
    }

    /// Page through every listing of `query`, sending each on `sender`.
    ///
    /// Malformed and rejected pages are skipped. The crawl ends when the
    /// offset passes the reported total, on an empty page when no total is
    /// known, at the page limit, on shutdown or when the receiver is dropped.
    ///
    /// # Errors
    /// Only fatal request errors (exhausted retries, missing session) stop
    /// the crawl with an error.
    pub async fn crawl_listings(
        &self,
        query: &ListingQuery,
        sender: mpsc::Sender<Listing>,
    ) -> MarketResult<CrawlSummary> {
        query.validate().map_err(MarketError::InvalidRequest)?;

        let metrics = CrawlMetrics::start(format!("{}/{}", query.app_id, query.market_hash_name));
        let page_limit = query.max_pages.unwrap_or(MAX_PAGES).min(MAX_PAGES);
        let mut summary = CrawlSummary::default();
        let mut start = query.start;

        summary.stop = loop {
            if self.shutdown_requested() {
                info!(start = start, "Shutdown requested, stopping crawl");
                break CrawlStop::Shutdown;
            }
            if summary.pages >= page_limit {
                break CrawlStop::PageLimit;
            }
            if summary.total_count.is_some_and(|total| u64::from(start) >= total) {
                break CrawlStop::Exhausted;
            }

            summary.pages += 1;
            let page = match self
                .listings_page(query.app_id, &query.market_hash_name, start, query.page_size)
                .await
            {
                Ok(page) => page,
                Err(e) if e.is_fatal() => {
                    metrics.record_failure(&e.to_string());
                    return Err(e);
                }
                Err(e) => {
                    warn!(start = start, error = %e, "Skipping listing page");
                    summary.skipped_pages += 1;
                    start = start.saturating_add(query.page_size);
                    continue;
                }
            };

            if page.total_count.is_some() {
                summary.total_count = page.total_count;
            }
            if page.malformed {
                warn!(start = start, "Skipping malformed listing page");
                summary.skipped_pages += 1;
                start = start.saturating_add(query.page_size);
                continue;
            }
            if page.is_empty() && summary.total_count.is_none() {
                break CrawlStop::EmptyPage;
            }

            let count = page.len();
            debug!(start = start, listings = count, "Listing page correlated");
            let mut closed = false;
            for listing in page.listings {
                if sender.send(listing).await.is_err() {
                    closed = true;
                    break;
                }
                summary.listings += 1;
            }
            metrics.record_page(count);
            if closed {
                break CrawlStop::ReceiverClosed;
            }

            start = start.saturating_add(query.page_size);
        };

        metrics.record_success(summary.listings, summary.pages);
        Ok(summary)
    }

    /// List `item` for sale; `price` is what the seller receives, in cents.
    ///
    /// # Errors
    /// [`MarketError::Sell`] when the market refuses; its
    /// `item_not_in_inventory` flag tells a vanished asset apart.
    pub async fn sell_item(&self, item: &InventoryItem, price: u64) -> MarketResult<SellReceipt> {
        item.validate().map_err(MarketError::InvalidRequest)?;
        if price == 0 {
            return Err(MarketError::InvalidRequest("price must be positive".to_string()));
        }

        let url = self.executor.config().endpoint("/market/sellitem/")?;
        let referer = self.executor.config().endpoint("/my/inventory/")?;
        let request = MarketRequest::post(
            url,
            [
                ("appid", item.app_id.to_string()),
                ("contextid", item.context_id.to_string()),
                ("assetid", item.asset_id.clone()),
                ("amount", "1".to_string()),
                ("price", price.to_string()),
            ],
        )
        .referer(referer.as_str())
        .session_required(true);

        info!(item = %item, price = price, "Selling item");
        self.executor.execute(&request, &mut SellHandler).await?
    }

    fn item_page(&self, app_id: u32, market_hash_name: &str) -> MarketResult<Url> {
        let path = format!("/market/listings/{app_id}/{}", url_name(market_hash_name));
        Ok(self.executor.config().endpoint(&path)?)
    }

    fn shutdown_requested(&self) -> bool {
        match &self.shutdown {
            Some(shutdown) => shutdown.is_shutdown_requested(),
            None => shutdown::is_global_shutdown_requested(),
        }
    }
}
