//! # Steam Market Client Library
//!
//! A resilient client for the Steam Community Market: adaptive rate control,
//! bounded retries, leak-proof request deadlines and a streaming parser for
//! listing pages.
//!
//! ## Features
//!
//! - **Adaptive Rate Control**: one shared governor slows down on 429 and recovers on success
//! - **Bounded Retries**: throttles and connection faults are retried at most five times
//! - **Connection Watchdog**: attempts past their deadline are aborted and retried
//! - **Session Handling**: cookies seeded from a browser header and kept current from `Set-Cookie`
//! - **Streaming Correlation**: listing pages are joined with their assets in one forward pass
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use steam_market_client::http::{ClientConfig, RateGovernor, RequestExecutor, SessionStore};
//! use steam_market_client::market::MarketClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let session = SessionStore::seeded(config.base_url.clone(), "sessionid=abc; steamLogin=xyz");
//! let governor = Arc::new(RateGovernor::new(config.rate));
//! let executor = Arc::new(RequestExecutor::new(config, session, governor)?);
//!
//! let market = MarketClient::new(executor);
//! let page = market
//!     .listings_page(730, "AK-47 | Redline (Field-Tested)", 0, 10)
//!     .await?;
//! for listing in &page.listings {
//!     println!("{} {} {}", listing.listing_id, listing.name, listing.total());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`http`] - Request execution: governor, watchdog, session store, retries
//! - [`market`] - Market operations and the listing correlator
//! - [`output`] - Listing writers (CSV, JSON lines)
//! - [`metrics`] - Prometheus counters and gauges
//! - [`cli`] - Command line front end
//! - [`shutdown`] - Process-wide shutdown coordination

#![warn(missing_docs)]
#![warn(clippy::all)]

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Resilient request execution
pub mod http;

/// Market operations
pub mod market;

/// Observability metrics
pub mod metrics;

/// Listing output writers
pub mod output;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Characters left unescaped in item URL names, matching the market's own links
const URL_NAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a market hash name for use in a URL path.
pub fn url_name(market_hash_name: &str) -> String {
    utf8_percent_encode(market_hash_name, URL_NAME_SAFE).to_string()
}

/// A market listing joined with its asset.
///
/// Prices are in the smallest unit of the account's wallet currency (cents).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    /// App the item belongs to
    pub app_id: u32,
    /// Market hash name of the item
    pub name: String,
    /// Listing id
    pub listing_id: String,
    /// Steam id of the seller
    pub seller_id: String,
    /// Amount the seller receives
    pub subtotal: u64,
    /// Total fee on top of the subtotal
    pub fee: u64,
    /// Steam's share of the fee
    pub steam_fee: u64,
    /// Publisher's share of the fee
    pub publisher_fee: u64,
    /// App receiving the publisher fee
    pub publisher_app_id: u32,
    /// Publisher fee as a fraction of the subtotal
    pub publisher_fee_percent: Decimal,
}

impl Listing {
    /// Price a buyer pays: subtotal plus fee
    pub fn total(&self) -> u64 {
        self.subtotal.saturating_add(self.fee)
    }

    /// Percent-encoded item name
    pub fn url_name(&self) -> String {
        url_name(&self.name)
    }

    /// Validate listing data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.listing_id.is_empty() {
            return Err("Listing id cannot be empty".to_string());
        }

        if self.fee == 0 {
            return Err(format!("Listing {} has no fee", self.listing_id));
        }

        if self.steam_fee.saturating_add(self.publisher_fee) > self.fee {
            return Err(format!(
                "Fee parts ({} + {}) exceed fee ({})",
                self.steam_fee, self.publisher_fee, self.fee
            ));
        }

        Ok(())
    }
}

/// An item in the user's inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct InventoryItem {
    /// Asset id
    pub asset_id: String,
    /// Inventory context (2 for most games)
    pub context_id: u32,
    /// Instance id
    pub instance_id: String,
    /// App the item belongs to
    pub app_id: u32,
    /// Market hash name
    pub market_hash_name: String,
    /// Whether the item may be listed on the market
    pub marketable: bool,
}

impl InventoryItem {
    /// Percent-encoded item name
    pub fn url_name(&self) -> String {
        url_name(&self.market_hash_name)
    }

    /// Validate inventory item data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.asset_id.is_empty() {
            return Err("Asset id cannot be empty".to_string());
        }

        if !self.asset_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("Asset id must be numeric, got {}", self.asset_id));
        }

        if self.app_id == 0 {
            return Err("App id cannot be zero".to_string());
        }

        Ok(())
    }
}

impl std::fmt::Display for InventoryItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{} ({})",
            self.app_id, self.context_id, self.asset_id, self.market_hash_name
        )
    }
}
