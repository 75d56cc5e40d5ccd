//! CLI command implementations

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::http::config::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT, MAX_CONNECTIONS, REQUEST_TIMEOUT_SECS};
use crate::http::rate_limit::{DEFAULT_INITIAL_RATE, DEFAULT_MAX_RATE, DEFAULT_MIN_RATE};
use crate::http::{ClientConfig, RateBounds, RateGovernor, RequestExecutor, SessionStore};

pub mod error;
pub mod listings;
pub mod sell;
pub mod session;

pub use error::CliError;
pub use listings::ListingsArgs;
pub use sell::SellArgs;
pub use session::SessionArgs;

/// Steam market client CLI
#[derive(Parser, Debug)]
#[command(name = "steam-market-client")]
#[command(about = "Crawl Steam market listings and sell inventory items", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub output_format: OutputFormat,

    /// Market base URL
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Browser cookie header used to seed the session (`name=value; name=value`)
    #[arg(long, global = true, env = "STEAM_COOKIES", default_value = "", hide_env_values = true)]
    pub cookies: String,

    /// User-Agent header
    #[arg(long, global = true, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Per-attempt deadline in seconds
    #[arg(long, global = true, default_value_t = REQUEST_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout_secs: u64,

    /// Simultaneous requests (default: 4, max: 32)
    #[arg(long, global = true, default_value_t = MAX_CONNECTIONS, value_parser = parse_connections)]
    pub max_connections: usize,

    /// Retries after the first attempt for throttled or failed requests (range: 0-20)
    #[arg(long, global = true, default_value = "5", value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,

    /// Lowest request rate in requests per second
    #[arg(long, global = true, default_value_t = DEFAULT_MIN_RATE)]
    pub min_rate: f64,

    /// Highest request rate in requests per second
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_RATE)]
    pub max_rate: f64,

    /// Starting request rate in requests per second
    #[arg(long, global = true, default_value_t = DEFAULT_INITIAL_RATE)]
    pub initial_rate: f64,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl the listings of one item
    Listings(ListingsArgs),

    /// Put an inventory item up for sale
    Sell(SellArgs),

    /// Show the session seeded from the cookie header
    Session(SessionArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Maximum allowed connections to prevent self-inflicted rate limiting
const MAX_CONNECTIONS_LIMIT: usize = 32;

fn parse_connections(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("max connections must be at least 1".to_string());
    }
    if value > MAX_CONNECTIONS_LIMIT {
        return Err(format!(
            "max connections {value} exceeds maximum of {MAX_CONNECTIONS_LIMIT}"
        ));
    }
    Ok(value)
}

impl Cli {
    /// Client configuration from the global flags.
    pub fn client_config(&self) -> Result<ClientConfig, CliError> {
        let mut config = ClientConfig::with_base_url(&self.base_url)
            .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
        config.user_agent = self.user_agent.clone();
        config.request_timeout = Duration::from_secs(self.timeout_secs);
        config.max_connections = self.max_connections;
        config.retry.max_retries = self.max_retries;
        config.rate = RateBounds {
            min: self.min_rate,
            max: self.max_rate,
            initial: self.initial_rate,
        };
        config
            .validate()
            .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
        Ok(config)
    }

    /// Session seeded from `--cookies` / `STEAM_COOKIES`.
    pub fn session(&self, config: &ClientConfig) -> SessionStore {
        SessionStore::seeded(config.base_url.clone(), &self.cookies)
    }

    /// Executor built from the global flags. Requires a Tokio runtime.
    pub fn executor(&self) -> Result<Arc<RequestExecutor>, CliError> {
        let config = self.client_config()?;
        let session = self.session(&config);
        let governor = Arc::new(RateGovernor::new(config.rate));
        Ok(Arc::new(RequestExecutor::new(config, session, governor)?))
    }
}
