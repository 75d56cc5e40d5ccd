//! CLI error types and conversions

use crate::http::HttpError;
use crate::market::MarketError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Request layer error
    #[error("request error: {0}")]
    HttpError(#[from] HttpError),

    /// Market operation error
    #[error("market error: {0}")]
    MarketError(#[from] MarketError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Background task failed
    #[error("task failed: {0}")]
    TaskError(String),
}
