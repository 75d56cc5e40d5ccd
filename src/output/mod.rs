//! Listing output writers

use crate::Listing;

pub mod csv;
pub mod json;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Generic output writer trait
pub trait OutputWriter {
    /// Flush any buffered data
    fn flush(&mut self) -> OutputResult<()>;

    /// Close the writer and finalize output
    fn close(self) -> OutputResult<()>;
}

/// Trait for writing correlated listings
pub trait ListingsWriter: OutputWriter {
    /// Write a single listing
    fn write_listing(&mut self, listing: &Listing) -> OutputResult<()>;

    /// Write multiple listings at once
    fn write_listings(&mut self, listings: &[Listing]) -> OutputResult<()> {
        for listing in listings {
            self.write_listing(listing)?;
        }
        Ok(())
    }

    /// Number of listings written so far
    fn listings_written(&self) -> u64;
}
