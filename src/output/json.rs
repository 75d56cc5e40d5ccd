//! JSON lines output, one listing per line

use crate::Listing;
use std::io::{BufWriter, Write};

use super::{ListingsWriter, OutputError, OutputResult, OutputWriter};

/// Writes each listing as one JSON object per line.
pub struct JsonLinesWriter<W: Write> {
    writer: BufWriter<W>,
    listings_written: u64,
}

impl JsonLinesWriter<std::io::Stdout> {
    /// Writer on standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> JsonLinesWriter<W> {
    /// Writer over `inner`
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
            listings_written: 0,
        }
    }

    /// Flush and return the inner writer
    pub fn into_inner(self) -> OutputResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))
    }
}

impl<W: Write> ListingsWriter for JsonLinesWriter<W> {
    fn write_listing(&mut self, listing: &Listing) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, listing)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| OutputError::IoError(e.to_string()))?;
        self.listings_written += 1;
        Ok(())
    }

    fn listings_written(&self) -> u64 {
        self.listings_written
    }
}

impl<W: Write> OutputWriter for JsonLinesWriter<W> {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))
    }

    fn close(mut self) -> OutputResult<()> {
        self.flush()
    }
}
