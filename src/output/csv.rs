//! CSV output writer for listings

use crate::Listing;
use csv::Writer;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{ListingsWriter, OutputError, OutputResult, OutputWriter};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// CSV record for a listing
#[derive(Debug, Serialize)]
struct ListingRecord<'a> {
    listing_id: &'a str,
    app_id: u32,
    name: &'a str,
    seller_id: &'a str,
    subtotal: u64,
    fee: u64,
    total: u64,
    steam_fee: u64,
    publisher_fee: u64,
    publisher_app_id: u32,
    publisher_fee_percent: String,
}

impl<'a> From<&'a Listing> for ListingRecord<'a> {
    fn from(listing: &'a Listing) -> Self {
        Self {
            listing_id: &listing.listing_id,
            app_id: listing.app_id,
            name: &listing.name,
            seller_id: &listing.seller_id,
            subtotal: listing.subtotal,
            fee: listing.fee,
            total: listing.total(),
            steam_fee: listing.steam_fee,
            publisher_fee: listing.publisher_fee,
            publisher_app_id: listing.publisher_app_id,
            publisher_fee_percent: listing.publisher_fee_percent.to_string(),
        }
    }
}

/// CSV writer for listings
///
/// Listings already written are skipped by id: consecutive pages overlap
/// when listings sell between requests.
pub struct CsvListingsWriter {
    writer: Writer<BufWriter<File>>,
    listings_written: u64,
    seen_ids: HashSet<String>,
    duplicates_skipped: u64,
}

impl CsvListingsWriter {
    /// Create a new CSV listings writer
    ///
    /// # Arguments
    /// * `path` - Output file path; parent directories are created
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        Self::new_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Create a new CSV listings writer with custom buffer size
    pub fn new_with_buffer_size<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating CSV listings writer: path={}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;

        let buf_writer = BufWriter::with_capacity(buffer_size, file);

        Ok(Self {
            writer: Writer::from_writer(buf_writer),
            listings_written: 0,
            seen_ids: HashSet::new(),
            duplicates_skipped: 0,
        })
    }

    /// Get number of duplicate listings skipped
    pub fn duplicates_skipped(&self) -> u64 {
        self.duplicates_skipped
    }
}

impl ListingsWriter for CsvListingsWriter {
    fn write_listing(&mut self, listing: &Listing) -> OutputResult<()> {
        if !self.seen_ids.insert(listing.listing_id.clone()) {
            self.duplicates_skipped += 1;
            debug!(listing_id = %listing.listing_id, "Skipping duplicate listing");
            return Ok(());
        }
        if let Err(e) = listing.validate() {
            warn!(listing_id = %listing.listing_id, error = %e, "Writing inconsistent listing");
        }

        self.writer
            .serialize(ListingRecord::from(listing))
            .map_err(|e| OutputError::CsvError(format!("Failed to write listing: {e}")))?;

        self.listings_written += 1;

        if self.listings_written % 1000 == 0 {
            self.flush()?;
            debug!("Progress: {} listings written", self.listings_written);
        }

        Ok(())
    }

    fn listings_written(&self) -> u64 {
        self.listings_written
    }
}

impl OutputWriter for CsvListingsWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))
    }

    fn close(mut self) -> OutputResult<()> {
        self.flush()?;

        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get inner writer: {e}")))?;

        let file = buf_writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get file handle: {e}")))?;

        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {e}")))?;

        info!(
            "CSV writer closed: {} listings written, {} duplicates skipped",
            self.listings_written, self.duplicates_skipped
        );
        Ok(())
    }
}
