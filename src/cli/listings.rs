//! Listings command: crawl one item's listings to CSV or JSON lines

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::{Cli, CliError, OutputFormat};
use crate::market::{CrawlSummary, ListingQuery, MarketClient, DEFAULT_PAGE_SIZE};
use crate::output::csv::CsvListingsWriter;
use crate::output::json::JsonLinesWriter;
use crate::output::ListingsWriter;
use crate::shutdown::SharedShutdown;
use crate::Listing;

/// Listings buffered between the crawl and the writer
const LISTING_BUFFER: usize = 256;

/// Arguments for crawling listings
#[derive(Args, Debug)]
pub struct ListingsArgs {
    /// App id of the item (e.g., 730)
    #[arg(long)]
    pub app_id: u32,

    /// Market hash name of the item (e.g., "AK-47 | Redline (Field-Tested)")
    #[arg(long)]
    pub name: String,

    /// Listings per page (1-100)
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub page_size: u32,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Offset of the first listing
    #[arg(long, default_value_t = 0)]
    pub start: u32,

    /// CSV file to write; JSON lines go to stdout when omitted
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl ListingsArgs {
    /// Query described by the arguments
    pub fn query(&self) -> ListingQuery {
        let query = ListingQuery::new(self.app_id, self.name.clone())
            .page_size(self.page_size)
            .start(self.start);
        match self.max_pages {
            Some(max_pages) => query.max_pages(max_pages),
            None => query,
        }
    }

    /// Execute the listings command
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let query = self.query();
        query.validate().map_err(CliError::InvalidArgument)?;

        let market = MarketClient::new(cli.executor()?).with_shutdown(shutdown);
        let (tx, rx) = mpsc::channel(LISTING_BUFFER);
        let crawl = tokio::spawn({
            let query = query.clone();
            async move { market.crawl_listings(&query, tx).await }
        });

        let progress = create_progress_bar(&query);
        let written = match &self.output {
            Some(path) => drain(rx, CsvListingsWriter::new(path)?, &progress).await?,
            None => drain(rx, JsonLinesWriter::stdout(), &progress).await?,
        };
        progress.finish_and_clear();

        let summary = crawl
            .await
            .map_err(|e| CliError::TaskError(e.to_string()))??;
        report(cli.output_format, &query, &summary, written, self.output.as_ref());
        Ok(())
    }
}

async fn drain<W: ListingsWriter>(
    mut rx: mpsc::Receiver<Listing>,
    mut writer: W,
    progress: &ProgressBar,
) -> Result<u64, CliError> {
    while let Some(listing) = rx.recv().await {
        writer.write_listing(&listing)?;
        progress.inc(1);
    }
    let written = writer.listings_written();
    writer.close()?;
    Ok(written)
}

fn create_progress_bar(query: &ListingQuery) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {pos} listings {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(format!("{} ({})", query.market_hash_name, query.app_id));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn report(
    format: OutputFormat,
    query: &ListingQuery,
    summary: &CrawlSummary,
    written: u64,
    output: Option<&PathBuf>,
) {
    match (format, output) {
        (OutputFormat::Json, Some(path)) => println!(
            "{}",
            json!({
                "app_id": query.app_id,
                "name": query.market_hash_name,
                "pages": summary.pages,
                "skipped_pages": summary.skipped_pages,
                "listings": summary.listings,
                "written": written,
                "total_count": summary.total_count,
                "stop": format!("{:?}", summary.stop),
                "output": path.display().to_string(),
            })
        ),
        (OutputFormat::Human, Some(path)) => {
            println!("Crawl finished: {} ({})", query.market_hash_name, query.app_id);
            println!("  Pages:    {} ({} skipped)", summary.pages, summary.skipped_pages);
            println!("  Listings: {written} written to {}", path.display());
            if let Some(total) = summary.total_count {
                println!("  Total:    {total} reported by the market");
            }
            println!("  Stopped:  {:?}", summary.stop);
        }
        // Stdout carries the listings themselves
        (_, None) => info!(
            pages = summary.pages,
            skipped_pages = summary.skipped_pages,
            listings = summary.listings,
            stop = ?summary.stop,
            "Crawl finished"
        ),
    }
}
