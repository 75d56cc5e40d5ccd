//! Response handlers for market endpoints

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use reqwest::StatusCode;
use serde::Deserialize;
use std::io::{self, Read};
use tokio::sync::mpsc;
use tracing::{error, warn};

use super::listing_parser::{parse_listings, ListingPage};
use super::{MarketError, MarketResult, SellError};
use crate::http::{Outcome, ResponseBody, ResponseHandler};

/// Body chunks buffered between the network and the parser
const CHUNK_BUFFER: usize = 16;

/// Blocking [`Read`] over body chunks sent from an async task.
///
/// Must be read from a blocking context such as
/// [`tokio::task::spawn_blocking`]. Dropping the reader tells the sender to
/// stop reading the body.
pub struct ChunkReader {
    chunks: mpsc::Receiver<io::Result<Bytes>>,
    current: Bytes,
}

impl ChunkReader {
    /// Reader over `chunks`; the end of the channel is the end of the body.
    pub fn new(chunks: mpsc::Receiver<io::Result<Bytes>>) -> Self {
        Self {
            chunks,
            current: Bytes::new(),
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.current.is_empty() {
            match self.chunks.blocking_recv() {
                Some(Ok(chunk)) => self.current = chunk,
                Some(Err(e)) => return Err(e),
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}

/// Feed `body` to the correlator as it arrives.
///
/// The parser runs on the blocking pool; once it has what it needs it drops
/// its reader and the rest of the body is left unread.
pub async fn stream_listings(mut body: ResponseBody) -> ListingPage {
    let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
    let parser = tokio::task::spawn_blocking(move || parse_listings(ChunkReader::new(rx)));

    loop {
        let next = match body.chunk().await {
            Ok(Some(chunk)) => Ok(chunk),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Listing body interrupted");
                Err(io::Error::other(e.to_string()))
            }
        };
        let failed = next.is_err();
        if tx.send(next).await.is_err() || failed {
            break;
        }
    }
    drop(tx);

    match parser.await {
        Ok(page) => page,
        Err(e) => {
            error!(error = %e, "Listing parser task failed");
            ListingPage::malformed()
        }
    }
}

/// Correlates a listing render response.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListingPageHandler;

#[async_trait]
impl ResponseHandler for ListingPageHandler {
    type Output = MarketResult<ListingPage>;

    async fn handle(&mut self, outcome: Outcome) -> Self::Output {
        match outcome {
            Outcome::Success(body) => Ok(stream_listings(body).await),
            Outcome::Rejected(body) => Err(rejected(body).await),
            Outcome::Failed(e) => Err(MarketError::Http(e)),
        }
    }
}

/// Confirmation details returned by a successful sell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SellReceipt {
    /// Listing must be confirmed before it goes live
    pub requires_confirmation: bool,
    /// Confirmation is pending in the mobile authenticator
    pub needs_mobile_confirmation: bool,
    /// Confirmation is pending by email
    pub needs_email_confirmation: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SellResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    requires_confirmation: u8,
    #[serde(default)]
    needs_mobile_confirmation: bool,
    #[serde(default)]
    needs_email_confirmation: bool,
}

/// Interprets the response of a sell request.
#[derive(Debug, Default, Clone, Copy)]
pub struct SellHandler;

#[async_trait]
impl ResponseHandler for SellHandler {
    type Output = MarketResult<SellReceipt>;

    async fn handle(&mut self, outcome: Outcome) -> Self::Output {
        let body = match outcome {
            Outcome::Success(body) | Outcome::Rejected(body) => body,
            Outcome::Failed(e) => return Err(MarketError::Http(e)),
        };
        let status = body.status();
        let text = body.text().await?;

        match serde_json::from_str::<SellResponse>(&text) {
            Ok(response) if response.success && status.is_success() => Ok(SellReceipt {
                requires_confirmation: response.requires_confirmation != 0,
                needs_mobile_confirmation: response.needs_mobile_confirmation,
                needs_email_confirmation: response.needs_email_confirmation,
            }),
            Ok(response) => {
                let message = response
                    .message
                    .unwrap_or_else(|| format!("sell refused with status {status}"));
                Err(MarketError::Sell(SellError::new(message)))
            }
            Err(_) if status.is_success() => Err(MarketError::Rejected {
                status,
                message: text,
            }),
            Err(_) => Err(MarketError::Sell(SellError::new(text))),
        }
    }
}

async fn rejected(body: ResponseBody) -> MarketError {
    let status: StatusCode = body.status();
    let message = body.text().await.unwrap_or_default();
    MarketError::Rejected { status, message }
}
