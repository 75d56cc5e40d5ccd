//! Response handling contract
//!
//! The executor resolves every request into one [`Outcome`] and hands it to a
//! [`ResponseHandler`]. The handler owns the body for the duration of the call;
//! whatever it does not read is discarded when it returns.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use super::{HttpError, HttpResult};

/// Body of a completed response.
#[derive(Debug)]
pub struct ResponseBody {
    response: Response,
}

impl ResponseBody {
    pub(crate) fn new(response: Response) -> Self {
        Self { response }
    }

    /// Status line code.
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Declared length, when the server sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Next chunk of the body, `None` at the end.
    pub async fn chunk(&mut self) -> HttpResult<Option<Bytes>> {
        self.response.chunk().await.map_err(HttpError::Body)
    }

    /// Whole body as bytes.
    pub async fn bytes(self) -> HttpResult<Bytes> {
        self.response.bytes().await.map_err(HttpError::Body)
    }

    /// Whole body as text.
    pub async fn text(self) -> HttpResult<String> {
        self.response.text().await.map_err(HttpError::Body)
    }

    /// Whole body deserialized from JSON.
    pub async fn json<T: DeserializeOwned>(self) -> HttpResult<T> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(HttpError::Json)
    }
}

/// Terminal result of one executed request.
#[derive(Debug)]
pub enum Outcome {
    /// Status below 400
    Success(ResponseBody),
    /// Status 400 or above, other than the rate-limit status
    Rejected(ResponseBody),
    /// Transport or protocol fault that is not worth retrying
    Failed(HttpError),
}

/// Consumer of request outcomes.
#[async_trait]
pub trait ResponseHandler: Send {
    /// Value produced for the caller
    type Output: Send;

    /// Handle the terminal outcome of a request.
    async fn handle(&mut self, outcome: Outcome) -> Self::Output;
}

/// Collects the body as text; rejections and faults become errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextHandler;

#[async_trait]
impl ResponseHandler for TextHandler {
    type Output = HttpResult<String>;

    async fn handle(&mut self, outcome: Outcome) -> Self::Output {
        match outcome {
            Outcome::Success(body) => body.text().await,
            Outcome::Rejected(body) => {
                let status = body.status();
                let body = body.text().await.unwrap_or_default();
                Err(HttpError::Rejected { status, body })
            }
            Outcome::Failed(error) => Err(error),
        }
    }
}
