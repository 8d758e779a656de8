//! Board snapshot sources.

use async_trait::async_trait;

use crate::canvas::BoardSnapshot;
use crate::error::PaintError;

/// Something that can fetch the whole current board.
#[async_trait]
pub trait BoardSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<BoardSnapshot, PaintError>;
}

/// Fetches the raw board buffer over plain HTTP.
pub struct HttpBoard {
    client: reqwest::Client,
    url: String,
}

impl HttpBoard {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Board endpoint under an API base such as `https://host/api`.
    pub fn from_api_base(api_base: &str) -> Self {
        Self::new(format!("{}/paintboard/getboard", api_base.trim_end_matches('/')))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl BoardSource for HttpBoard {
    async fn fetch(&self) -> Result<BoardSnapshot, PaintError> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        BoardSnapshot::from_bytes(&bytes)
    }
}
