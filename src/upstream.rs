use crate::error::FeedError;
use bytes::Bytes;
use log::{debug, warn};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use std::time::{Duration, Instant};

/// Fetches upstream documents with the Metlink API key
pub struct UpstreamClient {
    client: Client,
    api_key: Option<String>,
}

impl UpstreamClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(UpstreamClient { client, api_key })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// GETs `url` and returns the whole body
    ///
    /// Without an API key nothing is sent. Any status other than 2xx is an error, whatever the body says.
    pub async fn fetch(&self, url: &str, accept: &str) -> Result<Bytes, FeedError> {
        let api_key = self.api_key.as_deref().ok_or(FeedError::MissingCredential)?;

        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .header("x-api-key", api_key)
            .header(CACHE_CONTROL, "no-cache")
            .header(ACCEPT, accept)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("{url} answered {status}");
            return Err(FeedError::UpstreamHttp {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        debug!(
            "Fetched {} bytes from {url} in {:.2}s",
            body.len(),
            start.elapsed().as_secs_f32()
        );
        Ok(body)
    }
}
