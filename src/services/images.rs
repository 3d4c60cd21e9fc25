use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching a target image
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// HTTP fetcher for remotely hosted target images.
///
/// Every request carries an explicit timeout so one unresponsive host cannot
/// stall a comparison batch indefinitely; a timeout surfaces as a per-item
/// error upstream.
pub struct ImageFetcher {
    client: Client,
}

impl ImageFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Download the raw bytes behind one image URL.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!("Fetching target image: {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
