// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur while fetching a page or asset
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status {status} for {url}")]
    Status { status: StatusCode, url: String },
}

/// Stream of body chunks for a successful response
pub type BodyStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// HTTP client shared by every crawl run of the agent.
///
/// Each request is attempted exactly once; there is no retry layer.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Create a fetcher sending `user_agent` with every request
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch a page and return its body as text
    pub async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        let response = self.send(url).await?;
        Ok(response.text().await?)
    }

    /// Fetch a resource and return its body as a chunk stream
    pub async fn get_stream(&self, url: &Url) -> Result<BodyStream, FetchError> {
        let response = self.send(url).await?;
        Ok(response.bytes_stream().map_err(FetchError::from).boxed())
    }

    async fn send(&self, url: &Url) -> Result<reqwest::Response, FetchError> {
        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}
