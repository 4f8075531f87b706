//! HTTP client for GTFS-realtime feeds.

use std::time::Duration;

use crate::live::FetchLive;

use super::convert::decode_message;
use super::error::FeedError;
use super::types::{FeedKind, LiveMessage};

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Optional API key sent with every request
    pub api_key: Option<String>,
    /// Header carrying the API key
    pub api_key_header: String,
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            api_key: None,
            api_key_header: "x-api-key".to_string(),
        }
    }
}

impl FeedClientConfig {
    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Send an API key in the given header.
    pub fn with_api_key(mut self, header: impl Into<String>, key: impl Into<String>) -> Self {
        self.api_key_header = header.into();
        self.api_key = Some(key.into());
        self
    }
}

/// Fetches and decodes GTFS-realtime protobuf feeds over HTTP.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    api_key: Option<(String, String)>,
}

impl FeedClient {
    pub fn new(config: FeedClientConfig) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.map(|key| (config.api_key_header, key)),
        })
    }

    /// Fetch one feed and decode it.
    pub async fn fetch(&self, url: &str) -> Result<LiveMessage, FeedError> {
        let mut request = self.http.get(url);
        if let Some((header, key)) = &self.api_key {
            request = request.header(header.as_str(), key.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        decode_message(&body)
    }
}

impl FetchLive for FeedClient {
    async fn fetch_live(&self, kind: FeedKind, url: &str) -> Result<LiveMessage, FeedError> {
        tracing::trace!(kind = %kind, url, "Fetching live feed");
        self.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = FeedClientConfig::default();
        assert_eq!(config.timeout_secs, 10);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn api_key_is_carried() {
        let config = FeedClientConfig::default()
            .with_timeout(3)
            .with_api_key("Ocp-Apim-Subscription-Key", "secret");
        let client = FeedClient::new(config).unwrap();
        assert_eq!(
            client.api_key,
            Some(("Ocp-Apim-Subscription-Key".to_string(), "secret".to_string()))
        );
    }
}
