use std::time::Duration;

use async_trait::async_trait;
use nd_core::{Error, FetchedBatch, NewsSource, Partition, Result};
use tracing::debug;
use url::Url;

use crate::response::ArticlesResponse;

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct NewsApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl NewsApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Reads `NEWS_API_KEY` (required) and `NEWS_API_BASE_URL` (optional).
    /// A missing or blank key fails fast and is never retried.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("NEWS_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(Error::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("NEWS_API_BASE_URL") {
            config = config.with_base_url(&base_url)?;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| Error::Upstream(format!("invalid news API base URL: {}", e)))?;
        self.base_url = parsed.as_str().trim_end_matches('/').to_string();
        Ok(self)
    }
}

/// Client for a NewsAPI-shaped headline source. Carries a fixed request
/// timeout; timeouts surface as `Error::NoResponse` like any other
/// unreachable-upstream condition.
pub struct NewsApiClient {
    client: reqwest::Client,
    config: NewsApiConfig,
}

impl NewsApiClient {
    pub fn new(config: NewsApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Upstream(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(NewsApiConfig::from_env()?)
    }

    async fn get_articles(&self, path: &str, params: &[(&str, &str)]) -> Result<FetchedBatch> {
        let url = format!("{}/{}", self.config.base_url, path);
        debug!("querying news API: {} {:?}", path, params);

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.config.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let body: ArticlesResponse = response.json().await.map_err(classify_transport_error)?;

        if !status.is_success() || body.status == "error" {
            let message = body
                .message
                .unwrap_or_else(|| format!("upstream returned {}", status));
            return Err(match status.as_u16() {
                401 => Error::InvalidApiKey,
                429 => Error::RateLimited,
                _ => Error::Upstream(message),
            });
        }

        Ok(body.into())
    }
}

fn classify_transport_error(e: reqwest::Error) -> Error {
    if e.is_decode() {
        Error::Upstream(format!("invalid response body: {}", e))
    } else {
        // Timeouts, refused connections and everything else where no usable
        // response arrived.
        Error::NoResponse(e.to_string())
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn top_headlines(
        &self,
        partition: &Partition,
        page_size: usize,
    ) -> Result<FetchedBatch> {
        let page_size = page_size.to_string();
        self.get_articles(
            "top-headlines",
            &[
                ("country", partition.country.as_str()),
                ("language", partition.language.as_str()),
                ("category", partition.category.as_str()),
                ("pageSize", page_size.as_str()),
            ],
        )
        .await
    }

    async fn search_everything(
        &self,
        query: &str,
        language: &str,
        page_size: usize,
    ) -> Result<FetchedBatch> {
        let page_size = page_size.to_string();
        self.get_articles(
            "everything",
            &[
                ("q", query),
                ("language", language),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
            ],
        )
        .await
    }
}
