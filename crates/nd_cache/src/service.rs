use std::sync::Arc;

use nd_core::types::DEFAULT_LANGUAGE;
use nd_core::{
    ArticleStore, Error, NewsPreferences, NewsResponse, NewsSource, Partition, Result,
    SearchResponse,
};
use tracing::warn;

use crate::cache::NewsCache;

/// Upstream page size for both headline and search queries.
pub const PAGE_SIZE: usize = 20;

/// Cache-through orchestration over the external news source. Route
/// handlers and the refresh scheduler both go through here.
pub struct NewsService {
    cache: NewsCache,
    source: Arc<dyn NewsSource>,
}

impl NewsService {
    pub fn new(store: Arc<dyn ArticleStore>, source: Arc<dyn NewsSource>) -> Self {
        Self {
            cache: NewsCache::new(store),
            source,
        }
    }

    pub fn cache(&self) -> &NewsCache {
        &self.cache
    }

    /// Headlines for a user's preferences: first category wins, missing
    /// fields fall back to defaults.
    pub async fn fetch_news(&self, prefs: &NewsPreferences) -> Result<NewsResponse> {
        self.fetch_partition(&Partition::from_preferences(prefs)).await
    }

    /// Headlines for one partition. Cache hits come back flagged; on a miss
    /// the upstream source is queried and the result cached best-effort, so
    /// a write-back failure is logged but the fetched articles are still
    /// returned. Upstream failures propagate typed and cache nothing.
    pub async fn fetch_partition(&self, partition: &Partition) -> Result<NewsResponse> {
        if let Some(entries) = self.cache.get_cached_news(partition).await {
            return Ok(NewsResponse {
                total_results: entries.len() as u64,
                articles: entries.into_iter().map(|e| e.headline).collect(),
                from_cache: true,
                partition: partition.clone(),
            });
        }

        let batch = self.source.top_headlines(partition, PAGE_SIZE).await?;
        let stamped = self.cache.stamp_batch(&batch.articles, partition);
        if let Err(e) = self.cache.set_cached_news(&stamped, partition).await {
            warn!("failed to cache articles for {}: {}", partition, e);
        }

        Ok(NewsResponse {
            total_results: batch.total_results,
            articles: batch.articles,
            from_cache: false,
            partition: partition.clone(),
        })
    }

    /// Keyword search bounded by language. Served from whatever is cached
    /// when possible; upstream results are never written back.
    pub async fn search_news(
        &self,
        query: &str,
        language: Option<&str>,
    ) -> Result<SearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::EmptyQuery);
        }
        let language = language.unwrap_or(DEFAULT_LANGUAGE);

        if let Some(entries) = self.cache.search_cached_news(query, language).await {
            return Ok(SearchResponse {
                total_results: entries.len() as u64,
                articles: entries.into_iter().map(|e| e.headline).collect(),
                query: query.to_string(),
                from_cache: true,
            });
        }

        let batch = self.source.search_everything(query, language, PAGE_SIZE).await?;
        Ok(SearchResponse {
            total_results: batch.total_results,
            articles: batch.articles,
            query: query.to_string(),
            from_cache: false,
        })
    }

    pub async fn clear_expired(&self) -> Result<u64> {
        self.cache.clear_expired().await
    }
}
