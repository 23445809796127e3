use std::sync::Arc;

use chrono::{Duration, Utc};
use nd_core::{ArticleStore, CachedArticle, Headline, Partition, Result};
use tracing::{debug, info, warn};

/// How long a fetched batch counts as fresh. Fixed; the next scheduler
/// tick is the retry mechanism for anything that went stale.
pub const CACHE_TTL_MINUTES: i64 = 15;

/// Search reads are capped at one upstream page worth of results.
pub const SEARCH_RESULT_CAP: usize = 20;

/// Freshness-bounded view over the article store. Decides hit vs. miss,
/// replaces whole partitions on refill and sweeps expired entries.
///
/// An empty partition and a never-fetched partition both read as a miss;
/// there is no negative caching.
pub struct NewsCache {
    store: Arc<dyn ArticleStore>,
    ttl: Duration,
}

impl NewsCache {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            ttl: Duration::minutes(CACHE_TTL_MINUTES),
        }
    }

    /// Fresh articles for a partition, newest first. Returns `None` on a
    /// miss; a storage error is logged and degrades to a miss so callers
    /// fall through to the upstream source.
    pub async fn get_cached_news(&self, partition: &Partition) -> Option<Vec<CachedArticle>> {
        let cutoff = Utc::now() - self.ttl;
        match self.store.find_partition(partition, cutoff).await {
            Ok(articles) if !articles.is_empty() => {
                debug!("✓ cache HIT: {} articles for {}", articles.len(), partition);
                Some(articles)
            }
            Ok(_) => {
                debug!("✗ cache MISS for {}", partition);
                None
            }
            Err(e) => {
                warn!("cache read failed for {}, treating as miss: {}", partition, e);
                None
            }
        }
    }

    /// Stamp a fetched batch with the current freshness window.
    pub fn stamp_batch(&self, headlines: &[Headline], partition: &Partition) -> Vec<CachedArticle> {
        let fetched_at = Utc::now();
        let expires_at = fetched_at + self.ttl;
        headlines
            .iter()
            .cloned()
            .map(|h| CachedArticle::from_headline(h, partition, fetched_at, expires_at))
            .collect()
    }

    /// Replace the partition's cached batch: eager delete of everything
    /// stored for it, then a bulk insert. Duplicate URLs inside the batch
    /// are dropped by the store; any other storage error propagates.
    pub async fn set_cached_news(
        &self,
        articles: &[CachedArticle],
        partition: &Partition,
    ) -> Result<()> {
        self.store.delete_partition(partition).await?;
        let inserted = self.store.insert_articles(articles).await?;
        debug!("✓ cached {} articles for {}", inserted, partition);
        Ok(())
    }

    /// Fresh articles matching a keyword, bounded by language, capped at
    /// [`SEARCH_RESULT_CAP`]. Read-only over whatever happens to be cached.
    pub async fn search_cached_news(
        &self,
        query: &str,
        language: &str,
    ) -> Option<Vec<CachedArticle>> {
        let cutoff = Utc::now() - self.ttl;
        match self
            .store
            .search(query, language, cutoff, SEARCH_RESULT_CAP)
            .await
        {
            Ok(articles) if !articles.is_empty() => {
                debug!("✓ search cache HIT: {} articles for {:?}", articles.len(), query);
                Some(articles)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("cache search failed for {:?}, treating as miss: {}", query, e);
                None
            }
        }
    }

    /// Delete every entry past its expiry, regardless of partition.
    pub async fn clear_expired(&self) -> Result<u64> {
        let removed = self.store.delete_expired(Utc::now()).await?;
        info!("🗑️  cleared {} expired cache entries", removed);
        Ok(removed)
    }
}
