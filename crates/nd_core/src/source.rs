use async_trait::async_trait;

use crate::types::{Headline, NewsPreferences, Partition};
use crate::Result;

/// One page of articles as reported by the upstream source. `total_results`
/// is the source's own count, which can exceed the page that was returned.
#[derive(Debug, Clone, Default)]
pub struct FetchedBatch {
    pub total_results: u64,
    pub articles: Vec<Headline>,
}

/// The external headline API. May fail with typed upstream errors
/// (invalid key, rate limit, no response); callers decide whether to
/// surface or swallow those.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Top headlines for a partition, capped at `page_size`.
    async fn top_headlines(&self, partition: &Partition, page_size: usize)
        -> Result<FetchedBatch>;

    /// Free-text search bounded by language, most recent first, capped at
    /// `page_size`.
    async fn search_everything(
        &self,
        query: &str,
        language: &str,
        page_size: usize,
    ) -> Result<FetchedBatch>;
}

/// Read-only view over all user preference records. The records themselves
/// are owned elsewhere; the refresh scheduler only enumerates them.
#[async_trait]
pub trait PreferenceSource: Send + Sync {
    async fn list_preferences(&self) -> Result<Vec<NewsPreferences>>;
}
