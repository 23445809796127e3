use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{ArticleRef, CachedArticle, Page, Partition, UserArticle};
use crate::Result;

/// Persistent collection of cached articles. Backends must treat the
/// article URL as globally unique.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Bulk insert, silently skipping entries whose URL is already stored
    /// (or repeated within the batch). Returns how many were inserted.
    async fn insert_articles(&self, articles: &[CachedArticle]) -> Result<usize>;

    /// All articles for an exact partition with `fetched_at >= fetched_since`,
    /// most recently published first.
    async fn find_partition(
        &self,
        partition: &Partition,
        fetched_since: DateTime<Utc>,
    ) -> Result<Vec<CachedArticle>>;

    /// Case-insensitive substring search over title, description and content,
    /// bounded by language and freshness, most recently published first.
    async fn search(
        &self,
        query: &str,
        language: &str,
        fetched_since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CachedArticle>>;

    /// Delete every entry for an exact partition. Returns the count deleted.
    async fn delete_partition(&self, partition: &Partition) -> Result<u64>;

    /// Delete every entry with `expires_at <= now`, regardless of partition.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    async fn count_partition(&self, partition: &Partition) -> Result<u64>;
}

/// Per-user read/favorite tracking, keyed (user_id, article url).
#[async_trait]
pub trait UserNewsStore: Send + Sync {
    /// Upsert the record for (user, article) and mark it read.
    async fn mark_read(&self, user_id: &str, article: &ArticleRef) -> Result<UserArticle>;

    /// Upsert the record for (user, article) and set its favorite flag.
    async fn set_favorite(
        &self,
        user_id: &str,
        article: &ArticleRef,
        favorite: bool,
    ) -> Result<UserArticle>;

    async fn list_read(&self, user_id: &str, page: u32, per_page: u32)
        -> Result<Page<UserArticle>>;

    async fn list_favorites(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<UserArticle>>;
}
