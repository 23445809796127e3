use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nd_core::{
    ArticleRef, ArticleStore, CachedArticle, Page, Partition, Result, UserArticle, UserNewsStore,
};
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryInner {
    articles: Vec<CachedArticle>,
    user_articles: HashMap<(String, String), UserArticle>,
}

/// In-memory backend, suitable for tests and one-shot CLI runs. Shared
/// behind a tokio RwLock so foreground reads and a refresh tick can run
/// concurrently.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_query(article: &CachedArticle, needle: &str) -> bool {
    let headline = &article.headline;
    headline.title.to_lowercase().contains(needle)
        || headline
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
        || headline
            .content
            .as_deref()
            .is_some_and(|c| c.to_lowercase().contains(needle))
}

fn sort_newest_first(articles: &mut [CachedArticle]) {
    // Option ordering puts None first ascending, so the reverse comparison
    // leaves articles without a published date at the end.
    articles.sort_by(|a, b| b.headline.published_at.cmp(&a.headline.published_at));
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn insert_articles(&self, articles: &[CachedArticle]) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut seen: HashSet<String> = inner
            .articles
            .iter()
            .map(|a| a.headline.url.clone())
            .collect();
        let mut inserted = 0;
        for article in articles {
            if seen.insert(article.headline.url.clone()) {
                inner.articles.push(article.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn find_partition(
        &self,
        partition: &Partition,
        fetched_since: DateTime<Utc>,
    ) -> Result<Vec<CachedArticle>> {
        let inner = self.inner.read().await;
        let mut found: Vec<CachedArticle> = inner
            .articles
            .iter()
            .filter(|a| a.partition() == *partition && a.fetched_at >= fetched_since)
            .cloned()
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }

    async fn search(
        &self,
        query: &str,
        language: &str,
        fetched_since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CachedArticle>> {
        let needle = query.to_lowercase();
        let inner = self.inner.read().await;
        let mut found: Vec<CachedArticle> = inner
            .articles
            .iter()
            .filter(|a| {
                a.language == language
                    && a.fetched_at >= fetched_since
                    && matches_query(a, &needle)
            })
            .cloned()
            .collect();
        sort_newest_first(&mut found);
        found.truncate(limit);
        Ok(found)
    }

    async fn delete_partition(&self, partition: &Partition) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.articles.len();
        inner.articles.retain(|a| a.partition() != *partition);
        Ok((before - inner.articles.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.articles.len();
        inner.articles.retain(|a| !a.is_expired(now));
        Ok((before - inner.articles.len()) as u64)
    }

    async fn count_partition(&self, partition: &Partition) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .articles
            .iter()
            .filter(|a| a.partition() == *partition)
            .count() as u64)
    }
}

fn paginate(mut records: Vec<UserArticle>, page: u32, per_page: u32) -> Page<UserArticle> {
    let total = records.len() as u64;
    let page = page.max(1);
    let per_page = per_page.max(1);
    let start = ((page - 1) as usize).saturating_mul(per_page as usize);
    let items = if start >= records.len() {
        Vec::new()
    } else {
        records.drain(start..).take(per_page as usize).collect()
    };
    Page {
        items,
        total,
        page,
        per_page,
    }
}

impl MemoryInner {
    fn entry_for(&mut self, user_id: &str, article: &ArticleRef) -> &mut UserArticle {
        let key = (user_id.to_string(), article.url.clone());
        let entry = self.user_articles.entry(key).or_insert_with(|| UserArticle {
            user_id: user_id.to_string(),
            url: article.url.clone(),
            title: None,
            source: None,
            image_url: None,
            is_read: false,
            is_favorite: false,
            read_at: None,
            favorited_at: None,
        });
        if article.title.is_some() {
            entry.title = article.title.clone();
        }
        if article.source.is_some() {
            entry.source = article.source.clone();
        }
        if article.image_url.is_some() {
            entry.image_url = article.image_url.clone();
        }
        entry
    }
}

#[async_trait]
impl UserNewsStore for MemoryStore {
    async fn mark_read(&self, user_id: &str, article: &ArticleRef) -> Result<UserArticle> {
        let mut inner = self.inner.write().await;
        let entry = inner.entry_for(user_id, article);
        entry.is_read = true;
        entry.read_at = Some(Utc::now());
        Ok(entry.clone())
    }

    async fn set_favorite(
        &self,
        user_id: &str,
        article: &ArticleRef,
        favorite: bool,
    ) -> Result<UserArticle> {
        let mut inner = self.inner.write().await;
        let entry = inner.entry_for(user_id, article);
        entry.is_favorite = favorite;
        entry.favorited_at = favorite.then(Utc::now);
        Ok(entry.clone())
    }

    async fn list_read(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<UserArticle>> {
        let inner = self.inner.read().await;
        let mut records: Vec<UserArticle> = inner
            .user_articles
            .values()
            .filter(|r| r.user_id == user_id && r.is_read)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.read_at.cmp(&a.read_at));
        Ok(paginate(records, page, per_page))
    }

    async fn list_favorites(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<UserArticle>> {
        let inner = self.inner.read().await;
        let mut records: Vec<UserArticle> = inner
            .user_articles
            .values()
            .filter(|r| r.user_id == user_id && r.is_favorite)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.favorited_at.cmp(&a.favorited_at));
        Ok(paginate(records, page, per_page))
    }
}
