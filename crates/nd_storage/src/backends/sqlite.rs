use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use nd_core::{
    ArticleRef, ArticleStore, CachedArticle, Error, Headline, Page, Partition, Result,
    UserArticle, UserNewsStore,
};
use nd_core::types::ArticleSource;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        url TEXT PRIMARY KEY,
        source_id TEXT,
        source_name TEXT,
        author TEXT,
        title TEXT NOT NULL,
        description TEXT,
        image_url TEXT,
        published_at TEXT,
        content TEXT,
        category TEXT NOT NULL,
        country TEXT NOT NULL,
        language TEXT NOT NULL,
        fetched_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_articles_partition
    ON articles (category, country, language, fetched_at)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_articles_expires_at
    ON articles (expires_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_articles (
        user_id TEXT NOT NULL,
        url TEXT NOT NULL,
        title TEXT,
        source TEXT,
        image_url TEXT,
        is_read INTEGER NOT NULL DEFAULT 0,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        read_at TEXT,
        favorited_at TEXT,
        PRIMARY KEY (user_id, url)
    )
    "#,
];

/// SQLite backend. Timestamps are stored as RFC3339 text with a fixed
/// precision and Z offset so lexicographic comparison matches time order.
pub struct SqliteStore {
    pool: SqlitePool,
}

fn storage_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Storage(format!("{}: {}", context, e))
}

fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| storage_err("failed to parse timestamp", e))
}

impl SqliteStore {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| storage_err("failed to open database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| storage_err(&format!("failed to run migration {}", i), e))?;
        }

        Ok(Self { pool })
    }

    fn row_to_article(row: &sqlx::sqlite::SqliteRow) -> Result<CachedArticle> {
        let published_at = row
            .get::<Option<String>, _>("published_at")
            .as_deref()
            .map(parse_ts)
            .transpose()?;
        let category: String = row.get("category");

        Ok(CachedArticle {
            headline: Headline {
                source: ArticleSource {
                    id: row.get("source_id"),
                    name: row.get("source_name"),
                },
                author: row.get("author"),
                title: row.get("title"),
                description: row.get("description"),
                url: row.get("url"),
                image_url: row.get("image_url"),
                published_at,
                content: row.get("content"),
            },
            category: category.parse()?,
            country: row.get("country"),
            language: row.get("language"),
            fetched_at: parse_ts(row.get::<String, _>("fetched_at").as_str())?,
            expires_at: parse_ts(row.get::<String, _>("expires_at").as_str())?,
        })
    }

    fn row_to_user_article(row: &sqlx::sqlite::SqliteRow) -> Result<UserArticle> {
        let read_at = row
            .get::<Option<String>, _>("read_at")
            .as_deref()
            .map(parse_ts)
            .transpose()?;
        let favorited_at = row
            .get::<Option<String>, _>("favorited_at")
            .as_deref()
            .map(parse_ts)
            .transpose()?;

        Ok(UserArticle {
            user_id: row.get("user_id"),
            url: row.get("url"),
            title: row.get("title"),
            source: row.get("source"),
            image_url: row.get("image_url"),
            is_read: row.get::<i64, _>("is_read") != 0,
            is_favorite: row.get::<i64, _>("is_favorite") != 0,
            read_at,
            favorited_at,
        })
    }

    async fn get_user_article(&self, user_id: &str, url: &str) -> Result<UserArticle> {
        let row = sqlx::query("SELECT * FROM user_articles WHERE user_id = ? AND url = ?")
            .bind(user_id)
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage_err("failed to load user article", e))?;
        Self::row_to_user_article(&row)
    }

    async fn upsert_user_article(&self, user_id: &str, article: &ArticleRef) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_articles (user_id, url, title, source, image_url)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id, url) DO UPDATE SET
                title = COALESCE(excluded.title, user_articles.title),
                source = COALESCE(excluded.source, user_articles.source),
                image_url = COALESCE(excluded.image_url, user_articles.image_url)
            "#,
        )
        .bind(user_id)
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.source)
        .bind(&article.image_url)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("failed to upsert user article", e))?;
        Ok(())
    }

    async fn list_user_articles(
        &self,
        user_id: &str,
        flag_column: &str,
        order_column: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<UserArticle>> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM user_articles WHERE user_id = ? AND {} = 1",
            flag_column
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("failed to count user articles", e))?;

        let rows = sqlx::query(&format!(
            "SELECT * FROM user_articles WHERE user_id = ? AND {} = 1 \
             ORDER BY {} DESC LIMIT ? OFFSET ?",
            flag_column, order_column
        ))
        .bind(user_id)
        .bind(per_page as i64)
        .bind(((page - 1) as i64) * per_page as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("failed to list user articles", e))?;

        let items = rows
            .iter()
            .map(Self::row_to_user_article)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total: total as u64,
            page,
            per_page,
        })
    }
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn insert_articles(&self, articles: &[CachedArticle]) -> Result<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_err("failed to begin transaction", e))?;

        let mut inserted = 0;
        for article in articles {
            // OR IGNORE drops batch entries whose URL is already stored.
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO articles
                (url, source_id, source_name, author, title, description, image_url,
                 published_at, content, category, country, language, fetched_at, expires_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&article.headline.url)
            .bind(&article.headline.source.id)
            .bind(&article.headline.source.name)
            .bind(&article.headline.author)
            .bind(&article.headline.title)
            .bind(&article.headline.description)
            .bind(&article.headline.image_url)
            .bind(article.headline.published_at.map(ts))
            .bind(&article.headline.content)
            .bind(article.category.as_str())
            .bind(&article.country)
            .bind(&article.language)
            .bind(ts(article.fetched_at))
            .bind(ts(article.expires_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_err("failed to insert article", e))?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit()
            .await
            .map_err(|e| storage_err("failed to commit article batch", e))?;
        Ok(inserted)
    }

    async fn find_partition(
        &self,
        partition: &Partition,
        fetched_since: DateTime<Utc>,
    ) -> Result<Vec<CachedArticle>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE category = ? AND country = ? AND language = ? AND fetched_at >= ?
            ORDER BY published_at DESC
            "#,
        )
        .bind(partition.category.as_str())
        .bind(&partition.country)
        .bind(&partition.language)
        .bind(ts(fetched_since))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("failed to query partition", e))?;

        rows.iter().map(Self::row_to_article).collect()
    }

    async fn search(
        &self,
        query: &str,
        language: &str,
        fetched_since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CachedArticle>> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE language = ? AND fetched_at >= ?
              AND (title LIKE ? OR description LIKE ? OR content LIKE ?)
            ORDER BY published_at DESC
            LIMIT ?
            "#,
        )
        .bind(language)
        .bind(ts(fetched_since))
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("failed to search articles", e))?;

        rows.iter().map(Self::row_to_article).collect()
    }

    async fn delete_partition(&self, partition: &Partition) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM articles WHERE category = ? AND country = ? AND language = ?")
                .bind(partition.category.as_str())
                .bind(&partition.country)
                .bind(&partition.language)
                .execute(&self.pool)
                .await
                .map_err(|e| storage_err("failed to delete partition", e))?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM articles WHERE expires_at <= ?")
            .bind(ts(now))
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("failed to delete expired articles", e))?;
        Ok(result.rows_affected())
    }

    async fn count_partition(&self, partition: &Partition) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM articles WHERE category = ? AND country = ? AND language = ?",
        )
        .bind(partition.category.as_str())
        .bind(&partition.country)
        .bind(&partition.language)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("failed to count partition", e))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl UserNewsStore for SqliteStore {
    async fn mark_read(&self, user_id: &str, article: &ArticleRef) -> Result<UserArticle> {
        self.upsert_user_article(user_id, article).await?;
        sqlx::query("UPDATE user_articles SET is_read = 1, read_at = ? WHERE user_id = ? AND url = ?")
            .bind(ts(Utc::now()))
            .bind(user_id)
            .bind(&article.url)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("failed to mark article read", e))?;
        self.get_user_article(user_id, &article.url).await
    }

    async fn set_favorite(
        &self,
        user_id: &str,
        article: &ArticleRef,
        favorite: bool,
    ) -> Result<UserArticle> {
        self.upsert_user_article(user_id, article).await?;
        sqlx::query(
            "UPDATE user_articles SET is_favorite = ?, favorited_at = ? WHERE user_id = ? AND url = ?",
        )
        .bind(favorite as i64)
        .bind(favorite.then(|| ts(Utc::now())))
        .bind(user_id)
        .bind(&article.url)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("failed to set favorite", e))?;
        self.get_user_article(user_id, &article.url).await
    }

    async fn list_read(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<UserArticle>> {
        self.list_user_articles(user_id, "is_read", "read_at", page, per_page)
            .await
    }

    async fn list_favorites(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<UserArticle>> {
        self.list_user_articles(user_id, "is_favorite", "favorited_at", page, per_page)
            .await
    }
}
