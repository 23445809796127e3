use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

pub const DEFAULT_COUNTRY: &str = "us";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Topics the upstream headline API can be queried by.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Business,
    Entertainment,
    #[default]
    General,
    Health,
    Science,
    Sports,
    Technology,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Business => "business",
            Category::Entertainment => "entertainment",
            Category::General => "general",
            Category::Health => "health",
            Category::Science => "science",
            Category::Sports => "sports",
            Category::Technology => "technology",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "business" => Ok(Category::Business),
            "entertainment" => Ok(Category::Entertainment),
            "general" => Ok(Category::General),
            "health" => Ok(Category::Health),
            "science" => Ok(Category::Science),
            "sports" => Ok(Category::Sports),
            "technology" => Ok(Category::Technology),
            other => Err(Error::Storage(format!("unknown category: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// One article as returned by the upstream source, before any cache stamping.
/// The URL is the article's identity everywhere in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub source: ArticleSource,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
}

/// The dimensions the upstream source is queried along. Fully determines
/// which cached batch a read or refresh touches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    pub category: Category,
    pub country: String,
    pub language: String,
}

impl Partition {
    pub fn new(category: Category, country: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            category,
            country: country.into().to_lowercase(),
            language: language.into().to_lowercase(),
        }
    }

    /// Resolve a user's preference record to the partition served for it:
    /// first category wins, missing fields fall back to defaults.
    pub fn from_preferences(prefs: &NewsPreferences) -> Self {
        Self::new(
            prefs.categories.first().copied().unwrap_or_default(),
            prefs.country.as_deref().unwrap_or(DEFAULT_COUNTRY),
            prefs.language.as_deref().unwrap_or(DEFAULT_LANGUAGE),
        )
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.category, self.country, self.language)
    }
}

/// A headline persisted in the cache, tagged with the partition it was
/// fetched for and its freshness window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedArticle {
    #[serde(flatten)]
    pub headline: Headline,
    pub category: Category,
    pub country: String,
    pub language: String,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedArticle {
    pub fn from_headline(
        headline: Headline,
        partition: &Partition,
        fetched_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            headline,
            category: partition.category,
            country: partition.country.clone(),
            language: partition.language.clone(),
            fetched_at,
            expires_at,
        }
    }

    pub fn partition(&self) -> Partition {
        Partition::new(self.category, self.country.clone(), self.language.clone())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A user's news preferences as owned by the (external) user records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsPreferences {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsResponse {
    pub total_results: u64,
    pub articles: Vec<Headline>,
    pub from_cache: bool,
    pub partition: Partition,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub total_results: u64,
    pub articles: Vec<Headline>,
    pub query: String,
    pub from_cache: bool,
}

/// The minimal article identity callers pass when marking read/favorite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleRef {
    pub url: String,
    pub title: Option<String>,
    pub source: Option<String>,
    pub image_url: Option<String>,
}

/// Per-user read/favorite state for one article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserArticle {
    pub user_id: String,
    pub url: String,
    pub title: Option<String>,
    pub source: Option<String>,
    pub image_url: Option<String>,
    pub is_read: bool,
    pub is_favorite: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub favorited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_defaults_from_empty_preferences() {
        let partition = Partition::from_preferences(&NewsPreferences::default());
        assert_eq!(partition.category, Category::General);
        assert_eq!(partition.country, "us");
        assert_eq!(partition.language, "en");
    }

    #[test]
    fn partition_takes_first_category() {
        let prefs = NewsPreferences {
            categories: vec![Category::Technology, Category::Sports],
            country: Some("GB".to_string()),
            language: Some("en".to_string()),
        };
        let partition = Partition::from_preferences(&prefs);
        assert_eq!(partition.category, Category::Technology);
        assert_eq!(partition.country, "gb");
    }

    #[test]
    fn category_round_trips_through_str() {
        for category in [
            Category::Business,
            Category::Entertainment,
            Category::General,
            Category::Health,
            Category::Science,
            Category::Sports,
            Category::Technology,
        ] {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
    }
}
