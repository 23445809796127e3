pub mod error;
pub mod source;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use source::{FetchedBatch, NewsSource, PreferenceSource};
pub use storage::{ArticleStore, UserNewsStore};
pub use types::{
    ArticleRef, ArticleSource, CachedArticle, Category, Headline, NewsPreferences, NewsResponse,
    Page, Partition, SearchResponse, UserArticle,
};
