pub mod cache;
pub mod refresh;
pub mod service;

pub use cache::NewsCache;
pub use refresh::{unique_partitions, RefreshConfig, RefreshScheduler, TickSummary};
pub use service::NewsService;

pub mod prelude {
    pub use super::{NewsCache, NewsService, RefreshScheduler};
    pub use nd_core::{Error, NewsResponse, Partition, Result, SearchResponse};
}
