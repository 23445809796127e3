pub mod client;
pub mod response;

pub use client::{NewsApiClient, NewsApiConfig, DEFAULT_BASE_URL};

pub mod prelude {
    pub use super::client::{NewsApiClient, NewsApiConfig};
    pub use nd_core::{Error, NewsSource, Result};
}
