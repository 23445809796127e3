use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("news API key is not configured")]
    MissingApiKey,

    #[error("invalid news API key")]
    InvalidApiKey,

    #[error("news API rate limit exceeded, try again later")]
    RateLimited,

    #[error("news API error: {0}")]
    Upstream(String),

    #[error("no response from news API: {0}")]
    NoResponse(String),

    #[error("search query is required")]
    EmptyQuery,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
