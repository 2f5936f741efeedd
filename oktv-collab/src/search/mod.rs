use async_trait::async_trait;
use thiserror::Error;

mod youtube;

pub use youtube::YouTubeSearch;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search query cannot be empty")]
    EmptyQuery,
    #[error("Search is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("Failed to fetch search results: {0}")]
    FetchError(String),
    #[error("Failed to parse search results: {0}")]
    ParseError(String),
}

/// A single search hit, ready to be queued.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoResult {
    pub video_id: String,
    pub title: String,
    pub thumbnail: String,
    pub channel: String,
}

/// Provides video search. One provider failure is one failed request: no
/// retries, caching, or pagination.
#[async_trait]
pub trait SearchProvider: Send + Sync + 'static {
    async fn search(&self, query: &str) -> Result<Vec<VideoResult>, SearchError>;
}
