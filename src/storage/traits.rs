use async_trait::async_trait;

use crate::stream::BoxedSource;

/// Result type for source lookups
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that can occur while resolving an item to a byte source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Item {0} holds no readable file")]
    Empty(String),

    #[error("Source storage is not configured: {0}")]
    NotConfigured(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves an item id to a readable byte source.
///
/// Callers are expected to have authorized the id already; providers only
/// guard against ids escaping their own namespace.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Open the byte source behind `item_id` for exclusive reading
    async fn open_source(&self, item_id: &str) -> SourceResult<BoxedSource>;
}
