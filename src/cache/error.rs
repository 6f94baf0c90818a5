//! Error types for cache store operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache entry not found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
