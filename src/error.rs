// Error types module

use thiserror::Error;

use crate::cache::CacheError;
use crate::transport::TransportError;

/// Centralized error type for the client library
///
/// Covers the failures that can occur before an execution starts
/// (descriptor validation, factory construction). Failures during an
/// execution never surface here: the executor converts them into an
/// `Outcome` and resolves them through the callback dispatcher.
#[derive(Error, Debug)]
pub enum Error {
    /// The descriptor's URL could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid factory or descriptor configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Cache store failure
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Transport construction failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type for fallible library operations
pub type Result<T> = std::result::Result<T, Error>;
