//! HTTP transport capability
//!
//! This module defines the `HttpTransport` trait the executor calls
//! through. A delivered response is always a `TransportReply`, whatever
//! its status code; `TransportError` is reserved for attempts where no
//! response came back at all. That split is what lets the classifier tell
//! status-carrying failures apart from connection-level ones.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::request::Method;

pub use self::reqwest_transport::ReqwestTransport;

mod reqwest_transport;

#[cfg(test)]
pub(crate) mod mock;

/// One outbound call, fully resolved
#[derive(Debug, Clone)]
pub struct TransportCall {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    /// Read timeout for this call
    pub timeout: Duration,
}

/// A delivered response, any status code included
#[derive(Debug, Clone)]
pub struct TransportReply {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

/// Failure to obtain any response
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether the failure happened below the HTTP layer (nothing was
    /// received from the peer)
    pub fn is_connection_level(&self) -> bool {
        matches!(self, TransportError::Connection(_) | TransportError::Timeout(_))
    }
}

/// Transport capability for executing HTTP calls
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform the call and return the delivered response.
    ///
    /// Implementations must support GET/POST/PUT/DELETE and must return
    /// `Ok` for every delivered response, including 4xx/5xx.
    async fn invoke(&self, call: TransportCall) -> Result<TransportReply, TransportError>;
}
