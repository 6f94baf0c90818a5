//! Execution outcomes
//!
//! An `Outcome` is produced exactly once per execution and is immutable
//! from then on. Failures carry the classification the dispatcher routes
//! on, the raw error body when one was delivered, and the status code
//! when the failure happened above the connection level.

use std::collections::HashMap;

/// Failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 4xx response
    Client,
    /// 5xx response
    Server,
    /// No response reached the client
    Connection,
    /// Anything else: decode failure, capability misuse
    Generic,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Client => "client error",
            FailureKind::Server => "server error",
            FailureKind::Connection => "connection error",
            FailureKind::Generic => "generic error",
        };
        write!(f, "{}", name)
    }
}

/// One classified failure
#[derive(Debug, Clone)]
pub struct Failure {
    pub kind: FailureKind,
    /// Status code, when a response was delivered
    pub status: Option<u16>,
    /// Raw error body, when one was delivered
    pub error_body: String,
    /// Human-readable cause
    pub detail: String,
}

/// Final result of one execution
#[derive(Debug)]
pub enum Outcome<X> {
    Success {
        /// Decoded payload; `None` for the void response type
        payload: Option<X>,
        status: u16,
        headers: HashMap<String, String>,
    },
    Failure(Failure),
}

impl<X> Outcome<X> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Success { status, .. } => Some(*status),
            Outcome::Failure(failure) => failure.status,
        }
    }
}
