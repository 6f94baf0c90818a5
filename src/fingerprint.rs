//! Request fingerprinting for cache keys
//!
//! A fingerprint is a stable, deterministic digest of a request's
//! destination (authority + path + query). Two requests aimed at the same
//! destination always produce the same fingerprint, so repeated calls
//! resolve to the same cache entry.

use sha2::{Digest, Sha256};

/// Compute the cache fingerprint for a request destination.
///
/// The digest input is `authority + path + query` with every `/` in the
/// path replaced by `_`, hex-encoded SHA-256. Deterministic and pure:
/// identical inputs always yield identical fingerprints.
pub fn fingerprint(authority: &str, path: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed(authority, path, query).as_bytes());
    hex::encode(hasher.finalize())
}

/// The raw concatenation the fingerprint is derived from.
///
/// Usable as a (weaker, collision-prone) key on its own; kept visible for
/// diagnostics and log correlation.
pub fn seed(authority: &str, path: &str, query: &str) -> String {
    format!("{}{}{}", authority, path.replace('/', "_"), query)
}
