//! File-backed response cache
//!
//! This module provides the cache store used by the request executor:
//! - `CacheKey`: response-type-scoped key derived from a request fingerprint
//! - `FileStore`: one file per key under a namespace directory, with
//!   freshness derived from filesystem modification times and a small
//!   in-process memory mirror in front of the disk
//! - `WriteReceipt`: handle to an in-flight write-behind persist
//!
//! Freshness and existence are derived purely from filesystem metadata;
//! there is no index file.

pub use self::error::CacheError;
pub use self::key::CacheKey;
pub use self::store::{FileStore, WriteReceipt};

mod error;
mod key;
mod store;
