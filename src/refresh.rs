//! Delayed cache refresh
//!
//! After a cache hit is served, the executor can enqueue a follow-up
//! execution of the same descriptor to warm the entry back up. The
//! refresh runs on its own task, never blocks or alters the outcome of
//! the request that triggered it, and swallows its own failures: it is
//! best-effort by contract.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::executor::RestCall;

/// Run a brand-new executor lifecycle for `call` in the background.
///
/// The caller is expected to hand over a clone with its cache TTL forced
/// to zero, so the refresh always fetches live.
pub fn schedule_refresh<T, X, M>(call: RestCall<T, X, M>)
where
    T: Serialize + Clone + Send + Sync + 'static,
    X: DeserializeOwned + Serialize + Send + Sync + 'static,
    M: DeserializeOwned + Default + Send + Sync + 'static,
{
    let url = call.descriptor().url().to_string();
    tokio::spawn(async move {
        if call.run().await {
            tracing::debug!(url = %url, "background cache refresh completed");
        } else {
            tracing::warn!(url = %url, "background cache refresh failed");
        }
    });
}
