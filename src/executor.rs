//! Request executor
//!
//! A `RestCall` owns the full lifecycle of one descriptor: resolve the
//! cache, fetch over the transport when the cache can't answer, classify
//! whatever went wrong, and hand the final outcome to the callback
//! dispatcher. Every failure is captured and converted into an outcome;
//! nothing escapes the executor as a panic or an error return.
//!
//! One instance executes one descriptor exactly once: `run` and `spawn`
//! consume `self`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheKey, FileStore};
use crate::callbacks::{dispatch, CallbackSet, ObserverId};
use crate::classify::{classify_decode_failure, classify_reply, classify_transport_error};
use crate::fingerprint::fingerprint;
use crate::outcome::{Failure, FailureKind, Outcome};
use crate::request::{is_void, type_tag, RequestDescriptor};
use crate::transport::{HttpTransport, TransportCall};

/// Synthetic status reported when a cached payload stands in for a live
/// response
const CACHE_SERVED_STATUS: u16 = 200;

/// Executor for one request
///
/// `T` is the request body type, `X` the response payload type (`()` for
/// calls with no payload), `M` the declared error-body type (`String`
/// receives raw error bodies verbatim).
pub struct RestCall<T = (), X = (), M = String> {
    descriptor: RequestDescriptor<T>,
    callbacks: CallbackSet<X, M>,
    transport: Arc<dyn HttpTransport>,
    store: Arc<FileStore>,
}

impl<T, X, M> RestCall<T, X, M>
where
    T: Serialize + Clone + Send + Sync + 'static,
    X: DeserializeOwned + Serialize + Send + Sync + 'static,
    M: DeserializeOwned + Default + Send + Sync + 'static,
{
    pub fn new(
        descriptor: RequestDescriptor<T>,
        transport: Arc<dyn HttpTransport>,
        store: Arc<FileStore>,
    ) -> Self {
        Self {
            descriptor,
            callbacks: CallbackSet::new(),
            transport,
            store,
        }
    }

    pub fn descriptor(&self) -> &RequestDescriptor<T> {
        &self.descriptor
    }

    /// Handler invoked with the decoded payload on success
    pub fn on_success(mut self, handler: impl Fn(&X) + Send + Sync + 'static) -> Self {
        self.callbacks.set_on_success(handler);
        self
    }

    /// Handler invoked on 5xx failures
    pub fn on_server_error(
        mut self,
        handler: impl Fn(M, &Failure) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.set_on_server_error(handler);
        self
    }

    /// Handler invoked on 4xx failures
    pub fn on_client_error(
        mut self,
        handler: impl Fn(M, &Failure) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.set_on_client_error(handler);
        self
    }

    /// Handler invoked on any failure not claimed by a more specific
    /// handler
    pub fn on_failure(mut self, handler: impl Fn(M, &Failure) + Send + Sync + 'static) -> Self {
        self.callbacks.set_on_failure(handler);
        self
    }

    /// Handler invoked exactly once after resolution, success or failure
    pub fn on_finally(mut self, handler: impl Fn(bool, Option<u16>) + Send + Sync + 'static) -> Self {
        self.callbacks.set_on_finally(handler);
        self
    }

    /// Register a passive observer notified of every outcome
    pub fn observe(
        self,
        observer: impl Fn(Option<&X>, bool, Option<u16>) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.add_observer(observer);
        self
    }

    /// Remove a previously registered observer
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.callbacks.remove_observer(id)
    }

    /// Execute inline on the current task and resolve the callbacks.
    ///
    /// Returns the final boolean result (degraded success included).
    pub async fn run(self) -> bool {
        let outcome = self.execute().await;
        dispatch(&outcome, &self.callbacks);
        outcome.is_success()
    }

    /// Execute on an independent worker task
    pub fn spawn(self) -> tokio::task::JoinHandle<bool> {
        tokio::spawn(self.run())
    }

    async fn execute(&self) -> Outcome<X> {
        if self.cacheable() {
            let key = self.cache_key();
            if self.store.is_fresh(&key, self.descriptor.cache_ttl) {
                match self.store.read::<X>(&key).await {
                    Ok(payload) => {
                        tracing::debug!(key = %key, "serving fresh cache entry");
                        if self.descriptor.automatic_cache_refresh {
                            self.schedule_refresh();
                        }
                        return Outcome::Success {
                            payload: Some(payload),
                            status: CACHE_SERVED_STATUS,
                            headers: HashMap::new(),
                        };
                    }
                    Err(e) => {
                        // Corruption is never fatal; fetch live instead
                        tracing::warn!(key = %key, error = %e, "cache entry unreadable; fetching live");
                    }
                }
            }
        }

        let outcome = enforce_status_authority(self.fetch().await);

        // A failed live call with any readable cache entry, however
        // stale, resolves as a degraded success.
        if let Outcome::Failure(failure) = &outcome {
            if self.cacheable() {
                let key = self.cache_key();
                if let Ok(payload) = self.store.read::<X>(&key).await {
                    tracing::info!(
                        key = %key,
                        kind = %failure.kind,
                        "live call failed; serving cached payload instead"
                    );
                    return Outcome::Success {
                        payload: Some(payload),
                        status: CACHE_SERVED_STATUS,
                        headers: HashMap::new(),
                    };
                }
            }
        }

        outcome
    }

    async fn fetch(&self) -> Outcome<X> {
        let call = match self.transport_call() {
            Ok(call) => call,
            Err(failure) => return Outcome::Failure(failure),
        };

        let reply = match self.transport.invoke(call).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    method = %self.descriptor.method,
                    url = %self.descriptor.url,
                    error = %e,
                    "transport call failed"
                );
                return Outcome::Failure(classify_transport_error(&e));
            }
        };

        let status = reply.status;
        if let Some(failure) = classify_reply(status, &String::from_utf8_lossy(&reply.body)) {
            tracing::warn!(
                method = %self.descriptor.method,
                url = %self.descriptor.url,
                status,
                "request resolved with an error status"
            );
            return Outcome::Failure(failure);
        }

        if is_void::<X>() {
            return Outcome::Success {
                payload: None,
                status,
                headers: reply.headers,
            };
        }

        match serde_json::from_slice::<X>(&reply.body) {
            Ok(payload) => {
                if self.descriptor.cache_enabled {
                    // Write-behind: the receipt is intentionally dropped
                    let _ = self.store.write_behind(&self.cache_key(), &payload);
                }
                Outcome::Success {
                    payload: Some(payload),
                    status,
                    headers: reply.headers,
                }
            }
            Err(e) => {
                tracing::warn!(
                    url = %self.descriptor.url,
                    expected = type_tag::<X>(),
                    error = %e,
                    "response body did not decode"
                );
                Outcome::Failure(classify_decode_failure(&e))
            }
        }
    }

    fn transport_call(&self) -> Result<TransportCall, Failure> {
        let body = match (&self.descriptor.body, self.descriptor.bodyless) {
            (Some(body), false) => match serde_json::to_vec(body) {
                Ok(encoded) => Some(Bytes::from(encoded)),
                Err(e) => {
                    return Err(Failure {
                        kind: FailureKind::Generic,
                        status: None,
                        error_body: String::new(),
                        detail: format!("request body did not encode: {}", e),
                    })
                }
            },
            _ => None,
        };

        Ok(TransportCall {
            method: self.descriptor.method,
            url: self.descriptor.url.clone(),
            headers: self.descriptor.headers.clone(),
            body,
            timeout: self.descriptor.timeout,
        })
    }

    fn cacheable(&self) -> bool {
        self.descriptor.cache_enabled && !is_void::<X>()
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::new(
            type_tag::<X>(),
            fingerprint(
                &self.descriptor.authority,
                &self.descriptor.path,
                &self.descriptor.query,
            ),
        )
    }

    /// Enqueue a background refresh of the entry just served: same
    /// descriptor with the TTL forced to zero so the clone fetches live
    fn schedule_refresh(&self) {
        let mut descriptor = self.descriptor.clone();
        descriptor.cache_ttl = Duration::ZERO;

        let callbacks = if self.descriptor.reprocess_when_refreshing {
            self.callbacks.for_reprocess()
        } else {
            CallbackSet::new()
        };

        crate::refresh::schedule_refresh(RestCall {
            descriptor,
            callbacks,
            transport: Arc::clone(&self.transport),
            store: Arc::clone(&self.store),
        });
    }
}

/// The resolved status is authoritative: a success recorded with an
/// error status is forced to failure
fn enforce_status_authority<X>(outcome: Outcome<X>) -> Outcome<X> {
    match outcome {
        Outcome::Success { status, .. } if status >= 400 => {
            Outcome::Failure(classify_reply(status, "").unwrap_or_else(|| Failure {
                kind: FailureKind::Generic,
                status: Some(status),
                error_body: String::new(),
                detail: format!("unclassifiable error status {}", status),
            }))
        }
        outcome => outcome,
    }
}
