//! Outcome handlers and callback dispatch
//!
//! A `CallbackSet` holds the optional outcome handlers for one execution
//! plus a list of passive observers that see every outcome. Dispatch
//! resolves to exactly one terminal path: success, or one of the three
//! failure handlers, always followed by `on_finally`. Handlers are
//! shared `Fn` closures so a background refresh can reuse them.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;

use crate::outcome::{Failure, FailureKind, Outcome};

type SuccessFn<X> = Arc<dyn Fn(&X) + Send + Sync>;
type FailureFn<M> = Arc<dyn Fn(M, &Failure) + Send + Sync>;
type FinallyFn = Arc<dyn Fn(bool, Option<u16>) + Send + Sync>;
type ObserverFn<X> = Arc<dyn Fn(Option<&X>, bool, Option<u16>) + Send + Sync>;

/// Identifier for a registered observer, used to remove it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(u64);

/// Handlers and observers for one execution
///
/// `X` is the response payload type, `M` the declared error-body type.
/// The observer list is shared between clones, so executions minted from
/// one configuration tolerate concurrent registration; each dispatch pass
/// iterates a snapshot.
pub struct CallbackSet<X, M> {
    pub(crate) on_success: Option<SuccessFn<X>>,
    pub(crate) on_server_error: Option<FailureFn<M>>,
    pub(crate) on_client_error: Option<FailureFn<M>>,
    pub(crate) on_failure: Option<FailureFn<M>>,
    pub(crate) on_finally: Option<FinallyFn>,
    observers: Arc<RwLock<Vec<(ObserverId, ObserverFn<X>)>>>,
    next_observer_id: Arc<AtomicU64>,
}

impl<X, M> Default for CallbackSet<X, M> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_server_error: None,
            on_client_error: None,
            on_failure: None,
            on_finally: None,
            observers: Arc::new(RwLock::new(Vec::new())),
            next_observer_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<X, M> Clone for CallbackSet<X, M> {
    fn clone(&self) -> Self {
        Self {
            on_success: self.on_success.clone(),
            on_server_error: self.on_server_error.clone(),
            on_client_error: self.on_client_error.clone(),
            on_failure: self.on_failure.clone(),
            on_finally: self.on_finally.clone(),
            observers: Arc::clone(&self.observers),
            next_observer_id: Arc::clone(&self.next_observer_id),
        }
    }
}

impl<X, M> CallbackSet<X, M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_on_success(&mut self, handler: impl Fn(&X) + Send + Sync + 'static) {
        self.on_success = Some(Arc::new(handler));
    }

    pub fn set_on_server_error(&mut self, handler: impl Fn(M, &Failure) + Send + Sync + 'static) {
        self.on_server_error = Some(Arc::new(handler));
    }

    pub fn set_on_client_error(&mut self, handler: impl Fn(M, &Failure) + Send + Sync + 'static) {
        self.on_client_error = Some(Arc::new(handler));
    }

    /// Handler for any failure classification not claimed by a more
    /// specific handler
    pub fn set_on_failure(&mut self, handler: impl Fn(M, &Failure) + Send + Sync + 'static) {
        self.on_failure = Some(Arc::new(handler));
    }

    pub fn set_on_finally(&mut self, handler: impl Fn(bool, Option<u16>) + Send + Sync + 'static) {
        self.on_finally = Some(Arc::new(handler));
    }

    /// Register an observer notified of every outcome
    pub fn add_observer(
        &self,
        observer: impl Fn(Option<&X>, bool, Option<u16>) + Send + Sync + 'static,
    ) -> ObserverId {
        let id = ObserverId(self.next_observer_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(observer)));
        id
    }

    /// Remove a previously registered observer
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    fn observer_snapshot(&self) -> Vec<ObserverFn<X>> {
        self.observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }

    /// Callback set for a reprocessing background refresh: the four
    /// outcome handlers are shared, observers and `on_finally` are not
    pub(crate) fn for_reprocess(&self) -> Self {
        Self {
            on_success: self.on_success.clone(),
            on_server_error: self.on_server_error.clone(),
            on_client_error: self.on_client_error.clone(),
            on_failure: self.on_failure.clone(),
            on_finally: None,
            observers: Arc::new(RwLock::new(Vec::new())),
            next_observer_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Resolve an outcome through a callback set.
///
/// Runs synchronously on the caller's task. Exactly one of the failure
/// handlers fires per failure; `on_finally` fires exactly once per call.
pub fn dispatch<X, M>(outcome: &Outcome<X>, callbacks: &CallbackSet<X, M>)
where
    M: DeserializeOwned + Default + 'static,
{
    match outcome {
        Outcome::Success {
            payload, status, ..
        } => {
            if let (Some(payload), Some(handler)) = (payload.as_ref(), callbacks.on_success.as_ref())
            {
                handler(payload);
            }
            for observer in callbacks.observer_snapshot() {
                observer(payload.as_ref(), true, Some(*status));
            }
        }
        Outcome::Failure(failure) => {
            for observer in callbacks.observer_snapshot() {
                observer(None, false, failure.status);
            }
            dispatch_failure(failure, callbacks);
        }
    }

    if let Some(finally) = callbacks.on_finally.as_ref() {
        finally(outcome.is_success(), outcome.status());
    }
}

fn dispatch_failure<X, M>(failure: &Failure, callbacks: &CallbackSet<X, M>)
where
    M: DeserializeOwned + Default + 'static,
{
    // Strict precedence: the specific handler for the classification,
    // then the generic handler for anything.
    let handler = match failure.kind {
        FailureKind::Server if callbacks.on_server_error.is_some() => {
            callbacks.on_server_error.as_ref()
        }
        FailureKind::Client if callbacks.on_client_error.is_some() => {
            callbacks.on_client_error.as_ref()
        }
        _ => callbacks.on_failure.as_ref(),
    };

    match handler {
        Some(handler) => handler(decode_error_body::<M>(&failure.error_body), failure),
        None => tracing::debug!(kind = %failure.kind, "no failure handler registered"),
    }
}

/// Decode a raw error body into the declared error type.
///
/// The raw-string type receives the body verbatim; any other type is
/// decoded from JSON, falling back to its default value so the handler
/// still fires.
pub(crate) fn decode_error_body<M>(raw: &str) -> M
where
    M: DeserializeOwned + Default + 'static,
{
    if TypeId::of::<M>() == TypeId::of::<String>() {
        let boxed: Box<dyn Any> = Box::new(raw.to_string());
        if let Ok(string) = boxed.downcast::<M>() {
            return *string;
        }
    }

    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "error body did not decode into the declared type; using default");
            M::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Deserialize, Default, PartialEq)]
    struct ApiError {
        code: u32,
        message: String,
    }

    fn success_outcome(payload: Option<String>, status: u16) -> Outcome<String> {
        Outcome::Success {
            payload,
            status,
            headers: HashMap::new(),
        }
    }

    fn failure_outcome(kind: FailureKind, status: Option<u16>, body: &str) -> Outcome<String> {
        Outcome::Failure(Failure {
            kind,
            status,
            error_body: body.to_string(),
            detail: String::new(),
        })
    }

    #[test]
    fn test_success_invokes_handler_and_observers() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut callbacks: CallbackSet<String, String> = CallbackSet::new();

        let log = Arc::clone(&seen);
        callbacks.set_on_success(move |payload| log.lock().push(format!("success:{}", payload)));
        let log = Arc::clone(&seen);
        callbacks.add_observer(move |payload, success, status| {
            log.lock()
                .push(format!("observe:{:?}:{}:{:?}", payload, success, status))
        });

        dispatch(&success_outcome(Some("data".to_string()), 200), &callbacks);

        let seen = seen.lock();
        assert_eq!(seen[0], "success:data", "handler fires before observers");
        assert_eq!(seen[1], "observe:Some(\"data\"):true:Some(200)");
    }

    #[test]
    fn test_void_success_skips_success_handler() {
        let invoked = Arc::new(Mutex::new(0));
        let mut callbacks: CallbackSet<String, String> = CallbackSet::new();

        let count = Arc::clone(&invoked);
        callbacks.set_on_success(move |_| *count.lock() += 1);

        dispatch(&success_outcome(None, 204), &callbacks);

        assert_eq!(
            *invoked.lock(),
            0,
            "a payloadless success must not invoke on_success"
        );
    }

    #[test]
    fn test_server_failure_prefers_server_handler() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut callbacks: CallbackSet<String, String> = CallbackSet::new();

        let log = Arc::clone(&seen);
        callbacks.set_on_server_error(move |body, _| log.lock().push(format!("server:{}", body)));
        let log = Arc::clone(&seen);
        callbacks.set_on_client_error(move |body, _| log.lock().push(format!("client:{}", body)));

        dispatch(
            &failure_outcome(FailureKind::Server, Some(503), "overloaded"),
            &callbacks,
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 1, "exactly one failure handler fires");
        assert_eq!(seen[0], "server:overloaded");
    }

    #[test]
    fn test_client_handler_does_not_claim_server_failures() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut callbacks: CallbackSet<String, String> = CallbackSet::new();

        let log = Arc::clone(&seen);
        callbacks.set_on_client_error(move |body, _| log.lock().push(format!("client:{}", body)));

        dispatch(
            &failure_outcome(FailureKind::Server, Some(500), "boom"),
            &callbacks,
        );

        assert!(
            seen.lock().is_empty(),
            "a client handler only fires for client failures"
        );
    }

    #[test]
    fn test_generic_handler_catches_any_classification() {
        let seen = Arc::new(Mutex::new(Vec::<FailureKind>::new()));
        let mut callbacks: CallbackSet<String, String> = CallbackSet::new();

        let log = Arc::clone(&seen);
        callbacks.set_on_failure(move |_, failure| log.lock().push(failure.kind));

        dispatch(
            &failure_outcome(FailureKind::Connection, None, ""),
            &callbacks,
        );
        dispatch(
            &failure_outcome(FailureKind::Client, Some(404), "missing"),
            &callbacks,
        );

        let seen = seen.lock();
        assert_eq!(*seen, vec![FailureKind::Connection, FailureKind::Client]);
    }

    #[test]
    fn test_failure_observers_see_no_payload() {
        let seen = Arc::new(Mutex::new(Vec::<(bool, Option<u16>)>::new()));
        let callbacks: CallbackSet<String, String> = CallbackSet::new();

        let log = Arc::clone(&seen);
        callbacks.add_observer(move |payload, success, status| {
            assert!(payload.is_none());
            log.lock().push((success, status));
        });

        dispatch(
            &failure_outcome(FailureKind::Client, Some(404), "missing"),
            &callbacks,
        );

        assert_eq!(*seen.lock(), vec![(false, Some(404))]);
    }

    #[test]
    fn test_on_finally_fires_last_for_success_and_failure() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut callbacks: CallbackSet<String, String> = CallbackSet::new();

        let log = Arc::clone(&seen);
        callbacks.set_on_success(move |_| log.lock().push("success".to_string()));
        let log = Arc::clone(&seen);
        callbacks.set_on_failure(move |_, _| log.lock().push("failure".to_string()));
        let log = Arc::clone(&seen);
        callbacks
            .set_on_finally(move |ok, status| log.lock().push(format!("finally:{}:{:?}", ok, status)));

        dispatch(&success_outcome(Some("data".to_string()), 200), &callbacks);
        dispatch(
            &failure_outcome(FailureKind::Server, Some(500), ""),
            &callbacks,
        );

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                "success".to_string(),
                "finally:true:Some(200)".to_string(),
                "failure".to_string(),
                "finally:false:Some(500)".to_string(),
            ]
        );
    }

    #[test]
    fn test_error_body_decodes_into_declared_type() {
        let seen = Arc::new(Mutex::new(None::<ApiError>));
        let mut callbacks: CallbackSet<String, ApiError> = CallbackSet::new();

        let slot = Arc::clone(&seen);
        callbacks.set_on_server_error(move |body, _| *slot.lock() = Some(body));

        dispatch(
            &Outcome::<String>::Failure(Failure {
                kind: FailureKind::Server,
                status: Some(500),
                error_body: r#"{"code": 31, "message": "backend down"}"#.to_string(),
                detail: String::new(),
            }),
            &callbacks,
        );

        assert_eq!(
            seen.lock().clone(),
            Some(ApiError {
                code: 31,
                message: "backend down".to_string()
            })
        );
    }

    #[test]
    fn test_undecodable_error_body_falls_back_to_default() {
        let seen = Arc::new(Mutex::new(None::<ApiError>));
        let mut callbacks: CallbackSet<String, ApiError> = CallbackSet::new();

        let slot = Arc::clone(&seen);
        callbacks.set_on_server_error(move |body, _| *slot.lock() = Some(body));

        dispatch(
            &Outcome::<String>::Failure(Failure {
                kind: FailureKind::Server,
                status: Some(500),
                error_body: "<html>gateway error</html>".to_string(),
                detail: String::new(),
            }),
            &callbacks,
        );

        assert_eq!(
            seen.lock().clone(),
            Some(ApiError::default()),
            "the handler still fires, with a default-constructed error value"
        );
    }

    #[test]
    fn test_string_error_type_receives_raw_body() {
        let decoded: String = decode_error_body("overloaded");
        assert_eq!(decoded, "overloaded", "raw-string error type skips JSON decode");
    }

    #[test]
    fn test_removed_observer_is_not_notified() {
        let count = Arc::new(Mutex::new(0));
        let callbacks: CallbackSet<String, String> = CallbackSet::new();

        let counter = Arc::clone(&count);
        let id = callbacks.add_observer(move |_, _, _| *counter.lock() += 1);

        dispatch(&success_outcome(Some("a".to_string()), 200), &callbacks);
        assert!(callbacks.remove_observer(id));
        dispatch(&success_outcome(Some("b".to_string()), 200), &callbacks);

        assert_eq!(*count.lock(), 1);
        assert!(!callbacks.remove_observer(id), "double removal reports false");
    }

    #[test]
    fn test_clones_share_the_observer_list() {
        let count = Arc::new(Mutex::new(0));
        let callbacks: CallbackSet<String, String> = CallbackSet::new();
        let cloned = callbacks.clone();

        let counter = Arc::clone(&count);
        cloned.add_observer(move |_, _, _| *counter.lock() += 1);

        dispatch(&success_outcome(Some("a".to_string()), 200), &callbacks);

        assert_eq!(
            *count.lock(),
            1,
            "an observer registered through a clone is visible to the original"
        );
    }

    #[test]
    fn test_reprocess_set_drops_finally_and_observers() {
        let mut callbacks: CallbackSet<String, String> = CallbackSet::new();
        callbacks.set_on_success(|_| {});
        callbacks.set_on_finally(|_, _| {});
        callbacks.add_observer(|_, _, _| {});

        let reprocess = callbacks.for_reprocess();

        assert!(reprocess.on_success.is_some());
        assert!(reprocess.on_finally.is_none());
        assert!(reprocess.observers.read().is_empty());
    }
}
