//! Scripted mock transport for testing (in-memory reply queue)

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{HttpTransport, TransportCall, TransportError, TransportReply};

/// Mock transport that pops one scripted result per call and records
/// every call it receives
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    script: Arc<Mutex<VecDeque<Result<TransportReply, TransportError>>>>,
    calls: Arc<Mutex<Vec<TransportCall>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a delivered response with the given status and body
    pub fn push_reply(&self, status: u16, body: &str) {
        self.script.lock().push_back(Ok(TransportReply {
            status,
            headers: HashMap::new(),
            body: Bytes::copy_from_slice(body.as_bytes()),
        }));
    }

    /// Queue a no-response failure
    pub fn push_error(&self, error: TransportError) {
        self.script.lock().push_back(Err(error));
    }

    /// Number of calls performed so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Snapshot of the calls performed so far
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn invoke(&self, call: TransportCall) -> Result<TransportReply, TransportError> {
        self.calls.lock().push(call);

        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("mock script exhausted".to_string())))
    }
}
