//! `ClientRequestContext`: the per-attempt bag threaded through the
//! decorator chain.

use crate::endpoint::Endpoint;
use crate::error::FailureContext;
use crate::protocol::SessionProtocol;
use crate::scheduler::EventLoopLease;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Additional headers a decorator stages for the request, ranked between
/// the request's own headers and the client's configured defaults.
#[derive(Debug, Clone, Default)]
pub struct AdditionalHeaders(HashMap<http::HeaderName, http::HeaderValue>);

impl AdditionalHeaders {
    pub fn set(&mut self, name: http::HeaderName, value: http::HeaderValue) {
        self.0.insert(name, value);
    }

    pub fn get(&self, name: &http::HeaderName) -> Option<&http::HeaderValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&http::HeaderName, &http::HeaderValue)> {
        self.0.iter()
    }
}

/// Per-request, per-attempt state. Created at chain entry and carried
/// through every decorator and, on retry, recreated for the next attempt
/// while preserving the original request, attempt counter, and deadline.
pub struct ClientRequestContext {
    pub method: http::Method,
    pub path: String,
    pub authority: Option<String>,
    pub scheme: SessionProtocol,
    pub session_protocol: SessionProtocol,
    pub endpoint: Option<Endpoint>,
    pub event_loop: Option<EventLoopLease>,
    write_timeout: Mutex<Duration>,
    response_timeout: Mutex<Duration>,
    pub max_response_length: Option<u64>,
    pub additional_headers: Mutex<AdditionalHeaders>,
    attrs: Mutex<HashMap<String, String>>,
    pub attempt: AtomicUsize,
    cancelled: Arc<AtomicBool>,
    cancel_notify: Arc<tokio::sync::Notify>,
}

impl ClientRequestContext {
    pub fn new(method: http::Method, path: impl Into<String>, scheme: SessionProtocol) -> Self {
        Self {
            method,
            path: path.into(),
            authority: None,
            scheme,
            session_protocol: scheme,
            endpoint: None,
            event_loop: None,
            write_timeout: Mutex::new(Duration::ZERO),
            response_timeout: Mutex::new(Duration::ZERO),
            max_response_length: None,
            additional_headers: Mutex::new(AdditionalHeaders::default()),
            attrs: Mutex::new(HashMap::new()),
            attempt: AtomicUsize::new(1),
            cancelled: Arc::new(AtomicBool::new(false)),
            cancel_notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_event_loop(mut self, lease: EventLoopLease) -> Self {
        self.event_loop = Some(lease);
        self
    }

    /// A zero duration disables the timeout.
    pub fn response_timeout(&self) -> Duration {
        *self.response_timeout.lock()
    }

    pub fn set_response_timeout(&self, timeout: Duration) {
        *self.response_timeout.lock() = timeout;
    }

    /// Extends (or disables, with `Duration::ZERO`) the response timeout
    /// at runtime; lets a decorator clear a previously configured deadline.
    pub fn clear_response_timeout(&self) {
        self.set_response_timeout(Duration::ZERO);
    }

    pub fn write_timeout(&self) -> Duration {
        *self.write_timeout.lock()
    }

    pub fn set_write_timeout(&self, timeout: Duration) {
        *self.write_timeout.lock() = timeout;
    }

    pub fn set_attr(&self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.lock().insert(key.into(), value.into());
    }

    pub fn attr(&self, key: &str) -> Option<String> {
        self.attrs.lock().get(key).cloned()
    }

    /// Marks the request aborted, e.g. by a circuit breaker tripping while
    /// this attempt is in flight, and wakes any `cancelled()` waiter.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.cancel_notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once [`Self::cancel`] has been called. Callers race this
    /// against the in-flight network call to abort it promptly rather than
    /// waiting for it to time out on its own.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.cancel_notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.attempt.load(Ordering::Acquire)
    }

    /// A snapshot usable for the `Error::context()` accessor.
    pub fn failure_context(&self) -> FailureContext {
        FailureContext {
            method: Some(self.method.clone()),
            path: Some(self.path.clone()),
            endpoint: self.endpoint.as_ref().map(|e| e.to_string()),
            attempt: self.attempt_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_response_timeout_means_disabled() {
        let ctx = ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https);
        assert_eq!(ctx.response_timeout(), Duration::ZERO);
    }

    #[test]
    fn clear_response_timeout_resets_to_zero() {
        let ctx = ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https);
        ctx.set_response_timeout(Duration::from_secs(5));
        ctx.clear_response_timeout();
        assert_eq!(ctx.response_timeout(), Duration::ZERO);
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_once_cancel_was_already_called() {
        let ctx = ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https);
        ctx.cancel();
        assert!(ctx.is_cancelled());
        ctx.cancelled().await;
    }

    #[tokio::test]
    async fn cancelled_wakes_a_waiter_already_parked() {
        let ctx = Arc::new(ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https));
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.cancelled().await })
        };
        tokio::task::yield_now().await;
        ctx.cancel();
        waiter.await.unwrap();
    }
}
