//! The pool's event-stream listener contract.

use super::key::ConnectionKey;
use crate::error::BoxError;
use std::collections::HashMap;

pub type Attrs = HashMap<String, String>;

/// Subscriber to connection-pool lifecycle events. The pool calls these
/// synchronously and in causal order per key;
/// implementations must not block.
pub trait ConnectionPoolListener: Send + Sync {
    fn connection_pending(&self, key: &ConnectionKey, attrs: &Attrs);

    /// `was_pending` indicates whether a PENDING counter must be
    /// decremented for this key.
    fn connection_failed(&self, key: &ConnectionKey, attrs: &Attrs, cause: &BoxError, was_pending: bool);

    fn connection_opened(&self, key: &ConnectionKey, attrs: &Attrs);

    /// `was_idle` is `true` when the connection was checked out of IDLE
    /// rather than freshly OPENED.
    fn connection_active(&self, key: &ConnectionKey, attrs: &Attrs, was_idle: bool);

    fn connection_idle(&self, key: &ConnectionKey, attrs: &Attrs);

    fn connection_closed(&self, key: &ConnectionKey, attrs: &Attrs, was_idle: bool);
}

/// Maintains the pool's gauges/counters from the same event stream
/// every other listener sees. This is the reference `PoolMetrics` wiring;
/// composite listeners (e.g. this plus a tracing listener) are built by
/// fanning events out to a `Vec<Arc<dyn ConnectionPoolListener>>`.
pub struct CountingListener<M> {
    metrics: M,
}

impl<M: crate::metrics::PoolMetrics> CountingListener<M> {
    pub fn new(metrics: M) -> Self {
        Self { metrics }
    }
}

impl<M: crate::metrics::PoolMetrics> ConnectionPoolListener for CountingListener<M> {
    fn connection_pending(&self, key: &ConnectionKey, _attrs: &Attrs) {
        self.metrics.incr_pending(&key.dial_tag(), 1);
    }

    fn connection_failed(&self, key: &ConnectionKey, _attrs: &Attrs, _cause: &BoxError, was_pending: bool) {
        self.metrics.incr_failed(&key.tag());
        if was_pending {
            self.metrics.incr_pending(&key.dial_tag(), -1);
        }
    }

    fn connection_opened(&self, key: &ConnectionKey, _attrs: &Attrs) {
        self.metrics.incr_opened(&key.tag());
        self.metrics.incr_pending(&key.dial_tag(), -1);
    }

    fn connection_active(&self, key: &ConnectionKey, _attrs: &Attrs, was_idle: bool) {
        let tag = key.tag();
        self.metrics.set_active(&tag, 1);
        if was_idle {
            self.metrics.set_idle(&tag, 0);
        }
    }

    fn connection_idle(&self, key: &ConnectionKey, _attrs: &Attrs) {
        let tag = key.tag();
        self.metrics.set_active(&tag, 0);
        self.metrics.set_idle(&tag, 1);
    }

    fn connection_closed(&self, key: &ConnectionKey, _attrs: &Attrs, _was_idle: bool) {
        self.metrics.incr_closed(&key.tag());
        if key.local.is_some() {
            self.metrics.clear(&key.tag());
        }
    }
}

/// A listener that fans events out to every member of a `Vec`, used to
/// combine metrics recording with, e.g., a `tracing`-backed listener.
pub struct BroadcastListener {
    listeners: Vec<std::sync::Arc<dyn ConnectionPoolListener>>,
}

impl BroadcastListener {
    pub fn new(listeners: Vec<std::sync::Arc<dyn ConnectionPoolListener>>) -> Self {
        Self { listeners }
    }
}

impl ConnectionPoolListener for BroadcastListener {
    fn connection_pending(&self, key: &ConnectionKey, attrs: &Attrs) {
        for l in &self.listeners {
            l.connection_pending(key, attrs);
        }
    }

    fn connection_failed(&self, key: &ConnectionKey, attrs: &Attrs, cause: &BoxError, was_pending: bool) {
        for l in &self.listeners {
            l.connection_failed(key, attrs, cause, was_pending);
        }
    }

    fn connection_opened(&self, key: &ConnectionKey, attrs: &Attrs) {
        for l in &self.listeners {
            l.connection_opened(key, attrs);
        }
    }

    fn connection_active(&self, key: &ConnectionKey, attrs: &Attrs, was_idle: bool) {
        for l in &self.listeners {
            l.connection_active(key, attrs, was_idle);
        }
    }

    fn connection_idle(&self, key: &ConnectionKey, attrs: &Attrs) {
        for l in &self.listeners {
            l.connection_idle(key, attrs);
        }
    }

    fn connection_closed(&self, key: &ConnectionKey, attrs: &Attrs, was_idle: bool) {
        for l in &self.listeners {
            l.connection_closed(key, attrs, was_idle);
        }
    }
}

/// A `tracing`-backed listener, emitting `tracing::debug!` for
/// connection-level lifecycle events.
#[derive(Debug, Default)]
pub struct TracingListener;

impl ConnectionPoolListener for TracingListener {
    fn connection_pending(&self, key: &ConnectionKey, _attrs: &Attrs) {
        tracing::trace!(%key, "connection pending");
    }

    fn connection_failed(&self, key: &ConnectionKey, _attrs: &Attrs, cause: &BoxError, was_pending: bool) {
        tracing::debug!(%key, %cause, was_pending, "connection failed");
    }

    fn connection_opened(&self, key: &ConnectionKey, _attrs: &Attrs) {
        tracing::debug!(%key, "connection opened");
    }

    fn connection_active(&self, key: &ConnectionKey, _attrs: &Attrs, was_idle: bool) {
        tracing::trace!(%key, was_idle, "connection active");
    }

    fn connection_idle(&self, key: &ConnectionKey, _attrs: &Attrs) {
        tracing::trace!(%key, "connection idle");
    }

    fn connection_closed(&self, key: &ConnectionKey, _attrs: &Attrs, was_idle: bool) {
        tracing::debug!(%key, was_idle, "connection closed");
    }
}
