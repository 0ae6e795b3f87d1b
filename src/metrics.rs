//! Observability seam.
//!
//! The core defines the interface only; wiring a real exporter is an
//! external collaborator's job. Tests use [`RecordingMetrics`] to assert
//! golden traces.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Connection-pool gauge/counter state, keyed by tag set.
pub trait PoolMetrics: Send + Sync + fmt::Debug {
    fn set_pending(&self, key: &str, value: i64);
    fn incr_pending(&self, key: &str, delta: i64);
    fn set_active(&self, key: &str, value: i64);
    fn set_idle(&self, key: &str, value: i64);
    fn incr_opened(&self, key: &str);
    fn incr_closed(&self, key: &str);
    fn incr_failed(&self, key: &str);
    fn clear(&self, key: &str);
}

use std::fmt;

/// DNS resolver counters, for the `queries.*` family of tags.
pub trait DnsMetrics: Send + Sync + fmt::Debug {
    fn query_written(&self, name: &str, server: &str);
    fn query_result(&self, cause: &str, name: &str, result: &str);
    fn query_noanswer(&self, code: &str, name: &str);
    fn query_cnamed(&self, cname: &str, name: &str);
}

/// A no-op implementation used when metrics emission is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl PoolMetrics for NoopMetrics {
    fn set_pending(&self, _key: &str, _value: i64) {}
    fn incr_pending(&self, _key: &str, _delta: i64) {}
    fn set_active(&self, _key: &str, _value: i64) {}
    fn set_idle(&self, _key: &str, _value: i64) {}
    fn incr_opened(&self, _key: &str) {}
    fn incr_closed(&self, _key: &str) {}
    fn incr_failed(&self, _key: &str) {}
    fn clear(&self, _key: &str) {}
}

/// Lets `Arc<dyn PoolMetrics>` plug into `CountingListener<M: PoolMetrics>`
/// directly, so a `ClientFactory` can hand out one shared trait object
/// without the pool module knowing about `Arc`.
impl PoolMetrics for Arc<dyn PoolMetrics> {
    fn set_pending(&self, key: &str, value: i64) {
        (**self).set_pending(key, value)
    }
    fn incr_pending(&self, key: &str, delta: i64) {
        (**self).incr_pending(key, delta)
    }
    fn set_active(&self, key: &str, value: i64) {
        (**self).set_active(key, value)
    }
    fn set_idle(&self, key: &str, value: i64) {
        (**self).set_idle(key, value)
    }
    fn incr_opened(&self, key: &str) {
        (**self).incr_opened(key)
    }
    fn incr_closed(&self, key: &str) {
        (**self).incr_closed(key)
    }
    fn incr_failed(&self, key: &str) {
        (**self).incr_failed(key)
    }
    fn clear(&self, key: &str) {
        (**self).clear(key)
    }
}

impl DnsMetrics for NoopMetrics {
    fn query_written(&self, _name: &str, _server: &str) {}
    fn query_result(&self, _cause: &str, _name: &str, _result: &str) {}
    fn query_noanswer(&self, _code: &str, _name: &str) {}
    fn query_cnamed(&self, _cname: &str, _name: &str) {}
}

/// A snapshot of one key's pool gauges, used by [`RecordingMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolGauges {
    pub pending: i64,
    pub active: i64,
    pub idle: i64,
    pub opened: i64,
    pub closed: i64,
    pub failed: i64,
}

/// In-memory metrics recorder, for tests and local debugging.
#[derive(Debug, Clone, Default)]
pub struct RecordingMetrics {
    inner: Arc<Mutex<HashMap<String, PoolGauges>>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, key: &str) -> PoolGauges {
        self.inner.lock().get(key).copied().unwrap_or_default()
    }
}

impl PoolMetrics for RecordingMetrics {
    fn set_pending(&self, key: &str, value: i64) {
        self.inner.lock().entry(key.to_string()).or_default().pending = value;
    }

    fn incr_pending(&self, key: &str, delta: i64) {
        let mut guard = self.inner.lock();
        let gauges = guard.entry(key.to_string()).or_default();
        gauges.pending = (gauges.pending + delta).max(0);
    }

    fn set_active(&self, key: &str, value: i64) {
        self.inner.lock().entry(key.to_string()).or_default().active = value;
    }

    fn set_idle(&self, key: &str, value: i64) {
        self.inner.lock().entry(key.to_string()).or_default().idle = value;
    }

    fn incr_opened(&self, key: &str) {
        self.inner.lock().entry(key.to_string()).or_default().opened += 1;
    }

    fn incr_closed(&self, key: &str) {
        self.inner.lock().entry(key.to_string()).or_default().closed += 1;
    }

    fn incr_failed(&self, key: &str) {
        self.inner.lock().entry(key.to_string()).or_default().failed += 1;
    }

    fn clear(&self, key: &str) {
        self.inner.lock().remove(key);
    }
}

impl DnsMetrics for RecordingMetrics {
    fn query_written(&self, name: &str, server: &str) {
        tracing::trace!(name, server, "queries.written");
    }

    fn query_result(&self, cause: &str, name: &str, result: &str) {
        tracing::trace!(cause, name, result, "queries");
    }

    fn query_noanswer(&self, code: &str, name: &str) {
        tracing::trace!(code, name, "queries.noanswer");
    }

    fn query_cnamed(&self, cname: &str, name: &str) {
        tracing::trace!(cname, name, "queries.cnamed");
    }
}
