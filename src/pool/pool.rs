//! The connection pool.

use super::key::ConnectionKey;
use super::listener::{Attrs, ConnectionPoolListener};
use super::state::ConnectionLifecycle;
use crate::error::{Error, UnprocessedCause};
use crate::protocol::session::SessionProtocol;
use crate::util::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Outcome of a successful dial: the physical handle plus what was actually
/// negotiated, since `desired` may differ from `actual`.
pub struct DialOutcome<C> {
    pub local: SocketAddr,
    pub actual: SessionProtocol,
    pub conn: C,
}

/// Performs the TCP/TLS dial + handshake for one key. The pool owns
/// *state*; dialing itself is delegated here, separating the stateful
/// connection wrapper from the raw dial + handshake.
pub trait Dialer: Send + Sync + 'static {
    type Conn: Send + Sync + 'static;

    /// `host` is the endpoint's original hostname (for TLS SNI and `Host`
    /// generation); `remote` is the resolved address the pool keys on, so
    /// two hostnames resolving to the same address still share one slot.
    fn dial(&self, desired: SessionProtocol, remote: SocketAddr, host: &str) -> BoxFuture<'static, Result<DialOutcome<Self::Conn>, crate::error::BoxError>>;
}

/// Pool configuration.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Per-`(proto, remote)` cap on simultaneous live connections. For
    /// multiplexed protocols this is rarely exceeded because a single live
    /// connection services all concurrent requests.
    pub max_connections_per_key: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections_per_key: 8,
        }
    }
}

#[derive(Clone)]
enum DialSignal {
    Succeeded,
    Failed(Arc<Error>),
}

/// One outstanding dial for a `(proto, remote)` pair. This pool never
/// starts a second concurrent dial for a key already pending (at most one
/// in-flight dial per key); additional callers
/// queue on `sender` instead.
struct PendingEntry {
    sender: broadcast::Sender<DialSignal>,
}

struct Slot<C> {
    key: ConnectionKey,
    conn: Arc<C>,
    lifecycle: ConnectionLifecycle,
    in_flight: Arc<AtomicU64>,
}

/// A checked-out connection. Dropping it (without calling
/// [`PooledHandle::release`] or [`PooledHandle::close`] first) returns the
/// connection to IDLE once no other in-flight request holds it, matching
/// H2 multiplexing's "last in-flight request completed" rule.
pub struct PooledHandle<C> {
    conn: Arc<C>,
    key: ConnectionKey,
    in_flight: Arc<AtomicU64>,
    pool: Arc<PoolInner<C>>,
    released: bool,
}

impl<C> std::ops::Deref for PooledHandle<C> {
    type Target = C;
    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C> PooledHandle<C> {
    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Explicitly release this checkout; called automatically on drop.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.pool.mark_idle(&self.key);
        }
    }

    /// Forcibly close the underlying connection (used on cancellation for
    /// non-multiplexed protocols).
    pub fn close(mut self) {
        self.released = true;
        self.pool.close(&self.key);
    }
}

impl<C> Drop for PooledHandle<C> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

struct PoolInner<C> {
    dialer: Box<dyn Dialer<Conn = C>>,
    listener: Arc<dyn ConnectionPoolListener>,
    config: PoolConfig,
    pending: Mutex<HashMap<(SessionProtocol, SocketAddr), PendingEntry>>,
    connections: Mutex<HashMap<(SessionProtocol, SocketAddr), Vec<Slot<C>>>>,
}

impl<C: Send + Sync + 'static> PoolInner<C> {
    fn mark_idle(&self, key: &ConnectionKey) {
        let mut guard = self.connections.lock();
        if let Some(slots) = guard.get_mut(&key.dial_key()) {
            if let Some(slot) = slots.iter_mut().find(|s| &s.key == key) {
                if slot.lifecycle.mark_idle().is_ok() {
                    self.listener.connection_idle(key, &Attrs::new());
                }
            }
        }
    }

    fn close(&self, key: &ConnectionKey) {
        let mut guard = self.connections.lock();
        if let Some(slots) = guard.get_mut(&key.dial_key()) {
            if let Some(pos) = slots.iter().position(|s| &s.key == key) {
                let was_idle = slots[pos].lifecycle.mark_closed();
                slots.remove(pos);
                self.listener.connection_closed(key, &Attrs::new(), was_idle);
            }
        }
    }
}

/// Key/state-machine pool: dials, reuses, and closes connections, emitting
/// the exact event sequence by the rules above.
pub struct ConnectionPool<C> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Send + Sync + 'static> ConnectionPool<C> {
    pub fn new(dialer: impl Dialer<Conn = C>, listener: Arc<dyn ConnectionPoolListener>, config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                dialer: Box::new(dialer),
                listener,
                config,
                pending: Mutex::new(HashMap::new()),
                connections: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Try to check an existing, reusable connection out without dialing.
    /// Multiplexed protocols reuse any Active/Idle connection; others only
    /// reuse an Idle one.
    fn try_checkout(&self, desired: SessionProtocol, remote: SocketAddr) -> Option<PooledHandle<C>> {
        let mut guard = self.inner.connections.lock();
        let slots = guard.get_mut(&(desired, remote))?;
        let multiplexed = desired.is_multiplexed();
        for slot in slots.iter_mut() {
            let reusable = multiplexed || slot.lifecycle.state() == super::state::ConnectionState::Idle;
            if !reusable {
                continue;
            }
            let was_idle = match slot.lifecycle.mark_active() {
                Ok(was_idle) => was_idle,
                Err(_) => continue,
            };
            slot.in_flight.fetch_add(1, Ordering::AcqRel);
            self.inner
                .listener
                .connection_active(&slot.key, &Attrs::new(), was_idle);
            return Some(PooledHandle {
                conn: slot.conn.clone(),
                key: slot.key,
                in_flight: slot.in_flight.clone(),
                pool: self.inner.clone(),
                released: false,
            });
        }
        None
    }

    fn connection_count(&self, desired: SessionProtocol, remote: SocketAddr) -> u32 {
        self.inner
            .connections
            .lock()
            .get(&(desired, remote))
            .map(|v| v.len() as u32)
            .unwrap_or(0)
    }

    /// Acquire a connection for `(desired, remote)`, dialing if necessary,
    /// queueing behind an in-flight dial for the same key, and propagating
    /// dial failure to every request queued on it.
    pub async fn acquire(&self, desired: SessionProtocol, remote: SocketAddr, host: &str) -> Result<PooledHandle<C>, Error> {
        loop {
            if let Some(handle) = self.try_checkout(desired, remote) {
                return Ok(handle);
            }

            let dial_key = (desired, remote);
            let at_capacity = self.connection_count(desired, remote) >= self.inner.config.max_connections_per_key;

            enum Action {
                Dial,
                Wait(broadcast::Receiver<DialSignal>),
            }

            let action = {
                let mut pending = self.inner.pending.lock();
                match pending.get_mut(&dial_key) {
                    Some(entry) => Action::Wait(entry.sender.subscribe()),
                    None if at_capacity => {
                        // No in-flight dial and we're at the per-key cap:
                        // there is nothing to wait on, so surface directly.
                        return Err(Error::unprocessed(UnprocessedCause::ConnectFailed)
                            .with_source("connection pool at per-key capacity"));
                    }
                    None => {
                        let (sender, _rx) = broadcast::channel(16);
                        pending.insert(dial_key, PendingEntry { sender });
                        Action::Dial
                    }
                }
            };

            match action {
                Action::Dial => {
                    self.inner
                        .listener
                        .connection_pending(&ConnectionKey::pending(desired, remote), &Attrs::new());

                    let result = self.inner.dialer.dial(desired, remote, host).await;
                    match result {
                        Ok(outcome) => {
                            self.on_dial_success(desired, remote, outcome);
                        }
                        Err(cause) => {
                            self.on_dial_failed(desired, remote, cause);
                            let err = Error::unprocessed(UnprocessedCause::ConnectFailed);
                            return Err(err);
                        }
                    }
                }
                Action::Wait(mut rx) => match rx.recv().await {
                    Ok(DialSignal::Succeeded) => continue,
                    Ok(DialSignal::Failed(cause)) => {
                        return Err(Error::unprocessed(UnprocessedCause::ConnectFailed).with_source(cause.to_string()));
                    }
                    Err(_) => continue,
                },
            }
        }
    }

    fn on_dial_success(&self, desired: SessionProtocol, remote: SocketAddr, outcome: DialOutcome<C>) {
        let key = ConnectionKey::pending(desired, remote).opened(outcome.local, outcome.actual);

        // The reverse-direction discard rule: if the peer had also dialed
        // us, their pending entry for the reverse key is stale.
        if let Some(reverse_key) = key.reversed_dial_key() {
            let mut pending = self.inner.pending.lock();
            pending.remove(&reverse_key);
        }

        {
            let mut pending = self.inner.pending.lock();
            if let Some(entry) = pending.remove(&(desired, remote)) {
                let _ = entry.sender.send(DialSignal::Succeeded);
            }
        }

        self.inner.listener.connection_opened(&key, &Attrs::new());

        let mut guard = self.inner.connections.lock();
        guard
            .entry((desired, remote))
            .or_default()
            .push(Slot {
                key,
                conn: Arc::new(outcome.conn),
                lifecycle: ConnectionLifecycle::opened(),
                in_flight: Arc::new(AtomicU64::new(0)),
            });
    }

    fn on_dial_failed(&self, desired: SessionProtocol, remote: SocketAddr, cause: crate::error::BoxError) {
        let key = ConnectionKey::pending(desired, remote);
        let shared_cause = Arc::new(Error::unprocessed(UnprocessedCause::ConnectFailed).with_source(cause.to_string()));

        let mut pending = self.inner.pending.lock();
        let was_pending = pending.contains_key(&(desired, remote));
        if let Some(entry) = pending.remove(&(desired, remote)) {
            let _ = entry.sender.send(DialSignal::Failed(shared_cause.clone()));
        }
        drop(pending);

        self.inner
            .listener
            .connection_failed(&key, &Attrs::new(), &(cause), was_pending);
    }

    /// Closes every connection the pool currently holds, emitting
    /// `connection_closed` for each. In-flight requests on those connections will observe
    /// their send fail; the pool does not attempt to drain them first.
    pub fn close_all(&self) {
        let mut guard = self.inner.connections.lock();
        for ((_, _), slots) in guard.drain() {
            for slot in slots {
                let was_idle = slot.lifecycle.state() == super::state::ConnectionState::Idle;
                self.inner.listener.connection_closed(&slot.key, &Attrs::new(), was_idle);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self, desired: SessionProtocol, remote: SocketAddr) -> usize {
        self.inner
            .connections
            .lock()
            .get(&(desired, remote))
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::listener::{CountingListener, ConnectionPoolListener};
    use crate::metrics::RecordingMetrics;
    use std::sync::atomic::AtomicBool;

    struct FlakyDialer {
        fail_next: Arc<AtomicBool>,
    }

    impl Dialer for FlakyDialer {
        type Conn = u32;

        fn dial(&self, desired: SessionProtocol, remote: SocketAddr, _host: &str) -> BoxFuture<'static, Result<DialOutcome<u32>, crate::error::BoxError>> {
            let should_fail = self.fail_next.swap(false, Ordering::SeqCst);
            Box::pin(async move {
                if should_fail {
                    Err("simulated dial failure".into())
                } else {
                    Ok(DialOutcome {
                        local: "10.10.10.10:3333".parse().unwrap(),
                        actual: desired,
                        conn: 42,
                    })
                }
            })
        }
    }

    fn remote() -> SocketAddr {
        "10.10.10.11:3333".parse().unwrap()
    }

    #[tokio::test]
    async fn successful_dial_then_reuse_idle_connection() {
        let metrics = RecordingMetrics::new();
        let listener = Arc::new(CountingListener::new(metrics.clone()));
        let pool = ConnectionPool::new(
            FlakyDialer {
                fail_next: Arc::new(AtomicBool::new(false)),
            },
            listener,
            PoolConfig::default(),
        );

        let handle = pool.acquire(SessionProtocol::H1, remote(), "example.com").await.unwrap();
        let key = *handle.key();
        drop(handle);

        let snapshot = metrics.snapshot(&key.tag());
        assert_eq!(snapshot.opened, 1);
        assert_eq!(snapshot.idle, 1);
        assert_eq!(snapshot.active, 0);

        // Reacquiring should reuse the idle connection, not dial again.
        let handle2 = pool.acquire(SessionProtocol::H1, remote(), "example.com").await.unwrap();
        assert_eq!(pool.slot_count(SessionProtocol::H1, remote()), 1);
        drop(handle2);
    }

    #[tokio::test]
    async fn failed_dial_surfaces_unprocessed_request() {
        let listener = Arc::new(CountingListener::new(RecordingMetrics::new()));
        let pool = ConnectionPool::new(
            FlakyDialer {
                fail_next: Arc::new(AtomicBool::new(true)),
            },
            listener,
            PoolConfig::default(),
        );

        let err = pool.acquire(SessionProtocol::H1, remote(), "example.com").await.unwrap_err();
        assert!(err.is_retry_safe());
    }

    #[tokio::test]
    async fn h2_multiplexes_a_single_connection_across_acquisitions() {
        let listener = Arc::new(CountingListener::new(RecordingMetrics::new()));
        let pool = ConnectionPool::new(
            FlakyDialer {
                fail_next: Arc::new(AtomicBool::new(false)),
            },
            listener,
            PoolConfig::default(),
        );

        let h1 = pool.acquire(SessionProtocol::H2, remote(), "example.com").await.unwrap();
        let h2 = pool.acquire(SessionProtocol::H2, remote(), "example.com").await.unwrap();
        assert_eq!(pool.slot_count(SessionProtocol::H2, remote()), 1);
        drop(h1);
        drop(h2);
    }

    #[tokio::test]
    async fn golden_trace_pending_failed_opened_active_idle_closed() {
        let metrics = RecordingMetrics::new();
        let listener: Arc<dyn ConnectionPoolListener> = Arc::new(CountingListener::new(metrics.clone()));
        let local: SocketAddr = "10.10.10.10:3333".parse().unwrap();
        let remote: SocketAddr = "10.10.10.11:3333".parse().unwrap();
        let pending_key = ConnectionKey::pending(SessionProtocol::H1, remote);
        let tag = pending_key.tag();

        listener.connection_pending(&pending_key, &Attrs::new());
        assert_eq!(metrics.snapshot(&tag).pending, 1);

        listener.connection_failed(&pending_key, &Attrs::new(), &("boom".into()), true);
        assert_eq!(metrics.snapshot(&tag).pending, 0);
        assert_eq!(metrics.snapshot(&tag).failed, 1);

        for _ in 0..3 {
            listener.connection_pending(&pending_key, &Attrs::new());
        }
        assert_eq!(metrics.snapshot(&tag).pending, 3);

        listener.connection_failed(&pending_key, &Attrs::new(), &("boom".into()), true);
        assert_eq!(metrics.snapshot(&tag).pending, 2);

        listener.connection_failed(&pending_key, &Attrs::new(), &("boom".into()), false);
        assert_eq!(metrics.snapshot(&tag).failed, 3);
        assert_eq!(metrics.snapshot(&tag).pending, 2);

        let opened_key = pending_key.opened(local, SessionProtocol::H1);
        let opened_tag = opened_key.tag();
        listener.connection_opened(&opened_key, &Attrs::new());
        assert_eq!(metrics.snapshot(&opened_tag).opened, 1);
        // `connection_opened` decrements the pending gauge under the
        // dial-time tag (no `local`), not the tag of the key it's called
        // with, since the two diverge once `local` is known.
        assert_eq!(metrics.snapshot(&tag).pending, 1);

        listener.connection_active(&opened_key, &Attrs::new(), false);
        assert_eq!(metrics.snapshot(&opened_tag).active, 1);
        assert_eq!(metrics.snapshot(&opened_tag).idle, 0);

        listener.connection_idle(&opened_key, &Attrs::new());
        assert_eq!(metrics.snapshot(&opened_tag).active, 0);
        assert_eq!(metrics.snapshot(&opened_tag).idle, 1);

        listener.connection_closed(&opened_key, &Attrs::new(), true);
        // Closing a key with `local` set removes its gauges entirely.
        let cleared = metrics.snapshot(&opened_tag);
        assert_eq!(cleared, crate::metrics::PoolGauges::default());
    }
}
