//! Endpoint groups: static lists and dynamically updated sets.

use super::Endpoint;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A change pushed into a [`DynamicEndpointGroup`], shaped like
/// `tower::discover::Change<K, V>`.
#[derive(Debug, Clone)]
pub enum Change {
    Insert(Endpoint),
    Remove(Endpoint),
}

/// Notified whenever a group's snapshot changes by more than a permutation.
pub trait GroupListener: Send + Sync {
    fn on_change(&self, endpoints: &[Endpoint]);
}

/// Common behavior of endpoint groups: a readable snapshot plus a
/// ready-signal resolved on first non-empty snapshot.
pub trait EndpointGroup: Send + Sync {
    fn endpoints(&self) -> Arc<Vec<Endpoint>>;

    /// Resolves once the group has produced a non-empty snapshot at least
    /// once. Already-ready groups resolve immediately.
    fn when_ready(&self) -> WhenReady;
}

/// A future-like handle that resolves once a group becomes ready.
pub struct WhenReady {
    ready_now: bool,
    notify: Option<Arc<Notify>>,
    ready_flag: Option<Arc<AtomicBool>>,
}

impl WhenReady {
    fn immediate() -> Self {
        Self {
            ready_now: true,
            notify: None,
            ready_flag: None,
        }
    }

    fn pending(notify: Arc<Notify>, ready_flag: Arc<AtomicBool>) -> Self {
        Self {
            ready_now: false,
            notify: Some(notify),
            ready_flag: Some(ready_flag),
        }
    }

    pub async fn wait(self) {
        if self.ready_now {
            return;
        }
        let notify = self.notify.expect("pending WhenReady must carry a notify handle");
        let ready_flag = self.ready_flag.expect("pending WhenReady must carry a ready flag");
        loop {
            if ready_flag.load(Ordering::Acquire) {
                return;
            }
            notify.notified().await;
            if ready_flag.load(Ordering::Acquire) {
                return;
            }
        }
    }
}

/// An endpoint group that never changes after construction.
#[derive(Debug, Clone)]
pub struct StaticEndpointGroup {
    endpoints: Arc<Vec<Endpoint>>,
}

impl StaticEndpointGroup {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints: Arc::new(endpoints),
        }
    }

    pub fn of(endpoint: Endpoint) -> Self {
        Self::new(vec![endpoint])
    }
}

impl EndpointGroup for StaticEndpointGroup {
    fn endpoints(&self) -> Arc<Vec<Endpoint>> {
        self.endpoints.clone()
    }

    fn when_ready(&self) -> WhenReady {
        WhenReady::immediate()
    }
}

/// A mutable endpoint group that applies [`Change`]s and notifies listeners.
///
/// `allow_empty` gates whether the group may transiently contain zero
/// endpoints; when `false`, a change that would empty the group is
/// applied to the listener-visible snapshot but `when_ready()` will not have
/// resolved yet if the group started empty, and a subsequent non-empty
/// snapshot is required before it does.
pub struct DynamicEndpointGroup {
    snapshot: ArcSwap<Vec<Endpoint>>,
    allow_empty: bool,
    listeners: Mutex<Vec<Arc<dyn GroupListener>>>,
    ready_flag: Arc<AtomicBool>,
    ready_notify: Arc<Notify>,
    closed: AtomicBool,
}

impl DynamicEndpointGroup {
    pub fn new(allow_empty: bool) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Vec::new()),
            allow_empty,
            listeners: Mutex::new(Vec::new()),
            ready_flag: Arc::new(AtomicBool::new(false)),
            ready_notify: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn GroupListener>) {
        self.listeners.lock().push(listener);
    }

    /// Applies a single change. Returns an error if closed.
    pub fn apply(&self, change: Change) -> crate::error::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(crate::error::Error::invalid_config(
                "endpoint group is closed",
            ));
        }
        let current = self.snapshot.load();
        let mut next = (**current).clone();
        let mutated = match change {
            Change::Insert(ep) => {
                if next.contains(&ep) {
                    false
                } else {
                    next.push(ep);
                    true
                }
            }
            Change::Remove(ep) => {
                let before = next.len();
                next.retain(|e| e != &ep);
                before != next.len()
            }
        };

        if !self.allow_empty && next.is_empty() && !current.is_empty() {
            return Err(crate::error::Error::invalid_config(
                "endpoint group does not allow becoming empty",
            ));
        }

        if mutated {
            self.publish(next);
        }
        Ok(())
    }

    fn publish(&self, next: Vec<Endpoint>) {
        let became_non_empty = !next.is_empty();
        self.snapshot.store(Arc::new(next.clone()));
        for listener in self.listeners.lock().iter() {
            listener.on_change(&next);
        }
        if became_non_empty && !self.ready_flag.swap(true, Ordering::AcqRel) {
            self.ready_notify.notify_waiters();
        }
    }

    /// Releases DNS/health-check subscriptions by marking the group closed;
    /// further `apply` calls fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl EndpointGroup for DynamicEndpointGroup {
    fn endpoints(&self) -> Arc<Vec<Endpoint>> {
        self.snapshot.load_full()
    }

    fn when_ready(&self) -> WhenReady {
        if self.ready_flag.load(Ordering::Acquire) {
            WhenReady::immediate()
        } else {
            WhenReady::pending(self.ready_notify.clone(), self.ready_flag.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingListener(Arc<AtomicUsize>);
    impl GroupListener for CountingListener {
        fn on_change(&self, _endpoints: &[Endpoint]) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn static_group_is_ready_immediately() {
        let group = StaticEndpointGroup::of(Endpoint::new("a", 1).unwrap());
        assert_eq!(group.endpoints().len(), 1);
    }

    #[tokio::test]
    async fn dynamic_group_resolves_when_ready_on_first_insert() {
        let group = DynamicEndpointGroup::new(true);
        assert!(group.endpoints().is_empty());

        let group = Arc::new(group);
        let g2 = group.clone();
        let task = tokio::spawn(async move {
            g2.when_ready().wait().await;
        });

        group
            .apply(Change::Insert(Endpoint::new("a", 1).unwrap()))
            .unwrap();
        task.await.unwrap();
    }

    #[test]
    fn disallowing_empty_rejects_final_removal() {
        let group = DynamicEndpointGroup::new(false);
        let ep = Endpoint::new("a", 1).unwrap();
        group.apply(Change::Insert(ep.clone())).unwrap();
        assert!(group.apply(Change::Remove(ep)).is_err());
    }

    #[test]
    fn listener_fires_on_non_permutation_change_only() {
        let count = Arc::new(AtomicUsize::new(0));
        let group = DynamicEndpointGroup::new(true);
        group.add_listener(Arc::new(CountingListener(count.clone())));

        let a = Endpoint::new("a", 1).unwrap();
        group.apply(Change::Insert(a.clone())).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Re-inserting the same endpoint is a no-op, not a change.
        group.apply(Change::Insert(a)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_group_rejects_further_changes() {
        let group = DynamicEndpointGroup::new(true);
        group.close();
        assert!(group
            .apply(Change::Insert(Endpoint::new("a", 1).unwrap()))
            .is_err());
    }
}
