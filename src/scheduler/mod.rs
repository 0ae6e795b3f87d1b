//! Per-origin event-loop assignment.
//!
//! An "event loop" here is a logical handle into the shared Tokio runtime
//! rather than a dedicated single-threaded reactor; what matters is that
//! acquisition is deterministic and that releases are thread-safe, which
//! holds regardless of which worker thread ultimately drives the I/O.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Opaque handle to one event loop slot. Cheap to clone; `release()` is
/// thread-safe and may be called from any thread.
#[derive(Clone)]
pub struct EventLoopLease {
    id: usize,
    entries: Arc<Mutex<HashMap<String, Vec<Entry>>>>,
    origin: String,
}

impl EventLoopLease {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn release(&self) {
        let mut guard = self.entries.lock();
        if let Some(entries) = guard.get_mut(&self.origin) {
            if let Some(entry) = entries.iter_mut().find(|e| e.id == self.id) {
                entry.active = entry.active.saturating_sub(1);
            }
        }
    }
}

impl std::fmt::Debug for EventLoopLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoopLease").field("id", &self.id).finish()
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: usize,
    active: u64,
}

/// Fixed-size pool of event-loop entries, one acquisition tracker per origin.
pub struct EventLoopScheduler {
    group_size: usize,
    entries: Arc<Mutex<HashMap<String, Vec<Entry>>>>,
    start_index: AtomicUsize,
}

/// A synthetic origin shared by endpoint-less lookups.
const GROUPLESS_ORIGIN: &str = "\0groupless";

impl EventLoopScheduler {
    pub fn new(group_size: usize) -> Self {
        assert!(group_size > 0, "event-loop group size must be positive");
        Self {
            group_size,
            entries: Arc::new(Mutex::new(HashMap::new())),
            start_index: AtomicUsize::new(rand::rng().random_range(0..group_size)),
        }
    }

    fn origin_key(protocol: &str, endpoint: Option<&str>) -> String {
        match endpoint {
            Some(ep) => format!("{protocol}|{ep}"),
            None => GROUPLESS_ORIGIN.to_string(),
        }
    }

    /// Acquire the least-loaded event loop for `(protocol, endpoint)`,
    /// breaking ties by lowest id.
    pub fn acquire(&self, protocol: &str, endpoint: Option<&str>) -> EventLoopLease {
        let origin = Self::origin_key(protocol, endpoint);
        let mut guard = self.entries.lock();
        let entries = guard.entry(origin.clone()).or_insert_with(|| {
            let start = self.start_index.fetch_add(1, Ordering::Relaxed) % self.group_size;
            (0..self.group_size)
                .map(|offset| Entry {
                    id: (start + offset) % self.group_size,
                    active: 0,
                })
                .collect()
        });

        let chosen = entries
            .iter_mut()
            .min_by(|a, b| a.active.cmp(&b.active).then(a.id.cmp(&b.id)))
            .expect("entries is non-empty by construction");
        chosen.active += 1;
        let id = chosen.id;

        EventLoopLease {
            id,
            entries: self.entries.clone(),
            origin,
        }
    }

    /// Current active-request count for a given event loop id within an
    /// origin; exposed for tests asserting the scheduler invariant.
    #[cfg(test)]
    fn active_of(&self, protocol: &str, endpoint: Option<&str>, id: usize) -> Option<u64> {
        let origin = Self::origin_key(protocol, endpoint);
        self.entries
            .lock()
            .get(&origin)
            .and_then(|entries| entries.iter().find(|e| e.id == id))
            .map(|e| e.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_acquires_spread_across_three_entries() {
        let scheduler = EventLoopScheduler::new(3);
        let mut ids = Vec::new();
        let mut leases = Vec::new();
        for _ in 0..3 {
            let lease = scheduler.acquire("h2", Some("example.com"));
            ids.push(lease.id());
            leases.push(lease);
        }
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);
        for id in 0..3 {
            assert_eq!(
                scheduler.active_of("h2", Some("example.com"), id),
                Some(1)
            );
        }
    }

    #[test]
    fn releasing_then_acquiring_returns_the_same_tied_lowest_id() {
        let scheduler = EventLoopScheduler::new(3);
        let leases: Vec<_> = (0..3)
            .map(|_| scheduler.acquire("h2", Some("example.com")))
            .collect();

        // Release the entry with id 1 specifically.
        let entry_one = leases.iter().find(|l| l.id() == 1).unwrap();
        entry_one.release();

        let reacquired = scheduler.acquire("h2", Some("example.com"));
        assert_eq!(reacquired.id(), 1);
    }

    #[test]
    fn groupless_lookups_share_a_synthetic_origin() {
        let scheduler = EventLoopScheduler::new(2);
        let a = scheduler.acquire("h2", None);
        let b = scheduler.acquire("h1c", None);
        // Both land in the same origin bucket, so loads accumulate together.
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn invariant_least_active_or_lowest_id_tiebreak_holds_after_many_acquires() {
        let scheduler = EventLoopScheduler::new(4);
        let mut leases = Vec::new();
        for _ in 0..10 {
            leases.push(scheduler.acquire("h2", Some("svc")));
        }
        for id in 0..4u64 as usize {
            let active = scheduler.active_of("h2", Some("svc"), id).unwrap();
            let min_active = (0..4)
                .filter_map(|other| scheduler.active_of("h2", Some("svc"), other))
                .min()
                .unwrap();
            assert!(active == min_active || active == min_active + 1);
        }
    }
}
