//! A single cached DNS answer.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// One cached answer for a name. `records` is empty for a negative answer,
/// in which case `ttl` holds the configured negative TTL.
#[derive(Debug)]
pub struct DnsCacheEntry {
    pub name: String,
    pub records: Vec<IpAddr>,
    pub ttl: Duration,
    created_at: Instant,
    hot: AtomicBool,
    refresh_attempts: AtomicU32,
}

impl DnsCacheEntry {
    pub fn new(name: impl Into<String>, records: Vec<IpAddr>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            records,
            ttl,
            created_at: Instant::now(),
            // Starts cold: the refresh loop only resurrects an entry that's
            // been consulted again since installation, not merely the one
            // lookup that installed it.
            hot: AtomicBool::new(false),
            refresh_attempts: AtomicU32::new(0),
        }
    }

    pub fn negative(name: impl Into<String>, ttl: Duration) -> Self {
        Self::new(name, Vec::new(), ttl)
    }

    pub fn is_negative(&self) -> bool {
        self.records.is_empty()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.age() >= self.ttl
    }

    /// `true` once `refresh_ratio` of the TTL has elapsed.
    pub fn due_for_refresh(&self, refresh_ratio: f64) -> bool {
        let threshold = self.ttl.mul_f64(refresh_ratio.clamp(0.0, 1.0));
        self.age() >= threshold
    }

    /// Marks the entry as consulted since the last refresh decision, lifted
    /// on every cache read.
    pub fn mark_hot(&self) {
        self.hot.store(true, Ordering::Release);
    }

    /// Reads and clears the hot indicator; `true` means a refresh may
    /// proceed, `false` means the entry should be left to expire untouched.
    pub fn take_hot(&self) -> bool {
        self.hot.swap(false, Ordering::AcqRel)
    }

    pub fn refresh_attempts(&self) -> u32 {
        self.refresh_attempts.load(Ordering::Acquire)
    }

    /// Returns the attempt count after incrementing.
    pub fn record_refresh_failure(&self) -> u32 {
        self.refresh_attempts.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_not_due_for_refresh() {
        let entry = DnsCacheEntry::new("example.com", vec!["1.1.1.1".parse().unwrap()], Duration::from_secs(60));
        assert!(!entry.due_for_refresh(0.9));
    }

    #[test]
    fn negative_entry_has_no_records() {
        let entry = DnsCacheEntry::negative("missing.example", Duration::from_secs(5));
        assert!(entry.is_negative());
    }

    #[test]
    fn fresh_entry_starts_cold() {
        let entry = DnsCacheEntry::new("example.com", vec!["1.1.1.1".parse().unwrap()], Duration::from_secs(60));
        assert!(!entry.take_hot());
    }

    #[test]
    fn hot_indicator_clears_on_take() {
        let entry = DnsCacheEntry::new("example.com", vec!["1.1.1.1".parse().unwrap()], Duration::from_secs(60));
        entry.mark_hot();
        assert!(entry.take_hot());
        assert!(!entry.take_hot());
        entry.mark_hot();
        assert!(entry.take_hot());
    }
}
