//! Endpoint selection strategies: round-robin, weighted, sticky, healthy-subset.

use super::Endpoint;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A selection strategy picks one endpoint out of a non-empty snapshot.
///
/// Each call advances any strategy-local state (e.g. the round-robin
/// cursor); the retry engine relies on this to yield the *next*
/// endpoint on successive attempts.
pub enum SelectionStrategy {
    RoundRobin(AtomicUsize),
    Weighted(AtomicUsize),
    Sticky(fn(&[u8]) -> u64),
    HealthySubset { wrapped: Box<SelectionStrategy> },
}

impl SelectionStrategy {
    pub fn round_robin() -> Self {
        Self::RoundRobin(AtomicUsize::new(0))
    }

    pub fn weighted() -> Self {
        Self::Weighted(AtomicUsize::new(0))
    }

    /// Sticky selection keyed by a caller-chosen byte slice (e.g. a session
    /// id); the same key always maps to the same endpoint for an unchanged
    /// snapshot.
    pub fn sticky() -> Self {
        fn default_hash(key: &[u8]) -> u64 {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            hasher.finish()
        }
        Self::Sticky(default_hash)
    }

    pub fn healthy_subset(wrapped: SelectionStrategy) -> Self {
        Self::HealthySubset {
            wrapped: Box::new(wrapped),
        }
    }

    /// Select the next endpoint from `candidates`, which must be non-empty.
    pub fn select<'a>(&self, candidates: &'a [Endpoint], sticky_key: Option<&[u8]>) -> &'a Endpoint {
        assert!(!candidates.is_empty(), "select called on an empty candidate set");
        match self {
            Self::RoundRobin(cursor) => {
                let idx = cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
                &candidates[idx]
            }
            Self::Weighted(cursor) => weighted_select(candidates, cursor),
            Self::Sticky(hash_fn) => {
                let key = sticky_key.unwrap_or(&[]);
                let idx = (hash_fn(key) as usize) % candidates.len();
                &candidates[idx]
            }
            Self::HealthySubset { wrapped } => {
                // Healthiness itself is tracked by a circuit breaker / health
                // checker upstream (out of scope here); this strategy simply
                // delegates selection to the wrapped strategy over whatever
                // subset the caller has already filtered to `candidates`.
                wrapped.select(candidates, sticky_key)
            }
        }
    }
}

fn weighted_select<'a>(candidates: &'a [Endpoint], cursor: &AtomicUsize) -> &'a Endpoint {
    let total_weight: u64 = candidates.iter().map(|e| e.weight() as u64).sum();
    if total_weight == 0 {
        let idx = cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        return &candidates[idx];
    }
    let ticket = (cursor.fetch_add(1, Ordering::Relaxed) as u64) % total_weight;
    let mut acc = 0u64;
    for ep in candidates {
        acc += ep.weight() as u64;
        if ticket < acc {
            return ep;
        }
    }
    candidates.last().expect("candidates checked non-empty above")
}

impl std::fmt::Debug for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RoundRobin(_) => "RoundRobin",
            Self::Weighted(_) => "Weighted",
            Self::Sticky(_) => "Sticky",
            Self::HealthySubset { .. } => "HealthySubset",
        };
        f.debug_struct(name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(n: usize) -> Vec<Endpoint> {
        (0..n)
            .map(|i| Endpoint::new(format!("host{i}"), 80).unwrap())
            .collect()
    }

    #[test]
    fn round_robin_cycles_in_order() {
        let eps = endpoints(3);
        let strategy = SelectionStrategy::round_robin();
        let picked: Vec<_> = (0..6)
            .map(|_| strategy.select(&eps, None).host().to_string())
            .collect();
        assert_eq!(
            picked,
            vec!["host0", "host1", "host2", "host0", "host1", "host2"]
        );
    }

    #[test]
    fn sticky_is_stable_for_same_key() {
        let eps = endpoints(5);
        let strategy = SelectionStrategy::sticky();
        let a = strategy.select(&eps, Some(b"session-1")).clone();
        let b = strategy.select(&eps, Some(b"session-1")).clone();
        assert_eq!(a, b);
    }

    #[test]
    fn weighted_favors_heavier_endpoint() {
        let eps = vec![
            Endpoint::new("light", 80).unwrap().with_weight(1),
            Endpoint::new("heavy", 80).unwrap().with_weight(99),
        ];
        let strategy = SelectionStrategy::weighted();
        let mut heavy_count = 0;
        for _ in 0..100 {
            if strategy.select(&eps, None).host() == "heavy" {
                heavy_count += 1;
            }
        }
        assert!(heavy_count > 80, "expected heavy endpoint to dominate, got {heavy_count}/100");
    }
}
