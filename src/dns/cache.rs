//! Refreshing DNS cache: TTL-aware, hot-indicator gated refresh, negative
//! caching, and backoff-with-eviction on refresh failure.
//!
//! Wraps the wire resolver with TTL and expiry bookkeeping so repeated
//! lookups for the same name don't hit the network on every request.

use super::config::ResolverConfig;
use super::entry::DnsCacheEntry;
use super::resolver::WireResolver;
use crate::backoff::Backoff;
use crate::error::{Error, UnknownHostError};
use crate::metrics::DnsMetrics;
use hickory_resolver::ResolveErrorKind;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Slot {
    entry: arc_swap::ArcSwap<DnsCacheEntry>,
    refresh_task: Option<JoinHandle<()>>,
    first_seen: std::time::Instant,
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }
}

/// The refreshing cache, holding one [`Slot`] per queried name.
pub struct DnsCache {
    config: ResolverConfig,
    resolver: Arc<WireResolver>,
    metrics: Arc<dyn DnsMetrics>,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl DnsCache {
    pub fn new(config: ResolverConfig, metrics: Arc<dyn DnsMetrics>) -> crate::error::Result<Arc<Self>> {
        let resolver = Arc::new(WireResolver::new(&config)?);
        Ok(Arc::new(Self {
            config,
            resolver,
            metrics,
            slots: Mutex::new(HashMap::new()),
        }))
    }

    /// Invalidates every cached entry and aborts its refresh task. Subsequent
    /// lookups re-query from scratch.
    pub fn close(&self) {
        self.slots.lock().clear();
    }

    /// Resolve `name`, consulting the cache first and lifting its
    /// hot-indicator on every hit.
    pub async fn resolve(self: &Arc<Self>, name: &str) -> Result<Vec<IpAddr>, Error> {
        if let Ok(ip) = name.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        if let Some(slot) = self.slots.lock().get(name).cloned() {
            let entry = slot.entry.load();
            if !entry.is_expired() {
                entry.mark_hot();
                return self.answer(&entry, name);
            }
        }

        self.query_and_install(name).await
    }

    fn answer(&self, entry: &DnsCacheEntry, name: &str) -> Result<Vec<IpAddr>, Error> {
        if entry.is_negative() {
            self.metrics.query_result("cache", name, "negative");
            Err(Error::unprocessed(crate::error::UnprocessedCause::DnsResolutionFailed)
                .with_source(UnknownHostError::NotFound(name.to_string())))
        } else {
            self.metrics.query_result("cache", name, "success");
            Ok(entry.records.clone())
        }
    }

    async fn query_and_install(self: &Arc<Self>, name: &str) -> Result<Vec<IpAddr>, Error> {
        let qualified = self.resolve_with_search_domains(name).await;

        let entry = match qualified {
            Ok((resolved_name, records, ttl)) => {
                let _ = resolved_name;
                Arc::new(DnsCacheEntry::new(name, records, ttl.max(self.config.min_ttl)))
            }
            Err(NameResolution::Negative) => {
                if self.config.negative_ttl.is_zero() {
                    return Err(Error::unprocessed(crate::error::UnprocessedCause::DnsResolutionFailed)
                        .with_source(UnknownHostError::SearchDomainsExhausted(name.to_string())));
                }
                Arc::new(DnsCacheEntry::negative(name, self.config.negative_ttl))
            }
            Err(NameResolution::Timeout) => {
                return Err(Error::unprocessed(crate::error::UnprocessedCause::DnsTimeout)
                    .with_source(crate::error::DnsTimeoutError {
                        name: name.to_string(),
                        elapsed: self.config.query_timeout,
                    }));
            }
            Err(NameResolution::Other(cause)) => {
                return Err(Error::unprocessed(crate::error::UnprocessedCause::DnsResolutionFailed).with_source(cause));
            }
        };

        let result = self.answer(&entry, name);
        self.install(name, entry);
        result
    }

    fn install(self: &Arc<Self>, name: &str, entry: Arc<DnsCacheEntry>) {
        let refresh_task = self.spawn_refresh_task(name.to_string());
        let slot = Arc::new(Slot {
            entry: arc_swap::ArcSwap::from(entry),
            refresh_task: Some(refresh_task),
            first_seen: std::time::Instant::now(),
        });
        self.slots.lock().insert(name.to_string(), slot);
    }

    fn spawn_refresh_task(self: &Arc<Self>, name: String) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            cache.refresh_loop(name).await;
        })
    }

    async fn refresh_loop(self: Arc<Self>, name: String) {
        let mut backoff = Backoff::new(self.config.refresh_backoff.clone());
        loop {
            let Some(slot) = self.slots.lock().get(&name).cloned() else {
                return;
            };
            let entry = slot.entry.load();

            if let Some(budget) = self.config.auto_refresh_timeout {
                if slot.first_seen.elapsed() >= budget {
                    self.slots.lock().remove(&name);
                    return;
                }
            }

            let wait = entry.ttl.mul_f64(self.config.refresh_ratio.clamp(0.0, 1.0));
            tokio::time::sleep(wait.saturating_sub(entry.age())).await;

            let Some(slot) = self.slots.lock().get(&name).cloned() else {
                return;
            };
            let entry = slot.entry.load();
            if entry.is_expired() {
                self.slots.lock().remove(&name);
                return;
            }
            if !entry.take_hot() {
                // Not consulted since last decision point: let it expire
                // rather than refresh.
                tokio::time::sleep(entry.ttl.saturating_sub(entry.age())).await;
                self.slots.lock().remove(&name);
                return;
            }

            match self.resolve_with_search_domains(&name).await {
                Ok((_, records, ttl)) => {
                    backoff.reset();
                    slot.entry
                        .store(Arc::new(DnsCacheEntry::new(name.clone(), records, ttl.max(self.config.min_ttl))));
                }
                Err(_) => {
                    let attempts = entry.record_refresh_failure();
                    if attempts > self.config.max_refresh_attempts {
                        self.slots.lock().remove(&name);
                        return;
                    }
                    if let Some(delay) = backoff.next_backoff() {
                        tokio::time::sleep(delay).await;
                    } else {
                        self.slots.lock().remove(&name);
                        return;
                    }
                }
            }
        }
    }

    /// Resolves `name` following the search-domain/ndots rule: names with
    /// fewer than `ndots` dots are tried against each search domain in turn
    /// before the bare name, trailing-dot names are taken as fully qualified.
    async fn resolve_with_search_domains(&self, name: &str) -> Result<(String, Vec<IpAddr>, Duration), NameResolution> {
        if name.ends_with('.') || self.config.search_domains.is_empty() {
            return self.query_one(name).await.map(|(records, ttl)| (name.to_string(), records, ttl));
        }

        let dots = name.matches('.').count() as u32;
        if dots >= self.config.ndots {
            if let Ok((records, ttl)) = self.query_one(name).await {
                return Ok((name.to_string(), records, ttl));
            }
        }

        for domain in &self.config.search_domains {
            let candidate = format!("{name}.{domain}");
            if let Ok((records, ttl)) = self.query_one(&candidate).await {
                return Ok((candidate, records, ttl));
            }
        }

        if dots < self.config.ndots {
            return self.query_one(name).await.map(|(records, ttl)| (name.to_string(), records, ttl));
        }

        Err(NameResolution::Negative)
    }

    async fn query_one(&self, name: &str) -> Result<(Vec<IpAddr>, Duration), NameResolution> {
        self.metrics.query_written(name, "system");
        match tokio::time::timeout(self.config.query_timeout, self.resolver.lookup(name)).await {
            Ok(Ok((records, ttl))) if !records.is_empty() => Ok((records, ttl)),
            Ok(Ok(_)) => {
                self.metrics.query_noanswer("NOANSWER", name);
                Err(NameResolution::Negative)
            }
            Ok(Err(e)) => match e.kind() {
                ResolveErrorKind::Timeout => Err(NameResolution::Timeout),
                ResolveErrorKind::NoRecordsFound { .. } => {
                    self.metrics.query_noanswer("NXDOMAIN", name);
                    Err(NameResolution::Negative)
                }
                _ => Err(NameResolution::Other(Box::new(e))),
            },
            Err(_elapsed) => Err(NameResolution::Timeout),
        }
    }
}

enum NameResolution {
    Negative,
    Timeout,
    Other(crate::error::BoxError),
}
