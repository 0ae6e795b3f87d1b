//! Resolver configuration.

use crate::backoff::BackoffPolicy;
use std::net::SocketAddr;
use std::time::Duration;

/// Which address families a lookup should race or prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamilyPolicy {
    Ipv4Only,
    Ipv6Only,
    Both,
    PreferIpv4,
    PreferIpv6,
}

/// Refreshing-cache configuration layered on top of the wire resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Overrides system nameservers, used in tests with an in-memory server.
    pub server_addr: Option<SocketAddr>,
    pub address_family: AddressFamilyPolicy,
    /// Fraction of TTL elapsed before a refresh is scheduled (~90% typical).
    pub refresh_ratio: f64,
    /// `NXDOMAIN`/`NOTZONE`/no-answer TTL; 0 disables negative caching.
    pub negative_ttl: Duration,
    pub refresh_backoff: BackoffPolicy,
    /// Entry is evicted once its refresh-attempt counter exceeds this.
    pub max_refresh_attempts: u32,
    /// Caps how long an entry may be kept refreshed once hot.
    pub auto_refresh_timeout: Option<Duration>,
    pub search_domains: Vec<String>,
    /// Names with fewer dots than this are resolved via `search_domains` first.
    pub ndots: u32,
    pub query_timeout: Duration,
    /// Floor applied to an answer's wire TTL, so a record served with TTL 0
    /// (or a few seconds) doesn't drive the refresh loop into a tight spin.
    pub min_ttl: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            server_addr: None,
            address_family: AddressFamilyPolicy::Both,
            refresh_ratio: 0.9,
            negative_ttl: Duration::ZERO,
            refresh_backoff: BackoffPolicy::default(),
            max_refresh_attempts: 5,
            auto_refresh_timeout: None,
            search_domains: Vec::new(),
            ndots: 1,
            query_timeout: Duration::from_secs(5),
            min_ttl: Duration::from_secs(1),
        }
    }
}
