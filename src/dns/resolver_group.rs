//! Pluggable name resolution: lets a client factory swap the refreshing
//! cache for a custom resolution strategy (a fixed-host map in tests, a
//! service-discovery client in production) without touching the pool or
//! pipeline code that consumes it.

use super::DnsCache;
use crate::util::BoxFuture;
use std::net::IpAddr;
use std::sync::Arc;

/// Resolves a hostname to one or more addresses. [`DnsCache`] is the
/// built-in implementation; a [`crate::client::ClientFactoryOptions`] may
/// substitute another one entirely via `address_resolver`.
pub trait NameResolver: Send + Sync {
    fn resolve(&self, host: &str) -> BoxFuture<'static, crate::error::Result<Vec<IpAddr>>>;
}

impl NameResolver for Arc<DnsCache> {
    fn resolve(&self, host: &str) -> BoxFuture<'static, crate::error::Result<Vec<IpAddr>>> {
        let this = self.clone();
        let host = host.to_string();
        Box::pin(async move { this.resolve(&host).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHosts(std::collections::HashMap<String, Vec<IpAddr>>);

    impl NameResolver for FixedHosts {
        fn resolve(&self, host: &str) -> BoxFuture<'static, crate::error::Result<Vec<IpAddr>>> {
            let result = self
                .0
                .get(host)
                .cloned()
                .ok_or_else(|| crate::error::Error::unprocessed(crate::error::UnprocessedCause::DnsResolutionFailed));
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn a_custom_resolver_can_stand_in_for_the_cache() {
        let mut hosts = std::collections::HashMap::new();
        hosts.insert("svc.internal".to_string(), vec!["10.0.0.5".parse().unwrap()]);
        let resolver: Arc<dyn NameResolver> = Arc::new(FixedHosts(hosts));

        let ips = resolver.resolve("svc.internal").await.unwrap();
        assert_eq!(ips, vec!["10.0.0.5".parse::<IpAddr>().unwrap()]);
        assert!(resolver.resolve("unknown.internal").await.is_err());
    }
}
