//! Wire-level A/AAAA resolution, delegated to `hickory-resolver`'s
//! `TokioResolver`.

use super::config::{AddressFamilyPolicy, ResolverConfig};
use hickory_resolver::config::{LookupIpStrategy, NameServerConfigGroup, ResolverConfig as HickoryConfig, ResolverOpts};
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use std::time::Duration;

/// Thin wrapper performing one-shot wire lookups; the refreshing cache,
/// negative TTLs, and search-domain handling all live one layer up in
/// [`super::cache::DnsCache`] / [`super::RefreshingResolver`].
pub struct WireResolver {
    resolver: TokioResolver,
}

impl WireResolver {
    pub fn new(config: &ResolverConfig) -> crate::error::Result<Self> {
        let builder = if let Some(server_addr) = config.server_addr {
            let provider = hickory_resolver::name_server::TokioConnectionProvider::default();
            let name_servers = NameServerConfigGroup::from_ips_clear(&[server_addr.ip()], server_addr.port(), true);
            let hickory_config = HickoryConfig::from_parts(None, vec![], name_servers);
            TokioResolver::builder_with_config(hickory_config, provider)
        } else {
            TokioResolver::builder_tokio()
                .map_err(|e| crate::error::Error::invalid_config(format!("failed to read system resolver config: {e}")))?
        };

        let mut opts = ResolverOpts::default();
        opts.ip_strategy = match config.address_family {
            AddressFamilyPolicy::Ipv4Only => LookupIpStrategy::Ipv4Only,
            AddressFamilyPolicy::Ipv6Only => LookupIpStrategy::Ipv6Only,
            AddressFamilyPolicy::Both => LookupIpStrategy::Ipv4AndIpv6,
            AddressFamilyPolicy::PreferIpv4 => LookupIpStrategy::Ipv4thenIpv6,
            AddressFamilyPolicy::PreferIpv6 => LookupIpStrategy::Ipv6thenIpv4,
        };
        opts.timeout = config.query_timeout;

        Ok(Self {
            resolver: builder.with_options(opts).build(),
        })
    }

    /// Looks up `name`, returning every A/AAAA address hickory followed
    /// (CNAME chains included) plus the answer's remaining TTL (the minimum
    /// TTL across the records that made up the answer, per hickory's own
    /// `valid_until` bookkeeping), or the resolver's own error, left
    /// uninterpreted — the caller (the refreshing cache) classifies
    /// `NXDOMAIN` vs. timeout vs. other failure.
    pub async fn lookup(&self, name: &str) -> Result<(Vec<IpAddr>, Duration), hickory_resolver::ResolveError> {
        let response = self.resolver.lookup_ip(name).await?;
        let ttl = response.valid_until().saturating_duration_since(std::time::Instant::now());
        let records = response.iter().collect();
        Ok((records, ttl))
    }
}
