//! Endpoint and endpoint group value types.

mod group;
mod selection;

pub use group::{Change, DynamicEndpointGroup, EndpointGroup, GroupListener, StaticEndpointGroup};
pub use selection::SelectionStrategy;

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;

pub(crate) const DEFAULT_WEIGHT: u32 = 1000;

/// An immutable `host[:port]` target, optionally pre-resolved to an IP.
///
/// Equality is host+port+ip only; `weight` and `attrs` are metadata.
#[derive(Debug, Clone)]
pub struct Endpoint {
    host: String,
    ip: Option<IpAddr>,
    port: u16,
    weight: u32,
    attrs: HashMap<String, String>,
}

impl Endpoint {
    /// Build an endpoint from a bare host (domain name or IP literal).
    ///
    /// Returns `InvalidConfig` if `host` is neither a valid DNS name nor an
    /// IP literal (bracketed or plain).
    pub fn new(host: impl Into<String>, port: u16) -> crate::error::Result<Self> {
        let host = host.into();
        validate_host(&host)?;
        let ip = host.parse::<IpAddr>().ok();
        Ok(Self {
            host,
            ip,
            port,
            weight: DEFAULT_WEIGHT,
            attrs: HashMap::new(),
        })
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(|s| s.as_str())
    }

    /// `true` if this endpoint already carries a resolved IP and so does not
    /// need to go through the DNS resolver.
    pub fn is_ip_resolved(&self) -> bool {
        self.ip.is_some()
    }

    pub fn authority(&self) -> String {
        match self.ip {
            Some(IpAddr::V6(v6)) => format!("[{v6}]:{}", self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port && self.ip == other.ip
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
        self.ip.hash(state);
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.authority())
    }
}

fn validate_host(host: &str) -> crate::error::Result<()> {
    if host.is_empty() {
        return Err(crate::error::Error::invalid_config("endpoint host must not be empty"));
    }
    if let Some(inner) = host.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| crate::error::Error::invalid_config(format!("unclosed bracket in host: {host}")))?;
        inner
            .parse::<IpAddr>()
            .map_err(|e| crate::error::Error::invalid_config(format!("invalid IPv6 literal {host}: {e}")))?;
        return Ok(());
    }
    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    // A conservative DNS-name check: non-empty labels of valid characters.
    let is_valid_name = host
        .trim_end_matches('.')
        .split('.')
        .all(|label| !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    if !is_valid_name {
        return Err(crate::error::Error::invalid_config(format!("invalid host: {host}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_weight_and_attrs() {
        let a = Endpoint::new("example.com", 80).unwrap().with_weight(10);
        let b = Endpoint::new("example.com", 80)
            .unwrap()
            .with_weight(999)
            .with_attr("region", "us");
        assert_eq!(a, b);
    }

    #[test]
    fn ipv6_literal_authority_is_bracketed() {
        let e = Endpoint::new("::1", 8443).unwrap();
        assert_eq!(e.authority(), "[::1]:8443");
    }

    #[test]
    fn unclosed_bracket_is_rejected() {
        assert!(Endpoint::new("[::1", 80).is_err());
    }

    #[test]
    fn default_weight_is_1000() {
        let e = Endpoint::new("example.com", 80).unwrap();
        assert_eq!(e.weight(), DEFAULT_WEIGHT);
    }
}
