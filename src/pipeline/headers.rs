//! Header layering, precedence, and pseudo-header hygiene.

use super::context::ClientRequestContext;
use http::{HeaderMap, HeaderName, HeaderValue};

/// Headers that must never be set from user input; the wire layer
/// regenerates them from request state.
const FORBIDDEN: &[&str] = &["connection", "transfer-encoding", "keep-alive", "upgrade"];

fn is_pseudo_header(name: &HeaderName) -> bool {
    name.as_str().starts_with(':')
}

fn is_forbidden(name: &HeaderName) -> bool {
    FORBIDDEN.contains(&name.as_str())
}

/// A 3-tier header function applied left-to-right, each receiving the
/// current value (or `None`) and returning the next one.
pub type HeaderFn = Box<dyn Fn(Option<&HeaderValue>) -> Option<HeaderValue> + Send + Sync>;

#[derive(Default)]
pub struct DefaultHeaders {
    fixed: HeaderMap,
    functions: Vec<(HeaderName, HeaderFn)>,
}

impl DefaultHeaders {
    pub fn set(&mut self, name: HeaderName, value: HeaderValue) {
        self.fixed.insert(name, value);
    }

    pub fn add_fn(&mut self, name: HeaderName, f: HeaderFn) {
        self.functions.push((name, f));
    }

    fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in self.fixed.iter() {
            headers.entry(name.clone()).or_insert_with(|| value.clone());
        }
        for (name, f) in &self.functions {
            let current = headers.get(name);
            if let Some(next) = f(current) {
                headers.insert(name.clone(), next);
            }
        }
    }
}

/// Merges headers in precedence order (highest first): the request's own
/// `RequestHeaders`, the context's `additionalRequestHeaders`, then the
/// client's configured defaults. Pseudo-headers are stripped (the wire
/// layer regenerates `:scheme`/`:method` etc.); forbidden hop-by-hop
/// headers are filtered silently.
pub fn build_outbound_headers(ctx: &ClientRequestContext, request_headers: &HeaderMap, defaults: &DefaultHeaders) -> HeaderMap {
    let mut merged = HeaderMap::new();

    // Lowest priority first so later inserts win.
    defaults.apply(&mut merged);

    for (name, value) in ctx.additional_headers.lock().iter() {
        merged.insert(name.clone(), value.clone());
    }

    for (name, value) in request_headers.iter() {
        merged.insert(name.clone(), value.clone());
    }

    merged.retain(|name, _| !is_pseudo_header(name) && !is_forbidden(name));
    merged
}

/// `:authority` precedence: additional-headers override, then the
/// request's own authority, then the endpoint's `host:port`. A malformed
/// candidate (unclosed bracket, missing host/port) is skipped in favor of
/// the next source.
pub fn resolve_authority(
    additional_authority: Option<&str>,
    request_authority: Option<&str>,
    endpoint_authority: Option<&str>,
) -> Option<String> {
    [additional_authority, request_authority, endpoint_authority]
        .into_iter()
        .flatten()
        .find(|candidate| is_well_formed_authority(candidate))
        .map(|s| s.to_string())
}

fn is_well_formed_authority(authority: &str) -> bool {
    if let Some(rest) = authority.strip_prefix('[') {
        let Some((host, port)) = rest.split_once(']') else {
            return false;
        };
        if host.parse::<std::net::Ipv6Addr>().is_err() {
            return false;
        }
        return port.strip_prefix(':').map(|p| !p.is_empty() && p.parse::<u16>().is_ok()).unwrap_or(false);
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => !authority.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unclosed_bracket_authority_is_rejected() {
        assert!(!is_well_formed_authority("[::1"));
    }

    #[test]
    fn missing_port_after_bracket_is_rejected() {
        assert!(!is_well_formed_authority("[::1]"));
    }

    #[test]
    fn falls_through_to_next_source_on_malformed_candidate() {
        let resolved = resolve_authority(Some("[::1"), Some("example.com:443"), Some("fallback:80"));
        assert_eq!(resolved.as_deref(), Some("example.com:443"));
    }

    #[test]
    fn pseudo_and_forbidden_headers_are_stripped() {
        let ctx = ClientRequestContext::new(http::Method::GET, "/", crate::protocol::SessionProtocol::Https);
        let mut request_headers = HeaderMap::new();
        request_headers.insert(HeaderName::from_static("connection"), HeaderValue::from_static("keep-alive"));
        request_headers.insert(HeaderName::from_static("x-trace"), HeaderValue::from_static("abc"));
        let defaults = DefaultHeaders::default();

        let merged = build_outbound_headers(&ctx, &request_headers, &defaults);
        assert!(!merged.contains_key("connection"));
        assert!(merged.contains_key("x-trace"));
    }
}
