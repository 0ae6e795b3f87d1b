//! Session protocol tags.

use std::fmt;

/// Wire-protocol intent. "Desired" and "negotiated" are tracked separately
/// because, e.g., a desired `H2C` can fall back to `H1C` after a failed
/// upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionProtocol {
    Http,
    Https,
    H1,
    H1c,
    H2,
    H2c,
    Proxy,
}

impl SessionProtocol {
    pub fn is_tls(self) -> bool {
        matches!(self, Self::Https | Self::H2)
    }

    pub fn is_multiplexed(self) -> bool {
        matches!(self, Self::H2 | Self::H2c)
    }

    /// `true` for protocols whose scheme is ambiguous about the actual HTTP
    /// version (`http`/`https`), needing negotiation.
    pub fn is_ambiguous(self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }

    pub fn scheme_str(self) -> &'static str {
        match self {
            Self::Http | Self::H1c | Self::H2c => "http",
            Self::Https | Self::H1 | Self::H2 => "https",
            Self::Proxy => "proxy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "h1" => Some(Self::H1),
            "h1c" => Some(Self::H1c),
            "h2" => Some(Self::H2),
            "h2c" => Some(Self::H2c),
            "proxy" => Some(Self::Proxy),
            _ => None,
        }
    }
}

impl fmt::Display for SessionProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::H1 => "h1",
            Self::H1c => "h1c",
            Self::H2 => "h2",
            Self::H2c => "h2c",
            Self::Proxy => "proxy",
        };
        f.write_str(s)
    }
}

/// The result of protocol negotiation: what the caller asked for versus
/// what was actually spoken on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedProtocol {
    pub desired: SessionProtocol,
    pub actual: SessionProtocol,
}

impl NegotiatedProtocol {
    pub fn same(protocol: SessionProtocol) -> Self {
        Self {
            desired: protocol,
            actual: protocol,
        }
    }

    pub fn fell_back(desired: SessionProtocol, actual: SessionProtocol) -> Self {
        Self { desired, actual }
    }

    pub fn was_downgraded(&self) -> bool {
        self.desired != self.actual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_schemes() {
        assert_eq!(SessionProtocol::parse("h2c"), Some(SessionProtocol::H2c));
        assert_eq!(SessionProtocol::parse("bogus"), None);
    }

    #[test]
    fn h2c_negotiated_down_to_h1c_is_a_downgrade() {
        let negotiated = NegotiatedProtocol::fell_back(SessionProtocol::H2c, SessionProtocol::H1c);
        assert!(negotiated.was_downgraded());
    }
}
