//! Connection pool keys.

use crate::protocol::session::SessionProtocol;
use std::fmt;
use std::net::SocketAddr;

/// `(desiredProtocol, localAddress?, remoteAddress, actualProtocol?)`.
///
/// `local` is absent for pending dials (the local address is only known
/// once the socket is bound); `actual` is absent until negotiation
/// completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub desired: SessionProtocol,
    pub local: Option<SocketAddr>,
    pub remote: SocketAddr,
    pub actual: Option<SessionProtocol>,
}

impl ConnectionKey {
    pub fn pending(desired: SessionProtocol, remote: SocketAddr) -> Self {
        Self {
            desired,
            local: None,
            remote,
            actual: None,
        }
    }

    pub fn opened(self, local: SocketAddr, actual: SessionProtocol) -> Self {
        Self {
            local: Some(local),
            actual: Some(actual),
            ..self
        }
    }

    /// The dial-discipline key ignores `local`/`actual`: at most one
    /// in-flight dial per `(proto, remote)`.
    pub fn dial_key(&self) -> (SessionProtocol, SocketAddr) {
        (self.desired, self.remote)
    }

    /// The dial-discipline key of the "reverse direction" of this
    /// connection: what the peer would have used had it dialed us first.
    /// Only meaningful once
    /// `local` is known, i.e. after the connection has opened.
    pub fn reversed_dial_key(&self) -> Option<(SessionProtocol, SocketAddr)> {
        self.local.map(|local| (self.desired, local))
    }

    /// A stable string tag, used as the metrics key.
    pub fn tag(&self) -> String {
        match self.local {
            Some(local) => format!("{}|{local}|{}", self.desired, self.remote),
            None => format!("{}|-|{}", self.desired, self.remote),
        }
    }

    /// The tag a dial is tracked under while PENDING, before `local` is
    /// known. `connection_pending`/`connection_failed` always key the
    /// pending gauge here regardless of whether the key they're called with
    /// has since acquired a `local` address, so increments and decrements
    /// land on the same counter.
    pub fn dial_tag(&self) -> String {
        format!("{}|-|{}", self.desired, self.remote)
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dial_key_ignores_local_and_actual() {
        let remote: SocketAddr = "10.10.10.11:3333".parse().unwrap();
        let local: SocketAddr = "10.10.10.10:3333".parse().unwrap();
        let pending = ConnectionKey::pending(SessionProtocol::H1, remote);
        let opened = pending.opened(local, SessionProtocol::H1);
        assert_eq!(pending.dial_key(), opened.dial_key());
    }
}
