//! Explicit forward-proxy configuration: today, the HAProxy PROXY protocol
//! (v1, text form), which prefixes the connection to the proxy with the
//! real client/destination addresses so the proxy can forward the stream
//! transparently while preserving that information downstream.

use std::net::SocketAddr;

/// How to reach the origin through an intermediary. `proxy_addr` is the
/// address this dials instead of the resolved endpoint; the endpoint
/// itself is only ever named in the PROXY protocol header.
#[derive(Debug, Clone, Copy)]
pub enum ProxyConfig {
    Haproxy { proxy_addr: SocketAddr },
}

impl ProxyConfig {
    pub fn haproxy(proxy_addr: SocketAddr) -> Self {
        Self::Haproxy { proxy_addr }
    }

    pub fn proxy_addr(&self) -> SocketAddr {
        match self {
            Self::Haproxy { proxy_addr } => *proxy_addr,
        }
    }
}

/// Encodes a PROXY protocol v1 header line for a connection originating
/// from `src` (the client's local address on the socket dialed to the
/// proxy) and destined for `dst` (the real origin). Mixed address
/// families have no v1 representation and fall back to `PROXY UNKNOWN`,
/// which tells the receiver to treat the connection as opaque.
pub fn encode_v1_header(src: SocketAddr, dst: SocketAddr) -> Vec<u8> {
    let line = match (src, dst) {
        (SocketAddr::V4(s), SocketAddr::V4(d)) => format!("PROXY TCP4 {} {} {} {}\r\n", s.ip(), d.ip(), s.port(), d.port()),
        (SocketAddr::V6(s), SocketAddr::V6(d)) => format!("PROXY TCP6 {} {} {} {}\r\n", s.ip(), d.ip(), s.port(), d.port()),
        _ => "PROXY UNKNOWN\r\n".to_string(),
    };
    line.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_pair_encodes_tcp4_line() {
        let src: SocketAddr = "10.0.0.1:51234".parse().unwrap();
        let dst: SocketAddr = "93.184.216.34:443".parse().unwrap();
        let header = encode_v1_header(src, dst);
        assert_eq!(header, b"PROXY TCP4 10.0.0.1 93.184.216.34 51234 443\r\n");
    }

    #[test]
    fn ipv6_pair_encodes_tcp6_line() {
        let src: SocketAddr = "[::1]:51234".parse().unwrap();
        let dst: SocketAddr = "[::2]:443".parse().unwrap();
        let header = encode_v1_header(src, dst);
        assert_eq!(header, b"PROXY TCP6 ::1 ::2 51234 443\r\n");
    }

    #[test]
    fn mixed_families_fall_back_to_unknown() {
        let src: SocketAddr = "10.0.0.1:51234".parse().unwrap();
        let dst: SocketAddr = "[::2]:443".parse().unwrap();
        assert_eq!(encode_v1_header(src, dst), b"PROXY UNKNOWN\r\n");
    }
}
