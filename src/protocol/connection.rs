//! Glues the connector, TLS, and H1/H2 engines together into the
//! [`crate::pool::Dialer`] the connection pool drives.

use super::connector::TcpConnector;
use super::h1::H1Connection;
use super::h2::{H2Config, H2Connection};
use super::session::SessionProtocol;
use super::upgrade::{negotiate_h2c, NegotiationOutcome, UpgradeStrategy};
use crate::pool::{DialOutcome, Dialer};
use crate::util::BoxFuture;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper_util::rt::TokioExecutor;
use std::net::SocketAddr;

pub type ReqBody = BoxBody<Bytes, crate::error::BoxError>;
pub type RespBody = hyper::body::Incoming;

/// A live connection, either H1 or H2, behind one call surface so the
/// pipeline doesn't need to match on protocol at the call site.
pub enum ClientConnection {
    H1(tokio::sync::Mutex<H1Connection>),
    H2(tokio::sync::Mutex<H2Connection>),
}

impl ClientConnection {
    pub fn is_multiplexed(&self) -> bool {
        matches!(self, Self::H2(_))
    }

    pub async fn send_request(&self, req: http::Request<ReqBody>) -> crate::error::Result<http::Response<RespBody>> {
        match self {
            Self::H1(conn) => {
                let mut guard = conn.lock().await;
                guard.ready().await?;
                guard.send_request(req).await
            }
            Self::H2(conn) => {
                let mut guard = conn.lock().await;
                guard.ready().await?;
                guard.send_request(req).await
            }
        }
    }
}

/// Dials a TCP (+ optional TLS) connection and runs the H1 or H2 handshake
/// according to `desired`, producing the [`ClientConnection`] the pool
/// stores. Dialing and handshaking are folded into one type here because
/// this core's `Dialer` trait already separates dial from pool bookkeeping.
#[derive(Clone)]
pub struct TcpDialer {
    connector: TcpConnector,
    h2_config: H2Config,
    h2c_upgrade: UpgradeStrategy,
}

impl TcpDialer {
    pub fn new(connector: TcpConnector, h2_config: H2Config) -> Self {
        Self {
            connector,
            h2_config,
            h2c_upgrade: UpgradeStrategy::PriorKnowledge,
        }
    }

    /// Selects how a plaintext `h2c` endpoint negotiates the upgrade from H1;
    /// has no effect on TLS endpoints, which negotiate H2 via ALPN instead.
    pub fn with_h2c_upgrade(mut self, strategy: UpgradeStrategy) -> Self {
        self.h2c_upgrade = strategy;
        self
    }
}

impl Dialer for TcpDialer {
    type Conn = ClientConnection;

    fn dial(&self, desired: SessionProtocol, remote: SocketAddr, host: &str) -> BoxFuture<'static, Result<DialOutcome<Self::Conn>, crate::error::BoxError>> {
        let mut connector = self.connector.clone();
        let h2_config = self.h2_config.clone();
        let h2c_upgrade = self.h2c_upgrade;
        let domain = host.to_string();
        Box::pin(async move {
            let use_tls = desired.is_tls();
            let (io, negotiated_h2) = connector.connect(remote, use_tls, &domain).await?;

            let local = io_local_addr(remote);

            let wants_h2 = matches!(desired, SessionProtocol::H2 | SessionProtocol::H2c) || (use_tls && negotiated_h2);
            if use_tls {
                if wants_h2 {
                    let conn = H2Connection::handshake(io, &h2_config, TokioExecutor::new())
                        .await
                        .map_err(Into::<crate::error::BoxError>::into)?;
                    Ok(DialOutcome {
                        local,
                        actual: SessionProtocol::H2,
                        conn: ClientConnection::H2(tokio::sync::Mutex::new(conn)),
                    })
                } else {
                    let conn = H1Connection::handshake(io, TokioExecutor::new())
                        .await
                        .map_err(Into::<crate::error::BoxError>::into)?;
                    Ok(DialOutcome {
                        local,
                        actual: SessionProtocol::H1,
                        conn: ClientConnection::H1(tokio::sync::Mutex::new(conn)),
                    })
                }
            } else if wants_h2 {
                match negotiate_h2c(h2c_upgrade, io, &domain, TokioExecutor::new())
                    .await
                    .map_err(Into::<crate::error::BoxError>::into)?
                {
                    NegotiationOutcome::Negotiated(conn) => Ok(DialOutcome {
                        local,
                        actual: SessionProtocol::H2c,
                        conn: ClientConnection::H2(tokio::sync::Mutex::new(conn)),
                    }),
                    NegotiationOutcome::Fallback(conn) => Ok(DialOutcome {
                        local,
                        actual: SessionProtocol::H1c,
                        conn: ClientConnection::H1(tokio::sync::Mutex::new(conn)),
                    }),
                }
            } else {
                let conn = H1Connection::handshake(io, TokioExecutor::new())
                    .await
                    .map_err(Into::<crate::error::BoxError>::into)?;
                Ok(DialOutcome {
                    local,
                    actual: SessionProtocol::H1c,
                    conn: ClientConnection::H1(tokio::sync::Mutex::new(conn)),
                })
            }
        })
    }
}

/// `BoxedIo` erases the concrete socket type, so the local address is
/// reconstructed from the remote's address family; this is a placeholder
/// until the connector threads the real bound-socket local address through
/// (see `TcpConnector::connect`, which discards it today).
fn io_local_addr(remote: SocketAddr) -> SocketAddr {
    match remote {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0, 0, 0, 0, 0, 0, 0, 0], 0)),
    }
}
