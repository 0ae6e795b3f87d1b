//! TCP (+ optional TLS, + optional explicit proxy) dialing.

use super::io::BoxedIo;
use super::proxy::ProxyConfig;
#[cfg(feature = "_tls-any")]
use super::tls::TlsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tower_service::Service;

/// Wraps [`HttpConnector`] (bare TCP) with an optional TLS layer and an
/// optional explicit proxy, producing a [`BoxedIo`] the protocol engines
/// can hand to hyper's handshake builders regardless of whether TLS ran.
#[derive(Clone)]
pub struct TcpConnector {
    http: HttpConnector,
    #[cfg(feature = "_tls-any")]
    tls: Option<TlsConnector>,
    proxy: Option<ProxyConfig>,
}

impl TcpConnector {
    pub fn new() -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        Self {
            http,
            #[cfg(feature = "_tls-any")]
            tls: None,
            proxy: None,
        }
    }

    #[cfg(feature = "_tls-any")]
    pub fn with_tls(mut self, tls: TlsConnector) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Connects to `remote` (through the configured proxy, if any), running
    /// TLS when configured. Returns the I/O handle plus whether ALPN
    /// negotiated H2 (meaningful only when TLS ran).
    pub async fn connect(&mut self, remote: SocketAddr, use_tls: bool, domain: &str) -> crate::error::Result<(BoxedIo, bool)> {
        if let Some(proxy) = self.proxy {
            return self.connect_via_proxy(proxy, remote, use_tls, domain).await;
        }

        let uri: http::Uri = format!("tcp://{remote}").parse().expect("socket address forms a valid authority");
        let io = Service::call(&mut self.http, uri)
            .await
            .map_err(|e| crate::error::Error::from_dial(e.to_string()))?;

        #[cfg(feature = "_tls-any")]
        if use_tls {
            let tls = self
                .tls
                .clone()
                .ok_or_else(|| crate::error::Error::invalid_config("HTTPS endpoint requested without TLS configured"))?;
            return tls.connect(TokioIo::new(io), domain).await;
        }

        #[cfg(not(feature = "_tls-any"))]
        if use_tls {
            return Err(crate::error::Error::invalid_config("TLS support not compiled in"));
        }

        let _ = domain;
        Ok((BoxedIo::new(TokioIo::new(io)), false))
    }

    /// Dials the proxy itself, writes the PROXY protocol v1 preamble naming
    /// `remote` as the real destination, then continues the handshake (TLS
    /// or plaintext) over that same connection exactly as a direct dial
    /// would.
    async fn connect_via_proxy(&mut self, proxy: ProxyConfig, remote: SocketAddr, use_tls: bool, domain: &str) -> crate::error::Result<(BoxedIo, bool)> {
        let mut stream = tokio::net::TcpStream::connect(proxy.proxy_addr())
            .await
            .map_err(crate::error::Error::from_dial)?;
        stream.set_nodelay(true).map_err(crate::error::Error::from_dial)?;
        let local = stream.local_addr().map_err(crate::error::Error::from_dial)?;

        let header = super::proxy::encode_v1_header(local, remote);
        stream
            .write_all(&header)
            .await
            .map_err(|e| crate::error::Error::unprocessed(crate::error::UnprocessedCause::ProxyConnectFailed).with_source(e))?;

        let io = TokioIo::new(stream);

        #[cfg(feature = "_tls-any")]
        if use_tls {
            let tls = self
                .tls
                .clone()
                .ok_or_else(|| crate::error::Error::invalid_config("HTTPS endpoint requested without TLS configured"))?;
            return tls.connect(io, domain).await;
        }

        #[cfg(not(feature = "_tls-any"))]
        if use_tls {
            return Err(crate::error::Error::invalid_config("TLS support not compiled in"));
        }

        let _ = domain;
        Ok((BoxedIo::new(io), false))
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}
