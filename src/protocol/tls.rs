//! Client-side TLS handshake. Gated behind the crate's `_tls-any` feature,
//! with a `tls`/`tls-aws-lc` feature split selecting the rustls crypto
//! provider.

#![cfg(feature = "_tls-any")]

use super::io::BoxedIo;
use hyper_util::rt::TokioIo;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector as RustlsConnector;

pub const ALPN_H2: &[u8] = b"h2";
pub const ALPN_H1: &[u8] = b"http/1.1";

/// The client-side TLS posture, shared across every endpoint a
/// [`TcpConnector`](super::connector::TcpConnector) dials. Because this
/// core's connector serves an arbitrary endpoint group rather than one
/// fixed domain, `ServerName` cannot be bound once at construction; it is
/// resolved per connection from the caller-supplied domain instead.
#[derive(Clone)]
pub struct TlsConnector {
    config: Arc<ClientConfig>,
    assume_http2: bool,
}

impl TlsConnector {
    pub fn new(assume_http2: bool) -> crate::error::Result<Self> {
        let mut roots = RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        for err in &native.errors {
            tracing::debug!(%err, "skipped a native root certificate");
        }
        roots.add_parsable_certificates(native.certs);

        let mut config = ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();
        config.alpn_protocols.push(ALPN_H2.to_vec());
        config.alpn_protocols.push(ALPN_H1.to_vec());

        Ok(Self {
            config: Arc::new(config),
            assume_http2,
        })
    }

    /// Performs the handshake against `domain`, returning the boxed IO plus
    /// whether ALPN negotiated H2.
    pub async fn connect<I>(&self, io: I, domain: &str) -> crate::error::Result<(BoxedIo, bool)>
    where
        I: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|e| crate::error::Error::invalid_config(format!("invalid TLS server name {domain}: {e}")))?;

        let stream = RustlsConnector::from(self.config.clone())
            .connect(server_name, io)
            .await
            .map_err(|e| crate::error::Error::unprocessed(crate::error::UnprocessedCause::TlsHandshakeFailed).with_source(e))?;

        let (_, session) = stream.get_ref();
        let negotiated_h2 = session.alpn_protocol() == Some(ALPN_H2);
        if !negotiated_h2 && !self.assume_http2 {
            // ALPN came back http/1.1 or absent; caller falls back to H1.
        }
        Ok((BoxedIo::new(TokioIo::new(stream)), negotiated_h2))
    }
}

impl fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnector").finish()
    }
}
