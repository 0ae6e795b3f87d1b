//! H1C -> H2C negotiation for plaintext connections.
//!
//! Two negotiation strategies exist: the HTTP Upgrade mechanism (a
//! `Connection: Upgrade, HTTP2-Settings` request answered with
//! `101 Switching Protocols`) and prior-knowledge (send the H2 client
//! preface directly, no round trip). Both fall back to plain H1C
//! transparently when the peer doesn't switch protocols.

use super::h1::{empty_body, H1Connection, ReqBody, RespBody};
use super::h2::{H2Config, H2Connection};
use super::io::BoxedIo;

/// The outcome of negotiating H2C on a freshly dialed plaintext connection.
pub enum NegotiationOutcome {
    Negotiated(H2Connection),
    /// The peer doesn't speak H2C; `H1Connection` is the same connection the
    /// negotiation attempt ran on, already past its handshake and ready for
    /// ordinary H1 traffic, so the caller never re-dials.
    Fallback(H1Connection),
}

/// Strategy selector. Prior-knowledge skips the upgrade round trip
/// entirely and is only safe when the caller already knows (e.g. via
/// configuration or a prior successful negotiation on the same endpoint)
/// that the peer speaks H2C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeStrategy {
    HttpUpgrade,
    PriorKnowledge,
}

/// Negotiates H2C over `io` per `strategy`, producing either a live H2
/// connection or the H1 connection to fall back to.
pub async fn negotiate_h2c<Ex>(strategy: UpgradeStrategy, io: BoxedIo, host: &str, executor: Ex) -> crate::error::Result<NegotiationOutcome>
where
    Ex: hyper::rt::Executor<std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>> + Clone + Send + Sync + 'static,
{
    match strategy {
        // No round trip: send the H2 client preface directly. A peer that
        // doesn't speak H2C fails the handshake outright (there is no H1
        // fallback connection to recover, since no H1 handshake ever ran).
        UpgradeStrategy::PriorKnowledge => {
            let conn = H2Connection::handshake(io, &H2Config::default(), executor).await?;
            Ok(NegotiationOutcome::Negotiated(conn))
        }
        UpgradeStrategy::HttpUpgrade => attempt_http_upgrade(io, host, executor).await,
    }
}

/// Sends a one-shot upgrade probe over a fresh H1 handshake. A
/// `101 Switching Protocols` response hands the now-raw connection to the H2
/// client preface; anything else means the peer doesn't support the
/// upgrade, and the already-handshaken H1 connection is returned so the
/// caller can use it for the real request without dialing again.
async fn attempt_http_upgrade<Ex>(io: BoxedIo, host: &str, executor: Ex) -> crate::error::Result<NegotiationOutcome>
where
    Ex: hyper::rt::Executor<std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>> + Clone + Send + Sync + 'static,
{
    let mut h1 = H1Connection::handshake(io, executor.clone()).await?;

    let probe = http::Request::builder()
        .method(http::Method::GET)
        .uri("/")
        .header(http::header::HOST, host)
        .header(http::header::CONNECTION, "Upgrade, HTTP2-Settings")
        .header(http::header::UPGRADE, "h2c")
        .header("http2-settings", "AAA=")
        .body(empty_body())
        .expect("well-formed upgrade probe");

    let response = h1.send_request(probe).await?;
    if response.status() != http::StatusCode::SWITCHING_PROTOCOLS {
        return Ok(NegotiationOutcome::Fallback(h1));
    }

    let upgraded = hyper::upgrade::on(response)
        .await
        .map_err(|e| crate::error::Error::unprocessed(crate::error::UnprocessedCause::ConnectFailed).with_source(e))?;
    let conn = H2Connection::handshake(BoxedIo::new(upgraded), &H2Config::default(), executor).await?;
    Ok(NegotiationOutcome::Negotiated(conn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_are_distinct() {
        assert_ne!(UpgradeStrategy::HttpUpgrade, UpgradeStrategy::PriorKnowledge);
    }
}
