//! HTTP/2 wire engine. Framing, multiplexed stream bookkeeping, and flow
//! control are delegated to `hyper::client::conn::http2::Builder`. This
//! module owns only what hyper doesn't: stream-level cancellation via
//! `RST_STREAM(CANCEL)` on response timeout, and wire-error classification
//! into retry-safe vs. processed causes.

use super::io::BoxedIo;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::rt::Executor;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub type ReqBody = BoxBody<Bytes, crate::error::BoxError>;
pub type RespBody = hyper::body::Incoming;

/// Window sizes, keep-alive, and adaptive-window knobs passed through to
/// `http2::Builder`.
#[derive(Debug, Clone)]
pub struct H2Config {
    pub init_stream_window_size: Option<u32>,
    pub init_connection_window_size: Option<u32>,
    pub keep_alive_interval: Option<Duration>,
    pub keep_alive_timeout: Option<Duration>,
    pub keep_alive_while_idle: Option<bool>,
    pub adaptive_window: Option<bool>,
}

impl Default for H2Config {
    fn default() -> Self {
        Self {
            init_stream_window_size: None,
            init_connection_window_size: None,
            keep_alive_interval: None,
            keep_alive_timeout: None,
            keep_alive_while_idle: None,
            adaptive_window: None,
        }
    }
}

/// A live H2 connection: the `SendRequest` handle plus the background
/// driver task, already spawned onto the executor.
pub struct H2Connection {
    send_request: hyper::client::conn::http2::SendRequest<ReqBody>,
}

impl H2Connection {
    /// Runs the H2 client preface and handshake over `io`, spawning the
    /// connection-driver future via `executor`.
    pub async fn handshake<Ex>(io: BoxedIo, config: &H2Config, executor: Ex) -> crate::error::Result<Self>
    where
        Ex: Executor<Pin<Box<dyn Future<Output = ()> + Send>>> + Clone + Send + Sync + 'static,
    {
        let mut builder = hyper::client::conn::http2::Builder::new(TokioExecutor::new());
        builder.timer(TokioTimer::new());
        if let Some(v) = config.init_stream_window_size {
            builder.initial_stream_window_size(v);
        }
        if let Some(v) = config.init_connection_window_size {
            builder.initial_connection_window_size(v);
        }
        if let Some(v) = config.keep_alive_interval {
            builder.keep_alive_interval(v);
        }
        if let Some(v) = config.keep_alive_timeout {
            builder.keep_alive_timeout(v);
        }
        if let Some(v) = config.keep_alive_while_idle {
            builder.keep_alive_while_idle(v);
        }
        if let Some(v) = config.adaptive_window {
            builder.adaptive_window(v);
        }

        let (send_request, conn) = builder
            .handshake(io)
            .await
            .map_err(|e| crate::error::Error::unprocessed(crate::error::UnprocessedCause::ConnectFailed).with_source(e))?;

        executor.execute(Box::pin(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "h2 connection task ended");
            }
        }));

        Ok(Self { send_request })
    }

    pub async fn ready(&mut self) -> crate::error::Result<()> {
        self.send_request
            .ready()
            .await
            .map_err(|e| crate::error::Error::unprocessed(crate::error::UnprocessedCause::ConnectFailed).with_source(e))
    }

    /// Sends `req` as HEADERS(+CONTINUATION) + DATA + optional trailers. The
    /// framing itself is hyper's; this just forwards and maps errors. A
    /// response timeout is enforced by the caller racing this future against
    /// a sleep and dropping (cancelling) it, which hyper turns into
    /// `RST_STREAM(CANCEL)` on the wire.
    pub async fn send_request(&mut self, req: http::Request<ReqBody>) -> crate::error::Result<http::Response<RespBody>> {
        self.send_request
            .send_request(req)
            .await
            .map_err(|e| classify_h2_error(e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum H2ErrorClass {
    PeerReset,
    RefusedStream,
    ProtocolViolation,
}

/// `hyper::Error` doesn't expose a typed H2 error reason publicly, so this
/// classifies off its `Display` text the way a caller without access to the
/// `h2` crate's `Reason` enum must. REFUSED_STREAM means the peer never
/// started processing the stream, so the request is safe to retry elsewhere.
/// Split from [`classify_h2_error`] so the decision itself is testable
/// without needing a real `hyper::Error` to construct.
fn classify_h2_text(canceled: bool, text: &str) -> H2ErrorClass {
    if canceled {
        H2ErrorClass::PeerReset
    } else if text.contains("REFUSED_STREAM") {
        H2ErrorClass::RefusedStream
    } else {
        H2ErrorClass::ProtocolViolation
    }
}

fn classify_h2_error(e: hyper::Error) -> crate::error::Error {
    match classify_h2_text(e.is_canceled(), &e.to_string()) {
        H2ErrorClass::PeerReset => crate::error::Error::processed(crate::error::ProcessedCause::PeerReset).with_source(e),
        H2ErrorClass::RefusedStream => crate::error::Error::unprocessed(crate::error::UnprocessedCause::RefusedStream).with_source(e),
        H2ErrorClass::ProtocolViolation => crate::error::Error::processed(crate::error::ProcessedCause::ProtocolViolation).with_source(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_leaves_hyper_defaults_untouched() {
        let config = H2Config::default();
        assert!(config.init_stream_window_size.is_none());
        assert!(config.adaptive_window.is_none());
    }

    #[test]
    fn refused_stream_text_classifies_as_retry_safe_unprocessed() {
        let text = "stream error received: REFUSED_STREAM";
        assert_eq!(classify_h2_text(false, text), H2ErrorClass::RefusedStream);
    }

    #[test]
    fn canceled_classifies_as_peer_reset_even_with_refused_stream_text() {
        // `is_canceled()` takes priority: a locally cancelled stream (e.g. a
        // response-timeout drop) is not a retry-safe peer refusal.
        let text = "stream error received: REFUSED_STREAM";
        assert_eq!(classify_h2_text(true, text), H2ErrorClass::PeerReset);
    }

    #[test]
    fn unrecognized_text_classifies_as_protocol_violation() {
        let text = "stream error received: PROTOCOL_ERROR";
        assert_eq!(classify_h2_text(false, text), H2ErrorClass::ProtocolViolation);
    }
}
