//! The retry engine.
//!
//! Unlike the other decorators in [`crate::pipeline`], the retry engine
//! does not implement [`crate::pipeline::HttpClient`] directly: a plain
//! `HttpRequest` is consumed on send and cannot be replayed, while a retry
//! attempt needs to resend the same (or re-buffered) body and re-select an
//! endpoint. This engine instead owns a [`RetryableRequest`] — enough to
//! reconstruct a fresh `HttpRequest` per attempt — and sits above the
//! decorator chain, invoking an already-decorated delegate once per
//! attempt.

use crate::pipeline::{ClientRequestContext, HttpClient, HttpResponse};
use crate::pipeline::{EndpointPreprocessor, Preprocessor};
use crate::protocol::ReqBody;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::decision::RetryDecision;
use super::rule::RetryRule;

/// A request body the engine can resend. Streamed bodies that the caller
/// did not opt into buffering are `NotReplayable`: a non-first attempt
/// needing to replay one fails fatally.
pub enum ReplayBody {
    Empty,
    Buffered(Bytes),
    NotReplayable,
}

impl ReplayBody {
    fn to_req_body(&self) -> crate::error::Result<ReqBody> {
        match self {
            Self::Empty => Ok(crate::protocol::empty_body()),
            Self::Buffered(bytes) => Ok(Full::new(bytes.clone()).map_err(|never| match never {}).boxed()),
            Self::NotReplayable => Err(crate::error::Error::invalid_config(
                "request body is not replayable across retry attempts",
            )),
        }
    }
}

pub struct RetryableRequest {
    pub parts: http::request::Parts,
    pub body: ReplayBody,
}

impl RetryableRequest {
    pub fn new(parts: http::request::Parts, body: ReplayBody) -> Self {
        Self { parts, body }
    }

    fn to_http_request(&self, first_attempt: bool) -> crate::error::Result<http::Request<ReqBody>> {
        let body = if first_attempt {
            // The first attempt is always replayable, even `NotReplayable`
            // bodies, because nothing has consumed them yet.
            match &self.body {
                ReplayBody::NotReplayable => crate::protocol::empty_body(),
                other => other.to_req_body()?,
            }
        } else {
            self.body.to_req_body()?
        };
        Ok(http::Request::from_parts(self.parts.clone(), body))
    }
}

/// Bounds on the engine's own loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_total_attempts: usize,
    pub endpoint_selection_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_total_attempts: 3,
            endpoint_selection_timeout: Duration::from_secs(1),
        }
    }
}

pub struct RetryEngine {
    delegate: Arc<dyn HttpClient>,
    preprocessors: Option<Arc<EndpointPreprocessor>>,
    rule: Arc<dyn RetryRule>,
    config: RetryConfig,
}

impl RetryEngine {
    pub fn new(delegate: Arc<dyn HttpClient>, preprocessors: Option<Arc<EndpointPreprocessor>>, rule: Arc<dyn RetryRule>, config: RetryConfig) -> Self {
        Self {
            delegate,
            preprocessors,
            rule,
            config,
        }
    }

    /// Re-selects the endpoint for a fresh attempt. A selection that blocks
    /// past `endpoint_selection_timeout` surfaces as an endpoint-selection
    /// timeout wrapped in an unprocessed-request failure, eligible for
    /// retry under the unprocessed-failure path.
    async fn reselect(&self, ctx: ClientRequestContext) -> crate::error::Result<ClientRequestContext> {
        let Some(preprocessors) = &self.preprocessors else {
            return Ok(ctx);
        };
        let preprocessors = preprocessors.clone();
        let deadline = self.config.endpoint_selection_timeout;
        let result = if deadline.is_zero() {
            preprocessors.process(ctx)
        } else {
            match tokio::time::timeout(deadline, async { preprocessors.process(ctx) }).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(crate::error::Error::unprocessed(
                        crate::error::UnprocessedCause::EndpointSelectionTimeout,
                    ))
                }
            }
        };
        result
    }

    pub async fn execute(&self, mut ctx: ClientRequestContext, request: RetryableRequest) -> crate::error::Result<HttpResponse> {
        let start = Instant::now();

        loop {
            let attempt = ctx.attempt.load(std::sync::atomic::Ordering::Acquire);
            if attempt > 1 {
                ctx = self.reselect(ctx).await?;
            }

            let first_attempt = attempt == 1;
            let req = request.to_http_request(first_attempt)?;

            let ctx_arc = Arc::new(ctx);
            let outcome = self.delegate.execute(ctx_arc.clone(), req).await;
            ctx = Arc::try_unwrap(ctx_arc).unwrap_or_else(|arc| clone_context(&arc));

            let decision = match &outcome {
                Ok(response) => self.rule.decide(&ctx, Some(response), None).await,
                Err(err) => self.rule.decide(&ctx, None, Some(err)).await,
            };

            match decision {
                RetryDecision::NoRetry => return outcome,
                RetryDecision::Retry(delay) | RetryDecision::RetryWithContent(delay) => {
                    let next_attempt = ctx.attempt.fetch_add(1, std::sync::atomic::Ordering::AcqRel) + 1;
                    if next_attempt > self.config.max_total_attempts {
                        return outcome;
                    }
                    tracing::debug!(attempt = next_attempt, elapsed = ?start.elapsed(), "retrying request");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// `ClientRequestContext` isn't `Clone` (it holds a cancellation flag and
/// mutable timeout cells that retries must NOT share across attempts), so
/// this rebuilds the handful of fields the engine needs to keep driving the
/// loop when a delegate held on to its own clone of the `Arc`.
fn clone_context(ctx: &ClientRequestContext) -> ClientRequestContext {
    let mut fresh = ClientRequestContext::new(ctx.method.clone(), ctx.path.clone(), ctx.scheme);
    fresh.attempt.store(ctx.attempt_count(), std::sync::atomic::Ordering::Release);
    if let Some(endpoint) = &ctx.endpoint {
        fresh.endpoint = Some(endpoint.clone());
    }
    fresh
}
