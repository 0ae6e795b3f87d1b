//! The retry rule contract.

use super::decision::RetryDecision;
use crate::backoff::BackoffPolicy;
use crate::error::Error;
use crate::pipeline::{ClientRequestContext, HttpResponse};
use crate::util::BoxFuture;

/// Evaluated per attempt against `(ctx, cause?)`, where `cause` is either
/// the response or the exception. Async so a rule may, e.g., inspect a
/// buffered error-response body before deciding.
pub trait RetryRule: Send + Sync {
    fn decide(&self, ctx: &ClientRequestContext, response: Option<&HttpResponse>, cause: Option<&Error>) -> BoxFuture<'static, RetryDecision>;
}

/// The default rule: retries any `UnprocessedRequest` failure using the
/// exponential-with-cap schedule from [`crate::backoff`], and never retries
/// a processed response (5xx, etc.) unless the caller supplies a different
/// rule.
pub struct UnprocessedOnlyRule {
    backoff: BackoffPolicy,
}

impl UnprocessedOnlyRule {
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self { backoff }
    }
}

impl RetryRule for UnprocessedOnlyRule {
    fn decide(&self, ctx: &ClientRequestContext, _response: Option<&HttpResponse>, cause: Option<&Error>) -> BoxFuture<'static, RetryDecision> {
        let retry_safe = cause.map(|c| c.is_retry_safe()).unwrap_or(false);
        let attempt = ctx.attempt_count() as u32;
        let delay = self.backoff.duration_for(attempt.saturating_sub(1));
        Box::pin(async move {
            match (retry_safe, delay) {
                (true, Some(delay)) => RetryDecision::Retry(delay),
                _ => RetryDecision::NoRetry,
            }
        })
    }
}

/// Retries on `UnprocessedRequest` failures AND on 5xx responses, replaying
/// buffered content. Useful for idempotent requests where the caller has
/// opted a streamed body into buffering.
pub struct ServerErrorRetryRule {
    backoff: BackoffPolicy,
}

impl ServerErrorRetryRule {
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self { backoff }
    }
}

impl RetryRule for ServerErrorRetryRule {
    fn decide(&self, ctx: &ClientRequestContext, response: Option<&HttpResponse>, cause: Option<&Error>) -> BoxFuture<'static, RetryDecision> {
        let retry_safe = cause.map(|c| c.is_retry_safe()).unwrap_or(false);
        let server_error = response.map(|r| r.status().is_server_error()).unwrap_or(false);
        let attempt = ctx.attempt_count() as u32;
        let delay = self.backoff.duration_for(attempt.saturating_sub(1));
        Box::pin(async move {
            match delay {
                Some(delay) if retry_safe => RetryDecision::Retry(delay),
                Some(delay) if server_error => RetryDecision::RetryWithContent(delay),
                _ => RetryDecision::NoRetry,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnprocessedCause;
    use crate::protocol::SessionProtocol;

    #[tokio::test]
    async fn unprocessed_only_rule_retries_connect_failures() {
        let rule = UnprocessedOnlyRule::new(BackoffPolicy::default());
        let ctx = ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https);
        let cause = Error::unprocessed(UnprocessedCause::ConnectFailed);
        let decision = rule.decide(&ctx, None, Some(&cause)).await;
        assert!(matches!(decision, RetryDecision::Retry(_)));
    }

    #[tokio::test]
    async fn unprocessed_only_rule_ignores_processed_failures() {
        let rule = UnprocessedOnlyRule::new(BackoffPolicy::default());
        let ctx = ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https);
        let cause = Error::processed(crate::error::ProcessedCause::ResponseTimeout);
        let decision = rule.decide(&ctx, None, Some(&cause)).await;
        assert_eq!(decision, RetryDecision::NoRetry);
    }
}
