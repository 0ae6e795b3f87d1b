//! `RetryDecision`: the outcome of consulting a retry rule after an attempt.

use std::time::Duration;

/// The rule's verdict for an attempt, evaluated against `(ctx, cause?)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    /// Retry after `delay`, replaying the original (buffered) body.
    Retry(Duration),
    /// Retry after `delay`, re-sending buffered streamed content the
    /// caller opted in to replay.
    RetryWithContent(Duration),
}

impl RetryDecision {
    pub fn delay(self) -> Option<Duration> {
        match self {
            Self::NoRetry => None,
            Self::Retry(d) | Self::RetryWithContent(d) => Some(d),
        }
    }
}
