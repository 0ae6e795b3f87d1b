//! Retry engine.

mod decision;
mod engine;
mod rule;

pub use decision::RetryDecision;
pub use engine::{ReplayBody, RetryConfig, RetryEngine, RetryableRequest};
pub use rule::{RetryRule, ServerErrorRetryRule, UnprocessedOnlyRule};
