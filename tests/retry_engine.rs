//! End-to-end retry engine scenarios: attempt bounding, endpoint
//! reselection on retry, and the empty-endpoint-group failure path. The
//! wire-level REFUSED_STREAM classification these retries are meant to
//! recover from is unit-tested separately in `protocol::h2`.

use corehttp::error::{Error, UnprocessedCause};
use corehttp::pipeline::{ClientRequestContext, EndpointPreprocessor, HttpClient, HttpRequest, ResponseFuture};
use corehttp::protocol::SessionProtocol;
use corehttp::retry::{RetryConfig, RetryEngine, RetryableRequest, ReplayBody, UnprocessedOnlyRule};
use corehttp::backoff::BackoffPolicy;
use corehttp::scheduler::EventLoopScheduler;
use corehttp::endpoint::{Endpoint, EndpointGroup, SelectionStrategy, StaticEndpointGroup};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A delegate that always fails with a retry-safe cause, counting how many
/// times it was invoked.
struct AlwaysUnprocessed(Arc<AtomicUsize>);

impl HttpClient for AlwaysUnprocessed {
    fn execute(&self, _ctx: Arc<ClientRequestContext>, _req: HttpRequest) -> ResponseFuture {
        self.0.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Err(Error::unprocessed(UnprocessedCause::ConnectFailed)) })
    }
}

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(1), 1.0).unwrap()
}

fn request() -> RetryableRequest {
    let (parts, _) = http::Request::builder().method(http::Method::GET).uri("/").body(()).unwrap().into_parts();
    RetryableRequest::new(parts, ReplayBody::Empty)
}

#[tokio::test]
async fn retries_up_to_max_total_attempts_then_surfaces_the_last_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let delegate: Arc<dyn HttpClient> = Arc::new(AlwaysUnprocessed(calls.clone()));
    let engine = RetryEngine::new(
        delegate,
        None,
        Arc::new(UnprocessedOnlyRule::new(fast_backoff())),
        RetryConfig {
            max_total_attempts: 3,
            endpoint_selection_timeout: Duration::from_millis(100),
        },
    );

    let ctx = ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https);
    let err = engine.execute(ctx, request()).await.unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(err.is_retry_safe());
}

#[tokio::test]
async fn max_total_attempts_of_one_never_retries() {
    let calls = Arc::new(AtomicUsize::new(0));
    let delegate: Arc<dyn HttpClient> = Arc::new(AlwaysUnprocessed(calls.clone()));
    let engine = RetryEngine::new(
        delegate,
        None,
        Arc::new(UnprocessedOnlyRule::new(fast_backoff())),
        RetryConfig {
            max_total_attempts: 1,
            endpoint_selection_timeout: Duration::from_millis(100),
        },
    );

    let ctx = ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https);
    let _ = engine.execute(ctx, request()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reselects_the_endpoint_on_every_attempt_after_the_first() {
    let calls = Arc::new(AtomicUsize::new(0));
    let delegate: Arc<dyn HttpClient> = Arc::new(AlwaysUnprocessed(calls.clone()));

    let group: Arc<dyn EndpointGroup> = Arc::new(StaticEndpointGroup::of(Endpoint::new("example.com", 443).unwrap()));
    let scheduler = Arc::new(EventLoopScheduler::new(2));
    let preprocessor = Arc::new(EndpointPreprocessor::new(
        SessionProtocol::Https,
        group,
        SelectionStrategy::round_robin(),
        scheduler,
    ));

    let engine = RetryEngine::new(
        delegate,
        Some(preprocessor),
        Arc::new(UnprocessedOnlyRule::new(fast_backoff())),
        RetryConfig {
            max_total_attempts: 3,
            endpoint_selection_timeout: Duration::from_millis(100),
        },
    );

    let ctx = ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https);
    let _ = engine.execute(ctx, request()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn empty_endpoint_group_on_reselect_is_unprocessed_and_retry_safe() {
    let calls = Arc::new(AtomicUsize::new(0));
    let delegate: Arc<dyn HttpClient> = Arc::new(AlwaysUnprocessed(calls.clone()));

    let group: Arc<dyn EndpointGroup> = Arc::new(StaticEndpointGroup::new(vec![]));
    let scheduler = Arc::new(EventLoopScheduler::new(2));
    let preprocessor = Arc::new(EndpointPreprocessor::new(
        SessionProtocol::Https,
        group,
        SelectionStrategy::round_robin(),
        scheduler,
    ));

    let engine = RetryEngine::new(
        delegate,
        Some(preprocessor),
        Arc::new(UnprocessedOnlyRule::new(fast_backoff())),
        RetryConfig {
            max_total_attempts: 3,
            endpoint_selection_timeout: Duration::from_millis(100),
        },
    );

    // The first attempt never reselects (the caller is expected to have
    // already run the preprocessor chain once via `Client::execute`), so
    // the delegate still runs once before the empty group surfaces on the
    // first reselect attempt.
    let ctx = ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https);
    let err = engine.execute(ctx, request()).await.unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        err.kind(),
        corehttp::error::Kind::UnprocessedRequest(UnprocessedCause::EmptyEndpointGroup)
    ));
}
