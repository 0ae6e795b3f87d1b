//! Circuit breaker: a fail-fast guard wrapping a delegate client.

use crate::pipeline::{ClientRequestContext, HttpClient, HttpRequest, HttpResponse, ResponseFuture};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

/// Classifies an attempt outcome as a failure (`true`) or success
/// (`false`), evaluated as `(ctx, cause?) -> bool`.
pub trait FailureRule: Send + Sync {
    fn is_failure(&self, ctx: &ClientRequestContext, response: Option<&HttpResponse>, cause: Option<&crate::error::Error>) -> bool;
}

/// The default rule: any `UnprocessedRequest` or `ProcessedFailure` counts
/// as a failure; 2xx-4xx responses do not.
pub struct DefaultFailureRule;

impl FailureRule for DefaultFailureRule {
    fn is_failure(&self, _ctx: &ClientRequestContext, response: Option<&HttpResponse>, cause: Option<&crate::error::Error>) -> bool {
        if cause.is_some() {
            return true;
        }
        response.map(|r| r.status().is_server_error()).unwrap_or(false)
    }
}

/// Window + threshold configuration. Counter windows advance on a
/// monotonic ticker supplied by the caller; this implementation uses a
/// fixed window of wall-clock time via `Instant`, which satisfies
/// "monotonic" without requiring the caller to thread a ticker through.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub window: Duration,
    pub open_duration: Duration,
    pub half_open_max_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(10),
            open_duration: Duration::from_secs(30),
            half_open_max_probes: 1,
        }
    }
}

struct Window {
    started_at: Instant,
    failures: u32,
}

/// Wraps a delegate [`HttpClient`] with CLOSED/OPEN/HALF_OPEN state. On
/// OPEN, new requests are rejected immediately with `CircuitOpen`; every
/// request already in flight when the trip happens is aborted via
/// [`ClientRequestContext::cancel`] so it doesn't keep holding a connection
/// or event-loop lease for a peer the breaker has just declared unhealthy.
pub struct CircuitBreaker {
    delegate: Arc<dyn HttpClient>,
    rule: Arc<dyn FailureRule>,
    config: CircuitBreakerConfig,
    state: AtomicU8,
    opened_at: Mutex<Option<Instant>>,
    window: Mutex<Window>,
    half_open_probes: AtomicU32,
    in_flight: Mutex<Vec<Weak<ClientRequestContext>>>,
}

impl CircuitBreaker {
    pub fn new(delegate: Arc<dyn HttpClient>, rule: Arc<dyn FailureRule>, config: CircuitBreakerConfig) -> Self {
        Self {
            delegate,
            rule,
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            opened_at: Mutex::new(None),
            window: Mutex::new(Window {
                started_at: Instant::now(),
                failures: 0,
            }),
            half_open_probes: AtomicU32::new(0),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Transitions OPEN -> HALF_OPEN once `open_duration` has elapsed,
    /// called lazily on each call attempt rather than via a background
    /// timer.
    fn maybe_recover(&self) {
        if self.state() != CircuitState::Open {
            return;
        }
        let mut opened_at = self.opened_at.lock();
        if let Some(since) = *opened_at {
            if since.elapsed() >= self.config.open_duration {
                self.state.store(CircuitState::HalfOpen as u8, Ordering::Release);
                self.half_open_probes.store(0, Ordering::Release);
                *opened_at = None;
            }
        }
    }

    fn record_failure(&self) {
        let mut window = self.window.lock();
        if window.started_at.elapsed() >= self.config.window {
            window.started_at = Instant::now();
            window.failures = 0;
        }
        window.failures += 1;
        if window.failures >= self.config.failure_threshold {
            self.trip();
        }
    }

    fn record_success(&self) {
        if self.state() == CircuitState::HalfOpen {
            self.state.store(CircuitState::Closed as u8, Ordering::Release);
            let mut window = self.window.lock();
            window.failures = 0;
            window.started_at = Instant::now();
        }
    }

    fn trip(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        *self.opened_at.lock() = Some(Instant::now());
        for weak in self.in_flight.lock().drain(..) {
            if let Some(ctx) = weak.upgrade() {
                ctx.cancel();
            }
        }
    }

    fn track_in_flight(&self, ctx: &Arc<ClientRequestContext>) {
        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|weak| weak.strong_count() > 0);
        in_flight.push(Arc::downgrade(ctx));
    }

    fn untrack_in_flight(&self, ctx: &Arc<ClientRequestContext>) {
        let target = Arc::as_ptr(ctx);
        self.in_flight.lock().retain(|weak| weak.as_ptr() != target);
    }
}

impl CircuitBreaker {
    /// Gates and instruments a call to the delegate. Takes `self: &Arc<Self>`
    /// rather than implementing [`HttpClient`] directly: updating the
    /// counters after the delegate future resolves needs a `'static` handle
    /// on `self`, which a plain `&self` in a trait method can't provide.
    /// `client.rs` wraps this in a small closure where an `HttpClient` is
    /// needed in the decorator chain.
    pub fn execute(self: &Arc<Self>, ctx: Arc<ClientRequestContext>, req: HttpRequest) -> ResponseFuture {
        self.maybe_recover();

        match self.state() {
            CircuitState::Open => return Box::pin(async move { Err(crate::error::Error::circuit_open()) }),
            CircuitState::HalfOpen => {
                let probes = self.half_open_probes.fetch_add(1, Ordering::AcqRel);
                if probes >= self.config.half_open_max_probes {
                    self.half_open_probes.fetch_sub(1, Ordering::AcqRel);
                    return Box::pin(async move { Err(crate::error::Error::circuit_open()) });
                }
            }
            CircuitState::Closed => {}
        }

        let this = self.clone();
        self.track_in_flight(&ctx);
        let fut = self.delegate.execute(ctx.clone(), req);
        Box::pin(async move {
            let outcome = tokio::select! {
                biased;
                _ = ctx.cancelled() => Err(crate::error::Error::stream_aborted()),
                result = fut => result,
            };
            this.untrack_in_flight(&ctx);
            let is_failure = match &outcome {
                Ok(response) => this.rule.is_failure(&ctx, Some(response), None),
                Err(err) => {
                    if matches!(err.kind(), crate::error::Kind::CircuitOpen) {
                        // Don't let an already-open downstream breaker
                        // double-count against this one.
                        false
                    } else {
                        this.rule.is_failure(&ctx, None, Some(err))
                    }
                }
            };
            if is_failure {
                this.record_failure();
            } else {
                this.record_success();
            }
            outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::HttpClient;
    use crate::protocol::{empty_body, SessionProtocol};
    use std::sync::atomic::AtomicUsize;

    struct AlwaysFail;
    impl HttpClient for AlwaysFail {
        fn execute(&self, _ctx: Arc<ClientRequestContext>, _req: HttpRequest) -> ResponseFuture {
            Box::pin(async { Err(crate::error::Error::processed(crate::error::ProcessedCause::ResponseTimeout)) })
        }
    }

    struct CountingDelegate(Arc<AtomicUsize>);
    impl HttpClient for CountingDelegate {
        fn execute(&self, _ctx: Arc<ClientRequestContext>, _req: HttpRequest) -> ResponseFuture {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(crate::error::Error::processed(crate::error::ProcessedCause::ResponseTimeout)) })
        }
    }

    /// Never resolves on its own; only dropping (or cancelling) the caller
    /// ever ends the call, standing in for a request stuck waiting on a
    /// slow peer.
    struct Hangs;
    impl HttpClient for Hangs {
        fn execute(&self, _ctx: Arc<ClientRequestContext>, _req: HttpRequest) -> ResponseFuture {
            Box::pin(std::future::pending())
        }
    }

    fn ctx() -> Arc<ClientRequestContext> {
        Arc::new(ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https))
    }

    fn req() -> HttpRequest {
        http::Request::builder().body(empty_body()).unwrap()
    }

    #[tokio::test]
    async fn trips_after_threshold_failures() {
        let breaker = Arc::new(CircuitBreaker::new(
            Arc::new(AlwaysFail),
            Arc::new(DefaultFailureRule),
            CircuitBreakerConfig {
                failure_threshold: 2,
                ..Default::default()
            },
        ));
        assert_eq!(breaker.state(), CircuitState::Closed);
        let _ = breaker.execute(ctx(), req()).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
        let _ = breaker.execute(ctx(), req()).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn open_circuit_rejects_without_calling_delegate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let breaker = Arc::new(CircuitBreaker::new(
            Arc::new(CountingDelegate(calls.clone())),
            Arc::new(DefaultFailureRule),
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        ));
        let _ = breaker.execute(ctx(), req()).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let result = breaker.execute(ctx(), req()).await;
        assert!(matches!(result, Err(e) if matches!(e.kind(), crate::error::Kind::CircuitOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn half_open_probe_reaches_the_delegate_then_reopens_on_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let breaker = Arc::new(CircuitBreaker::new(
            Arc::new(CountingDelegate(calls.clone())),
            Arc::new(DefaultFailureRule),
            CircuitBreakerConfig {
                failure_threshold: 1,
                open_duration: Duration::from_millis(0),
                half_open_max_probes: 1,
                ..Default::default()
            },
        ));
        let _ = breaker.execute(ctx(), req()).await;
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // `open_duration` is zero, so the next call recovers to HALF_OPEN
        // and its single probe slot reaches the delegate rather than
        // failing fast.
        let _ = breaker.execute(ctx(), req()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn tripping_aborts_a_request_already_in_flight() {
        let breaker = Arc::new(CircuitBreaker::new(
            Arc::new(Hangs),
            Arc::new(DefaultFailureRule),
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        ));

        let stuck_ctx = ctx();
        let stuck = tokio::spawn({
            let breaker = breaker.clone();
            let stuck_ctx = stuck_ctx.clone();
            async move { breaker.execute(stuck_ctx, req()).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(breaker.state(), CircuitState::Closed);

        // Simulate a threshold-triggered trip while the first call is still
        // parked on `Hangs`, the way a concurrent failing call would.
        breaker.trip();
        assert_eq!(breaker.state(), CircuitState::Open);

        let result = stuck.await.unwrap();
        assert!(matches!(result, Err(e) if e.kind() == crate::error::Kind::StreamAborted));
    }
}
