//! Core HTTP client: DNS resolution/caching, event-loop scheduling,
//! connection pooling, and a decorator-based request pipeline with retry
//! and circuit-breaker support.
//!
//! This crate is the transport core only; building a typed RPC/REST
//! surface, TLS trust-store policy beyond the defaults, and an exporter
//! for the [`metrics`] traits are left to callers.

pub mod backoff;
pub mod circuit_breaker;
pub mod client;
pub mod dns;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod protocol;
pub mod retry;
pub mod scheduler;
mod util;

pub use backoff::{Backoff, BackoffPolicy};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, DefaultFailureRule, FailureRule};
pub use client::{Client, ClientFactory, ClientFactoryOptions, ClientOptions};
pub use dns::{AddressFamilyPolicy, DnsCache, DnsCacheEntry, ResolverConfig, WireResolver};
pub use endpoint::{Change, DynamicEndpointGroup, Endpoint, EndpointGroup, GroupListener, SelectionStrategy, StaticEndpointGroup};
pub use error::{BoxError, Error, FailureContext, Kind, ProcessedCause, Result, UnprocessedCause};
pub use metrics::{DnsMetrics, NoopMetrics, PoolMetrics, RecordingMetrics};
pub use pipeline::{
    AdditionalHeaders, ClientRequestContext, DecoratingClientBuilder, DefaultHeaders, EndpointPreprocessor, HttpClient, HttpRequest,
    HttpResponse, Preprocessor, PreprocessorChain, ResponseFuture,
};
pub use pool::{ConnectionKey, ConnectionPool, ConnectionPoolListener, Dialer, PoolConfig, PooledHandle};
pub use protocol::{ClientConnection, SessionProtocol, TcpConnector, TcpDialer};
pub use retry::{ReplayBody, RetryConfig, RetryDecision, RetryEngine, RetryRule, RetryableRequest, ServerErrorRetryRule, UnprocessedOnlyRule};
pub use scheduler::EventLoopScheduler;
