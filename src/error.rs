//! Error taxonomy for the HTTP client core.
//!
//! Every failure that can escape the pipeline is wrapped in [`Error`], which
//! carries a [`Kind`] (the taxonomy category), an optional boxed root cause,
//! and a snapshot of the request context at the time of failure.

use std::fmt;
use std::time::Duration;

/// Type-erased source error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure produced anywhere in the client pipeline.
#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<BoxError>,
    context: Option<FailureContext>,
}

/// Snapshot of the request at abort time.
#[derive(Debug, Clone, Default)]
pub struct FailureContext {
    pub method: Option<http::Method>,
    pub path: Option<String>,
    pub endpoint: Option<String>,
    pub attempt: usize,
}

/// Taxonomy category. Root causes are attached via `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Request never reached a server; safe to retry.
    UnprocessedRequest(UnprocessedCause),
    /// Request reached the server; retry-safety is application-defined.
    ProcessedFailure(ProcessedCause),
    /// Request or response aborted, locally or remotely.
    StreamAborted,
    /// The circuit breaker is open and rejected the call fast.
    CircuitOpen,
    /// Malformed configuration: URI, authority, header, or builder option.
    InvalidConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnprocessedCause {
    ConnectFailed,
    DnsResolutionFailed,
    DnsTimeout,
    EmptyEndpointGroup,
    EndpointSelectionTimeout,
    RefusedStream,
    ProxyConnectFailed,
    TlsHandshakeFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessedCause {
    ResponseTimeout,
    ContentTooLarge,
    ProtocolViolation,
    PeerReset,
}

impl Error {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            source: None,
            context: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_context(mut self, context: FailureContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn unprocessed(cause: UnprocessedCause) -> Self {
        Self::new(Kind::UnprocessedRequest(cause))
    }

    pub fn processed(cause: ProcessedCause) -> Self {
        Self::new(Kind::ProcessedFailure(cause))
    }

    pub fn stream_aborted() -> Self {
        Self::new(Kind::StreamAborted)
    }

    pub fn circuit_open() -> Self {
        Self::new(Kind::CircuitOpen)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(Kind::InvalidConfig).with_source(msg.into())
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn context(&self) -> Option<&FailureContext> {
        self.context.as_ref()
    }

    /// A request is safe to retry exactly when
    /// it never reached the origin.
    pub fn is_retry_safe(&self) -> bool {
        matches!(self.kind, Kind::UnprocessedRequest(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::UnprocessedRequest(cause) => write!(f, "unprocessed request: {cause:?}"),
            Kind::ProcessedFailure(cause) => write!(f, "processed failure: {cause:?}"),
            Kind::StreamAborted => write!(f, "stream aborted"),
            Kind::CircuitOpen => write!(f, "circuit breaker open"),
            Kind::InvalidConfig => write!(f, "invalid configuration"),
        }?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl Error {
    pub(crate) fn from_dial(source: impl Into<BoxError>) -> Self {
        Self::unprocessed(UnprocessedCause::ConnectFailed).with_source(source)
    }

    pub(crate) fn from_dns(source: impl Into<BoxError>, timed_out: bool) -> Self {
        let cause = if timed_out {
            UnprocessedCause::DnsTimeout
        } else {
            UnprocessedCause::DnsResolutionFailed
        };
        Self::unprocessed(cause).with_source(source)
    }
}

/// Unrecoverable host-lookup failure: evicted after backoff exhaustion
/// or exhausted search-domain list, both negative.
#[derive(Debug, thiserror::Error)]
pub enum UnknownHostError {
    #[error("name not found: {0}")]
    NotFound(String),
    #[error("all search domains exhausted for {0}")]
    SearchDomainsExhausted(String),
}

/// All-server DNS timeout, kept distinct from [`UnknownHostError`] because
/// timeouts are never cached as negative answers.
#[derive(Debug, thiserror::Error)]
#[error("DNS query for {name} timed out after {elapsed:?}")]
pub struct DnsTimeoutError {
    pub name: String,
    pub elapsed: Duration,
}

pub type Result<T> = std::result::Result<T, Error>;
