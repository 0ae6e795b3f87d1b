//! `ClientFactory`/`ClientOptions`/`Client`: the assembled surface that
//! wires DNS, scheduling, pooling, the protocol engines, and the
//! decorator/retry/circuit-breaker pipeline into one call path.

use crate::backoff::BackoffPolicy;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, DefaultFailureRule, FailureRule};
use crate::dns::{DnsCache, NameResolver, ResolverConfig};
use crate::endpoint::{Endpoint, EndpointGroup, SelectionStrategy};
use crate::error::{Error, ProcessedCause, UnprocessedCause};
use crate::metrics::{DnsMetrics, NoopMetrics, PoolMetrics};
use crate::pipeline::{
    build_outbound_headers, resolve_authority, compose_path, ClientRequestContext, DecoratingClientBuilder, DefaultHeaders,
    EndpointPreprocessor, EndpointRemapper, HttpClient, HttpRequest, HttpResponse, Preprocessor, PreprocessorChain, ResponseFuture,
};
use crate::pool::{BroadcastListener, ConnectionPool, ConnectionPoolListener, CountingListener, PoolConfig, TracingListener};
use crate::protocol::{ClientConnection, H2Config, ProxyConfig, SessionProtocol, TcpConnector, TcpDialer, UpgradeStrategy};
use crate::retry::{ReplayBody, RetryConfig, RetryEngine, RetryRule, RetryableRequest, UnprocessedOnlyRule};
use crate::scheduler::EventLoopScheduler;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Builder for the resources a [`ClientFactory`] shares across every
/// [`Client`] it produces.
pub struct ClientFactoryOptions {
    resolver_config: ResolverConfig,
    address_resolver: Option<Arc<dyn NameResolver>>,
    pool_config: PoolConfig,
    event_loop_group_size: usize,
    pool_metrics: Arc<dyn PoolMetrics>,
    dns_metrics: Arc<dyn DnsMetrics>,
    h2_config: H2Config,
    use_http2_preface: bool,
    proxy_config: Option<ProxyConfig>,
    #[cfg(feature = "_tls-any")]
    tls_assume_http2: bool,
}

impl Default for ClientFactoryOptions {
    fn default() -> Self {
        Self {
            resolver_config: ResolverConfig::default(),
            address_resolver: None,
            pool_config: PoolConfig::default(),
            event_loop_group_size: 4,
            pool_metrics: Arc::new(NoopMetrics),
            dns_metrics: Arc::new(NoopMetrics),
            h2_config: H2Config::default(),
            use_http2_preface: false,
            proxy_config: None,
            #[cfg(feature = "_tls-any")]
            tls_assume_http2: false,
        }
    }
}

impl ClientFactoryOptions {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn resolver_config(mut self, config: ResolverConfig) -> Self {
        self.resolver_config = config;
        self
    }

    /// Replaces the built-in refreshing cache with a custom resolution
    /// strategy (a fixed-host map in tests, a service-discovery client in
    /// production). When unset, every client built from this factory
    /// resolves through the shared [`DnsCache`].
    pub fn address_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.address_resolver = Some(resolver);
        self
    }

    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Number of logical event-loop slots per origin. Rejects zero.
    pub fn event_loop_group_size(mut self, size: usize) -> crate::error::Result<Self> {
        if size == 0 {
            return Err(Error::invalid_config("event loop group size must be positive"));
        }
        self.event_loop_group_size = size;
        Ok(self)
    }

    pub fn pool_metrics(mut self, metrics: Arc<dyn PoolMetrics>) -> Self {
        self.pool_metrics = metrics;
        self
    }

    pub fn dns_metrics(mut self, metrics: Arc<dyn DnsMetrics>) -> Self {
        self.dns_metrics = metrics;
        self
    }

    pub fn h2_config(mut self, config: H2Config) -> Self {
        self.h2_config = config;
        self
    }

    /// Sends the H2 prior-knowledge preface on plaintext `h2c` connections
    /// instead of going through an HTTP `Upgrade` request first. Has no
    /// effect on TLS endpoints, which negotiate H2 via ALPN. This lives on
    /// the factory rather than per-client options because the dialer it
    /// configures is built once and shared across every client the factory
    /// produces.
    pub fn use_http2_preface(mut self, use_preface: bool) -> Self {
        self.use_http2_preface = use_preface;
        self
    }

    /// Routes every dialed connection through an explicit proxy, prefixing
    /// the stream with a PROXY protocol header naming the real endpoint.
    pub fn proxy_config(mut self, proxy: ProxyConfig) -> Self {
        self.proxy_config = Some(proxy);
        self
    }

    #[cfg(feature = "_tls-any")]
    pub fn tls_assume_http2(mut self, assume: bool) -> Self {
        self.tls_assume_http2 = assume;
        self
    }

    pub fn build(self) -> crate::error::Result<ClientFactory> {
        let dns = DnsCache::new(self.resolver_config, self.dns_metrics.clone())?;
        let resolver: Arc<dyn NameResolver> = self.address_resolver.unwrap_or_else(|| dns.clone() as Arc<dyn NameResolver>);
        let scheduler = Arc::new(EventLoopScheduler::new(self.event_loop_group_size));

        let mut connector = TcpConnector::new();
        #[cfg(feature = "_tls-any")]
        {
            let tls = crate::protocol::TlsConnector::new(self.tls_assume_http2)?;
            connector = connector.with_tls(tls);
        }
        if let Some(proxy) = self.proxy_config {
            connector = connector.with_proxy(proxy);
        }
        let h2c_upgrade = if self.use_http2_preface {
            UpgradeStrategy::PriorKnowledge
        } else {
            UpgradeStrategy::HttpUpgrade
        };
        let dialer = TcpDialer::new(connector, self.h2_config).with_h2c_upgrade(h2c_upgrade);

        let listener: Arc<dyn ConnectionPoolListener> = Arc::new(BroadcastListener::new(vec![
            Arc::new(CountingListener::new(self.pool_metrics.clone())),
            Arc::new(TracingListener),
        ]));
        let pool = Arc::new(ConnectionPool::new(dialer, listener, self.pool_config));

        Ok(ClientFactory {
            dns,
            resolver,
            pool,
            scheduler,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Owns the shared DNS cache, connection pool, and event-loop scheduler.
/// Every [`Client`] built from the same factory reuses these, and
/// [`ClientFactory::close`] tears them all down together.
pub struct ClientFactory {
    dns: Arc<DnsCache>,
    resolver: Arc<dyn NameResolver>,
    pool: Arc<ConnectionPool<ClientConnection>>,
    scheduler: Arc<EventLoopScheduler>,
    closed: Arc<AtomicBool>,
}

impl ClientFactory {
    pub fn builder() -> ClientFactoryOptions {
        ClientFactoryOptions::default()
    }

    /// Assembles a [`Client`] from `options` against this factory's shared
    /// resources.
    pub fn client(&self, options: ClientOptions) -> crate::error::Result<Client> {
        let strategy = options
            .selection_strategy
            .unwrap_or_else(SelectionStrategy::round_robin);

        let endpoint_preprocessor = match options.endpoint_group {
            Some(group) => {
                let mut ep = EndpointPreprocessor::new(options.session_protocol, group, strategy, self.scheduler.clone());
                if let Some(remapper) = options.endpoint_remapper.clone() {
                    ep = ep.with_remapper(remapper);
                }
                Some(Arc::new(ep))
            }
            None => None,
        };

        let mut stages: Vec<Arc<dyn Preprocessor>> = Vec::new();
        if let Some(ep) = &endpoint_preprocessor {
            stages.push(ep.clone() as Arc<dyn Preprocessor>);
        }
        stages.extend(options.preprocessors.iter().cloned());
        if stages.is_empty() {
            return Err(Error::invalid_config(
                "a client requires an endpoint group or at least one preprocessor",
            ));
        }
        let preprocessors = PreprocessorChain::new(stages);

        let mut network: Arc<dyn HttpClient> = Arc::new(NetworkClient {
            resolver: self.resolver.clone(),
            pool: self.pool.clone(),
            headers: Arc::new(options.default_headers),
            base_path: options.base_path.clone(),
            closed: self.closed.clone(),
        });

        if let Some(cb_config) = options.circuit_breaker {
            let cb = Arc::new(CircuitBreaker::new(network, options.failure_rule.clone(), cb_config));
            network = Arc::new(CircuitBreakerAdapter(cb));
        }

        let decorated = options.decoration.build(network);
        let retry = RetryEngine::new(decorated, endpoint_preprocessor, options.retry_rule, options.retry_config);

        Ok(Client {
            preprocessors,
            retry,
            default_scheme: options.session_protocol,
            default_response_timeout: options.response_timeout,
            default_write_timeout: options.write_timeout,
            max_response_length: options.max_response_length,
            request_id_generator: options.request_id_generator,
        })
    }

    /// Closes every connection, cancels scheduled DNS refreshes, and
    /// invalidates the cache; subsequent requests on any `Client` built from
    /// this factory fail fast with `InvalidConfig`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.dns.close();
        self.pool.close_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Wraps a [`CircuitBreaker`] to satisfy [`HttpClient`]'s plain `&self`
/// receiver; see the doc comment on `CircuitBreaker::execute` for why the
/// breaker itself can't implement the trait directly.
struct CircuitBreakerAdapter(Arc<CircuitBreaker>);

impl HttpClient for CircuitBreakerAdapter {
    fn execute(&self, ctx: Arc<ClientRequestContext>, req: HttpRequest) -> ResponseFuture {
        self.0.execute(ctx, req)
    }
}

/// Per-client request options. Every setter takes `self` and returns
/// `Self`; validation happens in [`ClientFactory::client`] at assembly
/// time.
pub struct ClientOptions {
    base_path: String,
    session_protocol: SessionProtocol,
    endpoint_group: Option<Arc<dyn EndpointGroup>>,
    selection_strategy: Option<SelectionStrategy>,
    endpoint_remapper: Option<EndpointRemapper>,
    preprocessors: Vec<Arc<dyn Preprocessor>>,
    decoration: DecoratingClientBuilder,
    default_headers: DefaultHeaders,
    max_response_length: Option<u64>,
    response_timeout: Duration,
    write_timeout: Duration,
    retry_config: RetryConfig,
    retry_rule: Arc<dyn RetryRule>,
    circuit_breaker: Option<CircuitBreakerConfig>,
    failure_rule: Arc<dyn FailureRule>,
    request_id_generator: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    /// Forces H1 when negotiating an ambiguous `http`/`https` scheme.
    /// Recorded but not yet consulted: a `ClientOptions` here always
    /// carries a concrete [`SessionProtocol`] (never `Http`/`Https`
    /// themselves), so the ambiguity this flag resolves doesn't arise under
    /// the current `session_protocol` setter. Kept so a future
    /// scheme-inference preprocessor has somewhere to read the preference
    /// from.
    pub prefer_http1: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            session_protocol: SessionProtocol::Https,
            endpoint_group: None,
            selection_strategy: None,
            endpoint_remapper: None,
            preprocessors: Vec::new(),
            decoration: DecoratingClientBuilder::new(),
            default_headers: DefaultHeaders::default(),
            max_response_length: None,
            response_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            retry_config: RetryConfig::default(),
            retry_rule: Arc::new(UnprocessedOnlyRule::new(BackoffPolicy::default())),
            circuit_breaker: None,
            failure_rule: Arc::new(DefaultFailureRule),
            request_id_generator: None,
            prefer_http1: false,
        }
    }
}

impl ClientOptions {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn session_protocol(mut self, protocol: SessionProtocol) -> Self {
        self.session_protocol = protocol;
        self
    }

    pub fn endpoint_group(mut self, group: Arc<dyn EndpointGroup>) -> Self {
        self.endpoint_group = Some(group);
        self
    }

    pub fn selection_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.selection_strategy = Some(strategy);
        self
    }

    /// Rewrites the endpoint a request is about to dial, after it has been
    /// determined, whether selected from the endpoint group or pinned by a
    /// per-request absolute-URI override.
    pub fn endpoint_remapper<F>(mut self, remapper: F) -> Self
    where
        F: Fn(Endpoint) -> Endpoint + Send + Sync + 'static,
    {
        self.endpoint_remapper = Some(Arc::new(remapper));
        self
    }

    pub fn preprocessor(mut self, preprocessor: Arc<dyn Preprocessor>) -> Self {
        self.preprocessors.push(preprocessor);
        self
    }

    /// The first decorator added is innermost, closest to the network (see
    /// `DecoratingClientBuilder`).
    pub fn decorator<F>(mut self, layer: F) -> Self
    where
        F: Fn(Arc<dyn HttpClient>) -> Arc<dyn HttpClient> + Send + Sync + 'static,
    {
        self.decoration = self.decoration.decorator(layer);
        self
    }

    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.set(name, value);
        self
    }

    pub fn max_response_length(mut self, bytes: u64) -> Self {
        self.max_response_length = Some(bytes);
        self
    }

    /// A zero duration disables the timeout.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn retry_rule(mut self, rule: Arc<dyn RetryRule>) -> Self {
        self.retry_rule = rule;
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    pub fn failure_rule(mut self, rule: Arc<dyn FailureRule>) -> Self {
        self.failure_rule = rule;
        self
    }

    pub fn request_id_generator(mut self, generator: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        self.request_id_generator = Some(generator);
        self
    }

    pub fn prefer_http1(mut self, prefer: bool) -> Self {
        self.prefer_http1 = prefer;
        self
    }
}

/// The assembled client surface: preprocessors, then the retry engine
/// wrapping (circuit breaker +) user decorators wrapping the network
/// client.
pub struct Client {
    preprocessors: PreprocessorChain,
    retry: RetryEngine,
    default_scheme: SessionProtocol,
    default_response_timeout: Duration,
    default_write_timeout: Duration,
    max_response_length: Option<u64>,
    request_id_generator: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl Client {
    /// Issues one logical request (which may become several attempts under
    /// retry) against the client's configured endpoint group. `headers` are
    /// the request's own headers (highest precedence); `path` is relative
    /// to the client's configured `base_path`.
    pub async fn execute(&self, method: Method, path: impl Into<String>, headers: HeaderMap, body: ReplayBody) -> crate::error::Result<HttpResponse> {
        let ctx = ClientRequestContext::new(method.clone(), path, self.default_scheme);
        self.dispatch(ctx, method, headers, body).await
    }

    /// Issues one logical request against an ad-hoc endpoint parsed out of
    /// `uri`, bypassing the client's configured endpoint group entirely.
    /// Scheme and authority come from `uri`; anything the preprocessor
    /// chain would otherwise synthesize (event-loop lease, endpoint
    /// remapping) still runs against this pinned endpoint.
    pub async fn execute_uri(&self, method: Method, uri: http::Uri, headers: HeaderMap, body: ReplayBody) -> crate::error::Result<HttpResponse> {
        let scheme = uri
            .scheme_str()
            .and_then(SessionProtocol::parse)
            .ok_or_else(|| Error::invalid_config(format!("absolute URI missing a recognized scheme: {uri}")))?;
        let authority = uri
            .authority()
            .ok_or_else(|| Error::invalid_config(format!("absolute URI missing an authority: {uri}")))?;
        let port = authority.port_u16().unwrap_or(if scheme.is_tls() { 443 } else { 80 });
        let endpoint = Endpoint::new(authority.host(), port)?;
        let path = uri.path_and_query().map(|pq| pq.as_str().to_string()).unwrap_or_else(|| "/".to_string());

        let ctx = ClientRequestContext::new(method.clone(), path, scheme).with_endpoint(endpoint);
        self.dispatch(ctx, method, headers, body).await
    }

    async fn dispatch(&self, mut ctx: ClientRequestContext, method: Method, headers: HeaderMap, body: ReplayBody) -> crate::error::Result<HttpResponse> {
        ctx.set_response_timeout(self.default_response_timeout);
        ctx.set_write_timeout(self.default_write_timeout);
        ctx.max_response_length = self.max_response_length;
        if let Some(generator) = &self.request_id_generator {
            ctx.set_attr("request-id", generator());
        }

        let ctx = self.preprocessors.run(ctx)?;

        let mut parts = http::Request::builder()
            .method(method)
            .uri("/")
            .body(())
            .expect("method/uri are always valid here")
            .into_parts()
            .0;
        parts.headers = headers;

        let request = RetryableRequest::new(parts, body);
        self.retry.execute(ctx, request).await
    }
}

/// The innermost [`HttpClient`]: resolves the endpoint's address, acquires
/// a pooled connection, finalizes headers/authority/path, and dispatches
/// over the wire.
struct NetworkClient {
    resolver: Arc<dyn NameResolver>,
    pool: Arc<ConnectionPool<ClientConnection>>,
    headers: Arc<DefaultHeaders>,
    base_path: String,
    closed: Arc<AtomicBool>,
}

impl HttpClient for NetworkClient {
    fn execute(&self, ctx: Arc<ClientRequestContext>, req: HttpRequest) -> ResponseFuture {
        let resolver = self.resolver.clone();
        let pool = self.pool.clone();
        let headers = self.headers.clone();
        let base_path = self.base_path.clone();
        let closed = self.closed.clone();

        Box::pin(async move {
            if closed.load(Ordering::Acquire) {
                return Err(Error::invalid_config("client factory is closed"));
            }

            let endpoint = ctx
                .endpoint
                .clone()
                .ok_or_else(|| Error::invalid_config("no endpoint selected for request"))?;

            let ip = match endpoint.ip() {
                Some(ip) => ip,
                None => {
                    let ips = resolver.resolve(endpoint.host()).await?;
                    *ips.first().ok_or_else(|| Error::unprocessed(UnprocessedCause::DnsResolutionFailed))?
                }
            };
            let remote = SocketAddr::new(ip, endpoint.port());

            let write_timeout = ctx.write_timeout();
            let acquire = pool.acquire(ctx.session_protocol, remote, endpoint.host());
            let handle = if write_timeout.is_zero() {
                acquire.await?
            } else {
                match tokio::time::timeout(write_timeout, acquire).await {
                    Ok(result) => result?,
                    Err(_) => return Err(Error::unprocessed(UnprocessedCause::ConnectFailed)),
                }
            };

            let (mut parts, body) = req.into_parts();
            let mut merged = build_outbound_headers(&ctx, &parts.headers, &headers);

            let request_authority = parts
                .headers
                .get(http::header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let endpoint_authority = endpoint.authority();
            let authority = resolve_authority(
                ctx.authority.as_deref(),
                request_authority.as_deref(),
                Some(endpoint_authority.as_str()),
            )
            .unwrap_or(endpoint_authority);

            let path = compose_path(&base_path, &ctx.path);
            let uri = http::Uri::builder()
                .scheme(ctx.session_protocol.scheme_str())
                .authority(authority.clone())
                .path_and_query(path)
                .build()
                .map_err(|e| Error::invalid_config(format!("failed to build request URI: {e}")))?;

            let host_value = HeaderValue::from_str(&authority).map_err(|e| Error::invalid_config(format!("invalid authority {authority}: {e}")))?;
            merged.insert(http::header::HOST, host_value);

            parts.uri = uri;
            parts.headers = merged;
            let outgoing = http::Request::from_parts(parts, body);

            let response_timeout = ctx.response_timeout();
            let response = if response_timeout.is_zero() {
                handle.send_request(outgoing).await?
            } else {
                match tokio::time::timeout(response_timeout, handle.send_request(outgoing)).await {
                    Ok(result) => result?,
                    Err(_) => return Err(Error::processed(ProcessedCause::ResponseTimeout)),
                }
            };

            if let Some(max) = ctx.max_response_length {
                let declared = response
                    .headers()
                    .get(http::header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());
                if declared.is_some_and(|len| len > max) {
                    return Err(Error::processed(ProcessedCause::ContentTooLarge));
                }
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{Endpoint, StaticEndpointGroup};

    #[tokio::test]
    async fn factory_without_listening_peer_surfaces_unprocessed_connect_failure() {
        let factory = ClientFactory::builder().build().unwrap();
        let group: Arc<dyn EndpointGroup> = Arc::new(StaticEndpointGroup::of(
            Endpoint::new("127.0.0.1", 1).unwrap().with_ip("127.0.0.1".parse().unwrap()),
        ));
        let options = ClientOptions::builder()
            .session_protocol(SessionProtocol::H1c)
            .endpoint_group(group)
            .retry_config(RetryConfig {
                max_total_attempts: 1,
                endpoint_selection_timeout: Duration::from_millis(100),
            });
        let client = factory.client(options).unwrap();

        let err = client
            .execute(Method::GET, "/", HeaderMap::new(), ReplayBody::Empty)
            .await
            .unwrap_err();
        assert!(err.is_retry_safe());
    }

    #[tokio::test]
    async fn closed_factory_rejects_new_requests() {
        let factory = ClientFactory::builder().build().unwrap();
        let group: Arc<dyn EndpointGroup> = Arc::new(StaticEndpointGroup::of(
            Endpoint::new("127.0.0.1", 1).unwrap().with_ip("127.0.0.1".parse().unwrap()),
        ));
        let options = ClientOptions::builder().session_protocol(SessionProtocol::H1c).endpoint_group(group);
        let client = factory.client(options).unwrap();
        factory.close();

        let err = client
            .execute(Method::GET, "/", HeaderMap::new(), ReplayBody::Empty)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::Kind::InvalidConfig);
    }

    #[test]
    fn client_without_endpoint_group_or_preprocessor_is_rejected() {
        let factory = ClientFactory::builder().build().unwrap();
        let err = factory.client(ClientOptions::builder()).unwrap_err();
        assert_eq!(err.kind(), crate::error::Kind::InvalidConfig);
    }

    #[tokio::test]
    async fn execute_uri_pins_the_endpoint_parsed_from_the_absolute_uri() {
        let factory = ClientFactory::builder().build().unwrap();
        let group: Arc<dyn EndpointGroup> = Arc::new(StaticEndpointGroup::of(Endpoint::new("placeholder.invalid", 1).unwrap()));
        let options = ClientOptions::builder()
            .session_protocol(SessionProtocol::H1c)
            .endpoint_group(group)
            .retry_config(RetryConfig {
                max_total_attempts: 1,
                endpoint_selection_timeout: Duration::from_millis(100),
            });
        let client = factory.client(options).unwrap();

        let uri: http::Uri = "http://127.0.0.1:1/widgets/1".parse().unwrap();
        let err = client
            .execute_uri(Method::GET, uri, HeaderMap::new(), ReplayBody::Empty)
            .await
            .unwrap_err();
        // Connect fails against the pinned loopback address, proving the
        // endpoint group's placeholder host was never consulted.
        assert!(err.is_retry_safe());
    }

    #[tokio::test]
    async fn endpoint_remapper_runs_for_both_selected_and_pinned_endpoints() {
        let factory = ClientFactory::builder().build().unwrap();
        let group: Arc<dyn EndpointGroup> = Arc::new(StaticEndpointGroup::of(Endpoint::new("placeholder.invalid", 1).unwrap()));
        let options = ClientOptions::builder()
            .session_protocol(SessionProtocol::H1c)
            .endpoint_group(group)
            .endpoint_remapper(|_endpoint| Endpoint::new("127.0.0.1", 1).unwrap())
            .retry_config(RetryConfig {
                max_total_attempts: 1,
                endpoint_selection_timeout: Duration::from_millis(100),
            });
        let client = factory.client(options).unwrap();

        let err = client
            .execute(Method::GET, "/", HeaderMap::new(), ReplayBody::Empty)
            .await
            .unwrap_err();
        assert!(err.is_retry_safe());
    }
}
