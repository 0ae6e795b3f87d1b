//! The decorator capability model.
//!
//! An `HttpClient` is any type wrapping a delegate and forwarding
//! `execute`. Decorators nest the way `tower::Layer`/`Service` pairs do:
//! each layer wraps the one inside it, added via
//! `DecoratingClientBuilder::decorator`.

use super::context::ClientRequestContext;
use crate::protocol::{ReqBody, RespBody};
use crate::util::BoxFuture;
use std::sync::Arc;

pub type HttpRequest = http::Request<ReqBody>;
pub type HttpResponse = http::Response<RespBody>;
pub type ResponseFuture = BoxFuture<'static, crate::error::Result<HttpResponse>>;

/// An HTTP-level decorator or the network client itself. WebClient forbids
/// RPC-level decorators; since this core never models an RPC layer,
/// that restriction holds trivially — every decorator in this crate is
/// `HttpClient`.
pub trait HttpClient: Send + Sync {
    fn execute(&self, ctx: Arc<ClientRequestContext>, req: HttpRequest) -> ResponseFuture;
}

impl<F> HttpClient for F
where
    F: Fn(Arc<ClientRequestContext>, HttpRequest) -> ResponseFuture + Send + Sync,
{
    fn execute(&self, ctx: Arc<ClientRequestContext>, req: HttpRequest) -> ResponseFuture {
        self(ctx, req)
    }
}

type LayerFn = Box<dyn Fn(Arc<dyn HttpClient>) -> Arc<dyn HttpClient> + Send + Sync>;

/// Builds a decorator chain in insertion order: the first decorator added
/// is innermost (closest to the network), matching `ServiceBuilder`'s
/// left-to-right `layer_fn` semantics.
#[derive(Default)]
pub struct DecoratingClientBuilder {
    layers: Vec<LayerFn>,
}

impl DecoratingClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a layer; functions the same way `ServiceBuilder::layer_fn`
    /// does for a `tower::Service` stack.
    pub fn decorator<F>(mut self, layer: F) -> Self
    where
        F: Fn(Arc<dyn HttpClient>) -> Arc<dyn HttpClient> + Send + Sync + 'static,
    {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn build(self, network: Arc<dyn HttpClient>) -> Arc<dyn HttpClient> {
        self.layers.into_iter().fold(network, |client, layer| layer(client))
    }
}
