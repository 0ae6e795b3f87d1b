//! The preprocessor chain: runs before decorators and may synthesize
//! scheme/endpoint/event-loop, mirroring `HttpPreprocessor.of(protocol,
//! endpoint, eventLoop?)`.

use super::context::ClientRequestContext;
use crate::endpoint::{Endpoint, EndpointGroup, SelectionStrategy};
use crate::error::{Error, UnprocessedCause};
use crate::protocol::SessionProtocol;
use crate::scheduler::EventLoopScheduler;
use std::sync::Arc;

/// Rewrites an endpoint after it has been determined, regardless of whether
/// it came from group selection or was pinned by a per-request override.
pub type EndpointRemapper = Arc<dyn Fn(Endpoint) -> Endpoint + Send + Sync>;

pub trait Preprocessor: Send + Sync {
    fn process(&self, ctx: ClientRequestContext) -> crate::error::Result<ClientRequestContext>;
}

/// Runs each stage in order, threading the (owned) context through.
#[derive(Default)]
pub struct PreprocessorChain {
    stages: Vec<Arc<dyn Preprocessor>>,
}

impl PreprocessorChain {
    pub fn new(stages: Vec<Arc<dyn Preprocessor>>) -> Self {
        Self { stages }
    }

    pub fn run(&self, mut ctx: ClientRequestContext) -> crate::error::Result<ClientRequestContext> {
        for stage in &self.stages {
            ctx = stage.process(ctx)?;
        }
        Ok(ctx)
    }
}

/// Selects an endpoint from `group` and acquires an event-loop lease for
/// it, synthesizing the fields a bare request (no base URI, no explicit
/// endpoint) would otherwise be missing. When the context already carries
/// an endpoint on entry (pinned by a per-request absolute-URI override),
/// group selection is skipped and the caller's own `session_protocol` is
/// preserved, but a remapper and an event-loop lease are still applied so
/// pinned requests go through the same lease accounting as selected ones.
pub struct EndpointPreprocessor {
    protocol: SessionProtocol,
    group: Arc<dyn EndpointGroup>,
    strategy: SelectionStrategy,
    scheduler: Arc<EventLoopScheduler>,
    remapper: Option<EndpointRemapper>,
}

impl EndpointPreprocessor {
    pub fn new(protocol: SessionProtocol, group: Arc<dyn EndpointGroup>, strategy: SelectionStrategy, scheduler: Arc<EventLoopScheduler>) -> Self {
        Self {
            protocol,
            group,
            strategy,
            scheduler,
            remapper: None,
        }
    }

    pub fn with_remapper(mut self, remapper: EndpointRemapper) -> Self {
        self.remapper = Some(remapper);
        self
    }
}

impl Preprocessor for EndpointPreprocessor {
    fn process(&self, mut ctx: ClientRequestContext) -> crate::error::Result<ClientRequestContext> {
        let pinned = ctx.endpoint.take();
        let (protocol, mut endpoint) = match pinned {
            Some(endpoint) => (ctx.session_protocol, endpoint),
            None => {
                let snapshot = self.group.endpoints();
                if snapshot.is_empty() {
                    return Err(Error::unprocessed(UnprocessedCause::EmptyEndpointGroup));
                }
                let endpoint = self.strategy.select(&snapshot, None).clone();
                (self.protocol, endpoint)
            }
        };

        if let Some(remap) = &self.remapper {
            endpoint = remap(endpoint);
        }

        let lease = self.scheduler.acquire(protocol.scheme_str(), Some(endpoint.host()));

        ctx.session_protocol = protocol;
        ctx.endpoint = Some(endpoint);
        ctx.event_loop = Some(lease);
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{Endpoint, StaticEndpointGroup};

    #[test]
    fn empty_group_surfaces_as_unprocessed() {
        let group: Arc<dyn EndpointGroup> = Arc::new(StaticEndpointGroup::new(vec![]));
        let scheduler = Arc::new(EventLoopScheduler::new(2));
        let pre = EndpointPreprocessor::new(SessionProtocol::Https, group, SelectionStrategy::round_robin(), scheduler);

        let ctx = ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https);
        let err = pre.process(ctx).unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::error::Kind::UnprocessedRequest(UnprocessedCause::EmptyEndpointGroup)
        ));
    }

    #[test]
    fn non_empty_group_synthesizes_endpoint_and_event_loop() {
        let group: Arc<dyn EndpointGroup> = Arc::new(StaticEndpointGroup::of(Endpoint::new("example.com", 443).unwrap()));
        let scheduler = Arc::new(EventLoopScheduler::new(2));
        let pre = EndpointPreprocessor::new(SessionProtocol::Https, group, SelectionStrategy::round_robin(), scheduler);

        let ctx = ClientRequestContext::new(http::Method::GET, "/", SessionProtocol::Https);
        let ctx = pre.process(ctx).unwrap();
        assert_eq!(ctx.endpoint.unwrap().host(), "example.com");
        assert!(ctx.event_loop.is_some());
    }
}
