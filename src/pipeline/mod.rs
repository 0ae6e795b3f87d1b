//! The request pipeline: preprocessors, decorators, and header/path
//! composition.

mod context;
mod decorator;
mod headers;
mod path;
mod preprocessor;

pub use context::{AdditionalHeaders, ClientRequestContext};
pub use decorator::{DecoratingClientBuilder, HttpClient, HttpRequest, HttpResponse, ResponseFuture};
pub use headers::{build_outbound_headers, resolve_authority, DefaultHeaders, HeaderFn};
pub use path::{compose_path, substitute_params};
pub use preprocessor::{EndpointPreprocessor, EndpointRemapper, Preprocessor, PreprocessorChain};
