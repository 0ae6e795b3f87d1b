//! Wire-level protocol engines: connection dialing, H1/H2 framing, and
//! H1C -> H2C negotiation.

mod connection;
mod connector;
mod h1;
mod h2;
mod io;
mod proxy;
mod session;
#[cfg(feature = "_tls-any")]
mod tls;
mod upgrade;

pub use connection::{ClientConnection, ReqBody, RespBody, TcpDialer};
pub use connector::TcpConnector;
pub use h1::{empty_body, full_body, H1Connection, ReqBody as H1ReqBody, RespBody as H1RespBody};
pub use h2::{H2Config, H2Connection, ReqBody as H2ReqBody, RespBody as H2RespBody};
pub use io::BoxedIo;
pub use proxy::{encode_v1_header, ProxyConfig};
pub use session::{NegotiatedProtocol, SessionProtocol};
#[cfg(feature = "_tls-any")]
pub use tls::TlsConnector;
pub use upgrade::{negotiate_h2c, NegotiationOutcome, UpgradeStrategy};
