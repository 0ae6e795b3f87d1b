//! Connection pooling and lifecycle.

mod key;
mod listener;
mod pool;
mod state;

pub use key::ConnectionKey;
pub use listener::{Attrs, BroadcastListener, ConnectionPoolListener, CountingListener, TracingListener};
pub use pool::{ConnectionPool, DialOutcome, Dialer, PoolConfig, PooledHandle};
pub use state::{ConnectionLifecycle, ConnectionState, IllegalTransition};
