pub mod handler;
pub mod limiter;
pub mod line;
pub mod protocol;
pub mod server;
pub mod shutdown;

pub use handler::{handle_connection, CloseReason, ConnectionContext, Dispatcher};
pub use limiter::{ConnectionLimiter, LimiterConfig};
pub use protocol::{ClientEnvelope, ClientRequest, MobWire, PlayerWire, ServerMessage, WorldWire};
pub use server::serve;
pub use shutdown::{shutdown_channel, ShutdownRx, ShutdownTx};
