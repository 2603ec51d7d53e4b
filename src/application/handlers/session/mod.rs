//! Training session command handlers.

mod close_session;
mod create_session;
mod sweep_expired_sessions;

pub use close_session::{CloseSessionCommand, CloseSessionHandler};
pub use create_session::{CreateSessionCommand, CreateSessionHandler, CreateSessionResult};
pub use sweep_expired_sessions::SweepExpiredSessionsHandler;
