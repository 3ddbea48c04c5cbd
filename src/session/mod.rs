//! Connection sessions
//!
//! The shared session registry and the per-connection task.

pub mod handler;
pub mod registry;

pub use handler::handle_connection;
pub use registry::{BroadcastReport, ConnectionId, SessionRegistry};
