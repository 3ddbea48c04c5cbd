//! Room protocol implementation
//!
//! Command parsing, response formatting, and the per-connection state machine.

pub mod commands;
pub mod handlers;
pub mod responses;
pub mod state;

pub use commands::{Command, parse_command};
pub use handlers::{CommandStatus, ProtocolHandler};
pub use responses::Response;
pub use state::{PendingUpload, ProtocolState};
