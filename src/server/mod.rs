//! Server core functionality
//!
//! The accept loop and the state shared by every connection task.

pub mod context;
pub mod core;

pub use context::ServerContext;
pub use core::Server;
