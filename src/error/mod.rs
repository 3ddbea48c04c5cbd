//! Error handling
//!
//! Defines error types and handling for the room server.

pub mod handlers;
pub mod types;

pub use types::*;
