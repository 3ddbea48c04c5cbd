//! RAX Room Server
//!
//! One TCP session per client carries two services: a chat room broadcast
//! and a file store with upload and download. Commands are pipe-delimited
//! lines; file bodies travel as raw bytes whose length is announced first.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod framing;
pub mod middleware;
pub mod protocol;
pub mod server;
pub mod session;
pub mod storage;
pub mod transfer;
pub mod utils;

pub use client::RoomClient;
pub use config::ServerConfig;
pub use server::{Server, ServerContext};
