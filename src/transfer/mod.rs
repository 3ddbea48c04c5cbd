//! File transfer engine
//!
//! Exact-length raw payload streaming for uploads and downloads.

pub mod engine;

pub use engine::{check_declared_length, receive, send};
