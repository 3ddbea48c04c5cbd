//! File store
//!
//! Flat directory-backed store used by both the server's shared namespace
//! and each client's per-user namespace.

pub mod filesystem;
pub mod validation;

pub use filesystem::{DirectoryStore, FileDescriptor};
pub use validation::validate_file_name;
