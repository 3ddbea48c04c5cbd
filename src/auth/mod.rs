//! Authentication system
//!
//! Handles credential storage and LOGIN validation.

pub mod credentials;
pub mod validator;

pub use credentials::CredentialStore;
pub use validator::Authenticator;
