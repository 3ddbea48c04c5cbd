//! Shared server state
//!
//! Everything connection tasks share: configuration, the session registry,
//! the server-side file store, and the authenticator.

use crate::auth::{Authenticator, CredentialStore};
use crate::config::ServerConfig;
use crate::session::SessionRegistry;
use crate::storage::DirectoryStore;

pub struct ServerContext {
    pub config: ServerConfig,
    pub registry: SessionRegistry,
    pub store: DirectoryStore,
    pub authenticator: Box<dyn Authenticator>,
}

impl ServerContext {
    /// Builds a context that authenticates against the configured credentials.
    pub fn new(config: ServerConfig) -> Self {
        let credentials = CredentialStore::new(config.credentials.clone());
        Self::with_authenticator(config, Box::new(credentials))
    }

    pub fn with_authenticator(config: ServerConfig, authenticator: Box<dyn Authenticator>) -> Self {
        Self {
            store: DirectoryStore::new(config.server_root_path()),
            registry: SessionRegistry::new(),
            authenticator,
            config,
        }
    }
}
