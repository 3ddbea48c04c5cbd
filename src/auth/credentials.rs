//! Credential storage
//!
//! Holds the username/password table consulted by LOGIN.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Built-in accounts used when the configuration does not supply any
static DEFAULT_CREDENTIALS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        let mut creds = HashMap::new();
        creds.insert("user1", "1234");
        creds.insert("user2", "1234");
        creds.insert("user3", "1234");
        creds.insert("user4", "1234");
        creds.insert("user5", "1234");
        creds
    });

/// Owned copy of the built-in accounts, used as the serde default.
pub fn default_credentials() -> HashMap<String, String> {
    DEFAULT_CREDENTIALS
        .iter()
        .map(|(user, pass)| (user.to_string(), pass.to_string()))
        .collect()
}

/// In-memory credential store compared by exact string equality.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(credentials: HashMap<String, String>) -> Self {
        Self { credentials }
    }

    pub fn get(&self, username: &str) -> Option<&str> {
        self.credentials.get(username).map(String::as_str)
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(default_credentials())
    }
}
