//! Authentication validator
//!
//! Checks a LOGIN username/password pair against a [`CredentialStore`].

use super::credentials::CredentialStore;
use crate::error::AuthError;

/// Seam through which the session authenticates users.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthError>;
}

/// Performs basic input sanitation to check for malformed usernames/passwords.
fn is_valid_input(input: &str) -> bool {
    !input.is_empty() && !input.contains(['\r', '\n', '\0'])
}

impl Authenticator for CredentialStore {
    fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if !is_valid_input(username) {
            return Err(AuthError::MalformedInput("Invalid username format".into()));
        }
        if !is_valid_input(password) {
            return Err(AuthError::MalformedInput("Invalid password format".into()));
        }

        match self.get(username) {
            Some(stored) if stored == password => Ok(()),
            Some(_) => Err(AuthError::InvalidPassword(username.to_string())),
            None => Err(AuthError::UserNotFound(username.to_string())),
        }
    }
}
