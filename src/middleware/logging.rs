//! Logging middleware
//!
//! Provides request logging functionality.

use log::info;

use crate::protocol::commands::FIELD_SEPARATOR;

/// Log a client connection
pub fn log_connection(client_addr: &str) {
    info!("Client connected: {}", client_addr);
}

/// Log a client command. LOGIN passwords are masked.
pub fn log_command(client: &str, line: &str) {
    info!("Received from {}: {}", client, redact(line));
}

fn redact(line: &str) -> String {
    let mut fields = line.splitn(3, FIELD_SEPARATOR);
    match (fields.next(), fields.next(), fields.next()) {
        (Some("LOGIN"), Some(username), Some(_)) => format!("LOGIN|{username}|****"),
        _ => line.to_string(),
    }
}
