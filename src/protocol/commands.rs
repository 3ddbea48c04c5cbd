//! Module `commands`
//!
//! Parses pipe-delimited command lines sent by clients and renders them
//! back to wire form for the client library.

use std::fmt;

/// Field separator on the wire
pub const FIELD_SEPARATOR: char = '|';

/// A command parsed from one client line.
///
/// Command names are matched case-sensitively. Lines that do not carry the
/// fields a command needs, or whose numeric fields do not parse, become
/// `Unknown` with the original line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: String, password: String },
    Chat(String),
    UploadRequest { filename: String, length: u64 },
    UploadStart,
    UploadFailed(String),
    List,
    Download(String),
    Exit,
    Unknown(String),
}

impl Command {
    /// Wire name of the command, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login { .. } => "LOGIN",
            Command::Chat(_) => "CHAT",
            Command::UploadRequest { .. } => "UPLOAD_REQUEST",
            Command::UploadStart => "UPLOAD_START",
            Command::UploadFailed(_) => "UPLOAD_FAILED",
            Command::List => "LIST",
            Command::Download(_) => "DOWNLOAD",
            Command::Exit => "EXIT",
            Command::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Parses a raw command line (newline already stripped) into a `Command`.
pub fn parse_command(raw: &str) -> Command {
    let line = raw.trim_end_matches(['\r', '\n']);
    let (name, rest) = match line.split_once(FIELD_SEPARATOR) {
        Some((name, rest)) => (name, Some(rest)),
        None => (line, None),
    };

    let unknown = || Command::Unknown(line.to_string());

    // Trailing fields beyond the ones a command uses are ignored
    let mut fields = rest.map(|rest| rest.split(FIELD_SEPARATOR));
    let mut next_field = || fields.as_mut().and_then(Iterator::next);

    match (name, rest) {
        ("LOGIN", Some(_)) => match (next_field(), next_field()) {
            (Some(username), Some(password)) => Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            },
            _ => unknown(),
        },
        // Chat text is everything after the first separator, pipes included
        ("CHAT", Some(text)) => Command::Chat(text.to_string()),
        ("UPLOAD_REQUEST", Some(_)) => match (next_field(), next_field()) {
            (Some(filename), Some(length)) => match length.parse::<u64>() {
                Ok(length) => Command::UploadRequest {
                    filename: filename.to_string(),
                    length,
                },
                Err(_) => unknown(),
            },
            _ => unknown(),
        },
        ("UPLOAD_START", _) => Command::UploadStart,
        ("UPLOAD_FAILED", Some(_)) => match next_field() {
            Some(filename) => Command::UploadFailed(filename.to_string()),
            None => unknown(),
        },
        ("LIST", _) => Command::List,
        ("DOWNLOAD", Some(_)) => match next_field() {
            Some(filename) => Command::Download(filename.to_string()),
            None => unknown(),
        },
        ("EXIT", _) => Command::Exit,
        _ => unknown(),
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Login { username, password } => write!(f, "LOGIN|{username}|{password}"),
            Command::Chat(text) => write!(f, "CHAT|{text}"),
            Command::UploadRequest { filename, length } => {
                write!(f, "UPLOAD_REQUEST|{filename}|{length}")
            }
            Command::UploadStart => f.write_str("UPLOAD_START"),
            Command::UploadFailed(filename) => write!(f, "UPLOAD_FAILED|{filename}"),
            Command::List => f.write_str("LIST"),
            Command::Download(filename) => write!(f, "DOWNLOAD|{filename}"),
            Command::Exit => f.write_str("EXIT"),
            Command::Unknown(line) => f.write_str(line),
        }
    }
}
