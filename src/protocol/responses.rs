//! Server responses
//!
//! Lines the server writes back to clients, and the parser the client
//! library uses to read them.

use std::fmt;

use crate::protocol::commands::FIELD_SEPARATOR;

/// Separator between names in a `FILE_LIST` response
pub const LIST_SEPARATOR: &str = ",";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    LoginSuccess,
    LoginFailed,
    /// Chat line relayed from another connection, already prefixed with the sender
    Chat(String),
    UploadReady,
    UploadDenied(String),
    UploadSuccess(String),
    FileList(Vec<String>),
    FileInfo { filename: String, length: u64 },
    Error(String),
}

impl Response {
    /// Builds the relayed chat line `<username>: <text>`.
    pub fn chat_from(username: &str, text: &str) -> Self {
        Response::Chat(format!("{username}: {text}"))
    }

    pub fn unknown_command(line: &str) -> Self {
        Response::Error(format!("Unknown command: {line}"))
    }

    /// Parses a server line. Returns `None` for lines this protocol does not define.
    pub fn parse(raw: &str) -> Option<Self> {
        let line = raw.trim_end_matches(['\r', '\n']);
        let (name, rest) = match line.split_once(FIELD_SEPARATOR) {
            Some((name, rest)) => (name, Some(rest)),
            None => (line, None),
        };

        match (name, rest) {
            ("LOGIN-SUCCESS", _) => Some(Response::LoginSuccess),
            ("LOGIN-FAILED", _) => Some(Response::LoginFailed),
            ("CHAT", Some(text)) => Some(Response::Chat(text.to_string())),
            ("UPLOAD_READY", _) => Some(Response::UploadReady),
            ("UPLOAD_DENIED", Some(reason)) => Some(Response::UploadDenied(reason.to_string())),
            ("UPLOAD_SUCCESS", Some(name)) => Some(Response::UploadSuccess(name.to_string())),
            ("FILE_LIST", Some(names)) => Some(Response::FileList(
                names
                    .split(LIST_SEPARATOR)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            ("FILE_INFO", Some(rest)) => {
                let (filename, length) = rest.rsplit_once(FIELD_SEPARATOR)?;
                Some(Response::FileInfo {
                    filename: filename.to_string(),
                    length: length.parse().ok()?,
                })
            }
            ("ERROR", Some(message)) => Some(Response::Error(message.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::LoginSuccess => f.write_str("LOGIN-SUCCESS"),
            Response::LoginFailed => f.write_str("LOGIN-FAILED"),
            Response::Chat(text) => write!(f, "CHAT|{text}"),
            Response::UploadReady => f.write_str("UPLOAD_READY"),
            Response::UploadDenied(reason) => write!(f, "UPLOAD_DENIED|{reason}"),
            Response::UploadSuccess(name) => write!(f, "UPLOAD_SUCCESS|{name}"),
            Response::FileList(names) => {
                write!(f, "FILE_LIST|{}", names.join(LIST_SEPARATOR))
            }
            Response::FileInfo { filename, length } => write!(f, "FILE_INFO|{filename}|{length}"),
            Response::Error(message) => write!(f, "ERROR|{message}"),
        }
    }
}
