//! Client library
//!
//! Dialer side of the room protocol: login, chat, list, upload, download.

pub mod connection;
pub mod results;

pub use connection::RoomClient;
pub use results::{DownloadResult, UploadOutcome};
