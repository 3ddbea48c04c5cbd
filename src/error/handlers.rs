//! Error handlers
//!
//! Maps errors to the wire replies a peer receives and logs server errors.

use crate::error::types::{ServerError, StorageError};
use crate::protocol::Response;
use log::error;

/// Handle a room server error
pub fn handle_error(err: &ServerError) {
    error!("Room Server Error: {}", err);
}

/// Reply sent when an upload request or completed upload hits a store error
pub fn upload_error_response(err: &StorageError) -> Response {
    match err {
        StorageError::FileAlreadyExists(_) => Response::UploadDenied("File already exists.".into()),
        StorageError::InvalidFileName(_) => Response::UploadDenied("Invalid file name.".into()),
        _ => Response::Error("Failed to receive file.".into()),
    }
}

/// Reply sent when LIST cannot enumerate the store
pub fn list_error_response(err: &StorageError) -> Response {
    match err {
        StorageError::DirectoryNotFound(_) => Response::Error("Server directory not found.".into()),
        _ => Response::Error("Unable to retrieve file list.".into()),
    }
}

/// Reply sent when DOWNLOAD cannot read the requested file
pub fn download_error_response(err: &StorageError) -> Response {
    match err {
        StorageError::FileNotFound(_) | StorageError::InvalidFileName(_) => {
            Response::Error("File not found.".into())
        }
        _ => Response::Error("Failed to send file.".into()),
    }
}
