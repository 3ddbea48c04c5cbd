//! Per-connection protocol state

/// Upload announced by `UPLOAD_REQUEST` and accepted with `UPLOAD_READY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub filename: String,
    pub length: u64,
}

/// Where a connection is in the login/upload lifecycle.
///
/// The pending upload lives inside `UploadPending`, so a connection holds at
/// most one and loses it on every transition out of that state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProtocolState {
    #[default]
    Unauthenticated,
    Authenticated {
        username: String,
    },
    UploadPending {
        username: String,
        upload: PendingUpload,
    },
    Exited,
}

impl ProtocolState {
    pub fn username(&self) -> Option<&str> {
        match self {
            ProtocolState::Authenticated { username }
            | ProtocolState::UploadPending { username, .. } => Some(username),
            ProtocolState::Unauthenticated | ProtocolState::Exited => None,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, ProtocolState::Unauthenticated)
    }

    /// True only in the plain authenticated state, not while an upload is pending.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, ProtocolState::Authenticated { .. })
    }

    pub fn is_upload_pending(&self) -> bool {
        matches!(self, ProtocolState::UploadPending { .. })
    }

    pub fn pending_upload(&self) -> Option<&PendingUpload> {
        match self {
            ProtocolState::UploadPending { upload, .. } => Some(upload),
            _ => None,
        }
    }

    /// Moves `UploadPending` back to `Authenticated`, handing out the descriptor.
    pub fn take_pending_upload(&mut self) -> Option<PendingUpload> {
        match std::mem::take(self) {
            ProtocolState::UploadPending { username, upload } => {
                *self = ProtocolState::Authenticated { username };
                Some(upload)
            }
            other => {
                *self = other;
                None
            }
        }
    }
}
