//! Session registry
//!
//! Shared roster of live connections. Each entry owns the sending end of a
//! bounded chat outbox; a per-connection delivery task drains it into the
//! connection's writer, so a peer that stops reading only stalls itself.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::framing::ConnectionWriter;

/// Chat lines buffered per recipient before further lines are dropped
pub const OUTBOX_CAPACITY: usize = 256;

/// Identifier assigned to a connection when it registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct SessionEntry {
    outbox: mpsc::Sender<String>,
    peer: String,
    username: Option<String>,
}

/// Counts from one broadcast.
///
/// `queued` lines are handed to each recipient's delivery task; `dropped`
/// recipients had a full outbox or a closed connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub queued: usize,
    pub dropped: usize,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ConnectionId, SessionEntry>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a freshly accepted connection. It receives chat only after login.
    ///
    /// Spawns the connection's delivery task, which ends once the entry is
    /// unregistered or a write to the peer fails.
    pub async fn register(&self, writer: ConnectionWriter, peer: &str) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (outbox, inbox) = mpsc::channel(OUTBOX_CAPACITY);
        tokio::spawn(deliver(id, inbox, writer));

        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            id,
            SessionEntry {
                outbox,
                peer: peer.to_string(),
                username: None,
            },
        );
        info!(
            "Registered connection {} from {} ({} active)",
            id,
            peer,
            sessions.len()
        );
        id
    }

    /// Binds the authenticated username to a registered connection.
    pub async fn set_username(&self, id: ConnectionId, username: &str) {
        if let Some(entry) = self.sessions.lock().await.get_mut(&id) {
            entry.username = Some(username.to_string());
        }
    }

    /// Removes a connection. Returns whether it was still registered.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.remove(&id) {
            Some(entry) => {
                info!(
                    "Unregistered connection {} ({} from {}), {} active",
                    id,
                    entry.username.as_deref().unwrap_or("anonymous"),
                    entry.peer,
                    sessions.len()
                );
                true
            }
            None => false,
        }
    }

    /// Queues `message` for every logged-in connection except `from`.
    ///
    /// Recipients are snapshotted under the lock. Queueing never waits on a
    /// peer: a full or closed outbox drops the line for that recipient only.
    pub async fn broadcast(&self, from: ConnectionId, message: &str) -> BroadcastReport {
        let recipients: Vec<(ConnectionId, mpsc::Sender<String>)> = {
            let sessions = self.sessions.lock().await;
            sessions
                .iter()
                .filter(|(id, entry)| **id != from && entry.username.is_some())
                .map(|(id, entry)| (*id, entry.outbox.clone()))
                .collect()
        };

        let mut report = BroadcastReport::default();
        for (id, outbox) in recipients {
            match outbox.try_send(message.to_string()) {
                Ok(()) => report.queued += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Connection {} is not reading, dropped chat line", id);
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Connection {} closed before chat could be queued", id);
                    report.dropped += 1;
                }
            }
        }
        debug!("Broadcast from {}: {:?}", from, report);
        report
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Usernames of logged-in connections, sorted.
    pub async fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sessions
            .lock()
            .await
            .values()
            .filter_map(|entry| entry.username.clone())
            .collect();
        names.sort();
        names
    }
}

/// Drains one connection's outbox into its writer.
async fn deliver(id: ConnectionId, mut inbox: mpsc::Receiver<String>, writer: ConnectionWriter) {
    while let Some(line) = inbox.recv().await {
        if let Err(e) = writer.write_command(&line).await {
            warn!("Chat delivery to connection {} failed: {}", id, e);
            return;
        }
    }
    debug!("Delivery task for connection {} finished", id);
}
