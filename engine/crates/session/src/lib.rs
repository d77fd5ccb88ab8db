use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Lines a session may have queued before it counts as stalled.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Per-session write channel (handler / simulation loop -> session writer task).
pub type SessionWriteTx = mpsc::Sender<String>;
pub type SessionWriteRx = mpsc::Receiver<String>;

/// Why a line could not be queued for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The writer task is gone; nothing sent will be delivered.
    #[error("session {0} is closed")]
    Closed(SessionId),

    /// The client stopped reading and its queue is full.
    #[error("session {0} is not draining its output")]
    Stalled(SessionId),
}

/// Handle to one connected client.
///
/// Every line for the client goes through a single channel drained by one
/// writer task, so writes to the same connection never interleave and are
/// delivered in send order.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    write_tx: SessionWriteTx,
}

impl SessionHandle {
    pub fn new(id: SessionId, write_tx: SessionWriteTx) -> Self {
        Self { id, write_tx }
    }

    /// Create a handle together with the receiving end for its writer task.
    pub fn channel(id: SessionId) -> (Self, SessionWriteRx) {
        Self::with_capacity(id, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(id: SessionId, capacity: usize) -> (Self, SessionWriteRx) {
        let (write_tx, write_rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, write_tx), write_rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queue one line for the client without waiting. Fails once the
    /// writer task has exited or the queue is full.
    pub fn send(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.write_tx.try_send(line.into()).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Stalled(self.id),
            TrySendError::Closed(_) => SendError::Closed(self.id),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.write_tx.is_closed()
    }
}

/// Outcome of one [`SessionRegistry::broadcast`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions the message was queued for.
    pub delivered: usize,
    /// Sessions that were closed or stalled; they have been unregistered.
    pub dropped: Vec<SessionId>,
}

/// Live sessions of one server instance.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<SessionId, SessionHandle>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session id.
    pub fn next_session_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn register(&self, handle: SessionHandle) {
        tracing::debug!(session_id = %handle.id(), "session registered");
        self.sessions.write().insert(handle.id(), handle);
    }

    pub fn unregister(&self, id: SessionId) -> Option<SessionHandle> {
        let removed = self.sessions.write().remove(&id);
        if removed.is_some() {
            tracing::debug!(session_id = %id, "session unregistered");
        }
        removed
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Queue `line` for every registered session.
    ///
    /// The set is held in read mode while sending; sessions whose send
    /// failed are unregistered only after the read guard is released. A
    /// failed session is never retried. A session whose queue is full is
    /// dropped the same way as a closed one, so a client that stops reading
    /// cannot grow the server's memory.
    pub fn broadcast(&self, line: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        {
            let sessions = self.sessions.read();
            for (id, handle) in sessions.iter() {
                match handle.send(line) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        tracing::debug!(error = %e, "broadcast failed, dropping session");
                        report.dropped.push(*id);
                    }
                }
            }
        }

        for id in &report.dropped {
            self.unregister(*id);
        }
        report
    }
}
