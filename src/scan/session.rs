//! Scan session lifecycle, cancellation, and the single-scan guard.
//!
//! A session is created when a scan request is accepted, owns the in-memory
//! accumulation buffer while the scan task runs, and is dropped once
//! persistence completes. There is no process-wide registry of open scans:
//! the engine's single [`ActiveGuard`] slot is the only shared state, and it
//! is released automatically when the scan task finishes, however it
//! finishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::ConcurrencyError;

/// Terminal status of a scan task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    /// Every voxel was captured.
    Completed,
    /// The scan stopped early on an error; the reason is the error text.
    Aborted(String),
    /// The scan stopped early on a cooperative cancellation.
    Cancelled,
}

/// What the caller gets back when a scan task finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Terminal status.
    pub status: ScanStatus,
    /// Number of records successfully persisted, including best-effort
    /// salvage after an abort or cancellation.
    pub persisted: usize,
}

/// Cooperative cancellation signal, checked at voxel boundaries.
///
/// Cancellation never interrupts a motion in progress; the controller
/// notices the flag between voxels, persists what it has, and returns
/// [`ScanStatus::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// In-memory accumulation buffer plus session identity.
#[derive(Debug)]
pub struct ScanSession<R> {
    id: Uuid,
    started_at: DateTime<Utc>,
    records: Vec<R>,
    completed: bool,
}

impl<R> ScanSession<R> {
    /// Open a session with the given identifier.
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            started_at: Utc::now(),
            records: Vec::new(),
            completed: false,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the session was accepted.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Append a captured record. Records are immutable once buffered.
    pub fn push(&mut self, record: R) {
        self.records.push(record);
    }

    /// Records captured so far.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Number of captured records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True while no record has been captured.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mark the acquisition phase finished.
    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    /// Whether the acquisition phase finished.
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

/// Caller-side handle to a running scan task.
#[derive(Debug)]
pub struct ScanHandle {
    session_id: Uuid,
    cancel: CancelToken,
    join: JoinHandle<ScanOutcome>,
}

impl ScanHandle {
    pub(crate) fn new(session_id: Uuid, cancel: CancelToken, join: JoinHandle<ScanOutcome>) -> Self {
        Self {
            session_id,
            cancel,
            join,
        }
    }

    /// Identifier of the session this handle controls.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Request cooperative cancellation; the scan stops at the next voxel
    /// boundary and persists what it captured.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the cancellation token, for callers that need to signal
    /// from somewhere the handle cannot reach.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the scan task and return its outcome.
    pub async fn wait(self) -> ScanOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(err) => ScanOutcome {
                status: ScanStatus::Aborted(format!("scan task failed: {err}")),
                persisted: 0,
            },
        }
    }
}

/// RAII claim on the engine's one scan slot.
///
/// Acquired before a scan task is spawned and moved into the task, so the
/// slot frees exactly when the task finishes, on every path.
pub(crate) struct ActiveGuard {
    flag: Arc<AtomicBool>,
}

impl ActiveGuard {
    pub(crate) fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, ConcurrencyError> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Ok(Self { flag: flag.clone() })
        } else {
            Err(ConcurrencyError::ScanAlreadyRunning)
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_round_trip() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_session_buffer() {
        let mut session: ScanSession<u32> = ScanSession::new(Uuid::new_v4());
        assert!(session.is_empty());
        session.push(7);
        session.push(8);
        assert_eq!(session.records(), &[7, 8]);
        assert!(!session.is_completed());
        session.mark_completed();
        assert!(session.is_completed());
    }

    #[test]
    fn test_active_guard_is_exclusive() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = ActiveGuard::acquire(&flag).expect("first claim");
        assert!(matches!(
            ActiveGuard::acquire(&flag),
            Err(ConcurrencyError::ScanAlreadyRunning)
        ));
        drop(guard);
        assert!(ActiveGuard::acquire(&flag).is_ok());
    }
}
