//! Session state and concurrency guards.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use strands_common::SessionId;

use crate::conversation::ConversationStore;
use crate::token_tracker::TokenTracker;
use crate::{TokenUsage, Turn};

const BUSY: u8 = 0b01;
const CANCELLED: u8 = 0b10;

/// One conversation: its history, usage, and the busy/cancel flags that
/// keep a single agent loop running on it at a time.
///
/// Locks are only held for the duration of a single read or write and
/// never across an await point.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    store: Mutex<ConversationStore>,
    tracker: Mutex<TokenTracker>,
    /// `BUSY` and `CANCELLED` bits. `CANCELLED` is only ever set while
    /// `BUSY` is, and both clear together.
    run_state: AtomicU8,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            store: Mutex::new(ConversationStore::new()),
            tracker: Mutex::new(TokenTracker::new()),
            run_state: AtomicU8::new(0),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Claim the session for one agent loop. Returns `None` if a loop is
    /// already running. A claim always starts uncancelled.
    pub fn try_begin(self: &Arc<Self>) -> Option<BusyGuard> {
        BusyGuard::acquire(Arc::clone(self))
    }

    pub fn is_busy(&self) -> bool {
        self.run_state.load(Ordering::Acquire) & BUSY != 0
    }

    /// Ask the running loop to stop. Returns whether a loop was running.
    pub fn request_cancel(&self) -> bool {
        self.run_state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state & BUSY != 0).then_some(state | CANCELLED)
            })
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.run_state.load(Ordering::Acquire) & CANCELLED != 0
    }

    pub fn snapshot(&self) -> Vec<Turn> {
        lock(&self.store).snapshot()
    }

    pub fn len(&self) -> usize {
        lock(&self.store).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.store).is_empty()
    }

    pub(crate) fn append(&self, turn: Turn) {
        lock(&self.store).append(turn);
    }

    pub(crate) fn append_batch(&self, turns: Vec<Turn>) {
        lock(&self.store).append_batch(turns);
    }

    pub(crate) fn clear_history(&self) {
        lock(&self.store).reset();
    }

    pub(crate) fn record_usage(&self, model: &str, usage: &TokenUsage) {
        lock(&self.tracker).record(model, usage);
    }

    pub fn usage(&self) -> TokenUsage {
        lock(&self.tracker).total().clone()
    }

    pub fn tracker(&self) -> TokenTracker {
        lock(&self.tracker).clone()
    }
}

/// Holds a session's busy flag; clears it on drop, so the slot is released
/// when the loop finishes, fails, or its stream is dropped early.
#[derive(Debug)]
pub struct BusyGuard {
    session: Arc<Session>,
}

impl BusyGuard {
    fn acquire(session: Arc<Session>) -> Option<Self> {
        session
            .run_state
            .compare_exchange(0, BUSY, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self { session })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.session.run_state.store(0, Ordering::Release);
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
