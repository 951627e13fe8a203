//! Entry point for callers: routes user turns to sessions and runs the
//! agent loop on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use strands_common::SessionId;
use tracing::{debug, info};

use super::types::{lock, BusyGuard, Session};
use crate::agent_loop::{AgentEventStream, AgentLoop};
use crate::error::SessionError;
use crate::token_tracker::TokenTracker;
use crate::{Turn, UserInput};

/// Owns every live session. Sessions are created on first use and run at
/// most one agent loop at a time; different sessions run independently.
pub struct SessionController {
    agent: AgentLoop,
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
}

impl SessionController {
    pub fn new(agent: AgentLoop) -> Self {
        Self {
            agent,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    /// Start processing `input` as the next user turn of session `id`.
    ///
    /// The session is marked busy before this returns, so a second submit
    /// fails with `SessionBusy` until the returned stream has finished or
    /// been dropped.
    pub fn submit(
        &self,
        id: &SessionId,
        input: impl Into<UserInput>,
    ) -> Result<AgentEventStream, SessionError> {
        let guard = self.claim_or_create(id)?;
        debug!(session = %id, "Submitted user turn");
        Ok(self.agent.run(guard, input.into()))
    }

    /// Ask the loop running on `id` to stop at its next checkpoint.
    /// Returns whether anything was running.
    pub fn cancel(&self, id: &SessionId) -> bool {
        let Some(session) = self.get(id) else {
            return false;
        };
        let cancelled = session.request_cancel();
        if cancelled {
            info!(session = %id, "Cancellation requested");
        }
        cancelled
    }

    /// Clear the history of `id`. Usage counters are kept. Resetting a
    /// session that does not exist yet is a no-op.
    pub fn reset(&self, id: &SessionId) -> Result<(), SessionError> {
        let Some(guard) = self.claim_existing(id)? else {
            return Ok(());
        };
        guard.session().clear_history();
        info!(session = %id, "Session history reset");
        Ok(())
    }

    /// Forget session `id` entirely.
    pub fn close(&self, id: &SessionId) -> Result<(), SessionError> {
        let mut sessions = lock(&self.sessions);
        let session = sessions
            .get(id)
            .ok_or_else(|| SessionError::UnknownSession(id.clone()))?;
        if session.is_busy() {
            return Err(SessionError::SessionBusy(id.clone()));
        }
        sessions.remove(id);
        info!(session = %id, "Session closed");
        Ok(())
    }

    pub fn history(&self, id: &SessionId) -> Result<Vec<Turn>, SessionError> {
        Ok(self.require(id)?.snapshot())
    }

    pub fn usage(&self, id: &SessionId) -> Result<TokenTracker, SessionError> {
        Ok(self.require(id)?.tracker())
    }

    pub fn is_busy(&self, id: &SessionId) -> bool {
        self.get(id).is_some_and(|s| s.is_busy())
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        lock(&self.sessions).get(id).cloned()
    }

    fn require(&self, id: &SessionId) -> Result<Arc<Session>, SessionError> {
        self.get(id)
            .ok_or_else(|| SessionError::UnknownSession(id.clone()))
    }

    // Claims happen under the map lock so `close` cannot remove a session
    // between lookup and claim.

    fn claim_or_create(&self, id: &SessionId) -> Result<BusyGuard, SessionError> {
        let mut sessions = lock(&self.sessions);
        let session = sessions.entry(id.clone()).or_insert_with(|| {
            debug!(session = %id, "Creating session");
            Arc::new(Session::new(id.clone()))
        });
        session
            .try_begin()
            .ok_or_else(|| SessionError::SessionBusy(id.clone()))
    }

    fn claim_existing(&self, id: &SessionId) -> Result<Option<BusyGuard>, SessionError> {
        let sessions = lock(&self.sessions);
        let Some(session) = sessions.get(id) else {
            return Ok(None);
        };
        session
            .try_begin()
            .map(Some)
            .ok_or_else(|| SessionError::SessionBusy(id.clone()))
    }
}
