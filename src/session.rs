//! Emergency session lifecycle.
//!
//! Single-active-session model: only one emergency can be in flight per
//! user at a time, so the UI contract stays simple. Terminal sessions are
//! appended to an in-memory history list and never deleted; the session
//! history store capability mirrors them for the history screen.

use serde::{Deserialize, Serialize};

use crate::model::{
    Alert, AlertId, Contact, Location, Session, SessionId, SessionStatus, UnixTimeMs, UserId,
};
use crate::{AppError, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("cannot create a session without contacts")]
    EmptyContacts,
    #[error("a session is already active: {0}")]
    AlreadyActive(SessionId),
    #[error("no active session matches id {0}")]
    NotFound(SessionId),
    #[error("session {0} has already been closed")]
    AlreadyTerminal(SessionId),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        let kind = match e {
            SessionError::EmptyContacts => ErrorKind::Validation,
            SessionError::AlreadyActive(_) | SessionError::AlreadyTerminal(_) => {
                ErrorKind::InvalidState
            }
            SessionError::NotFound(_) => ErrorKind::NotFound,
        };
        AppError::new(kind, e.to_string())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionManager {
    active: Option<Session>,
    history: Vec<Session>,
}

impl SessionManager {
    /// Creates a new active session. Rejects an empty contact set and
    /// overlapping emergencies before any state is touched.
    pub fn create(
        &mut self,
        user_id: Option<UserId>,
        contacts: &[Contact],
        location: Option<Location>,
        now: UnixTimeMs,
    ) -> Result<&Session, SessionError> {
        if contacts.is_empty() {
            return Err(SessionError::EmptyContacts);
        }
        if let Some(active) = self.active.as_ref().filter(|s| s.is_active()) {
            return Err(SessionError::AlreadyActive(active.id.clone()));
        }

        let session = Session::new(user_id, contacts.to_vec(), location, now);
        tracing::info!(session_id = %session.id, contacts = contacts.len(), "session created");

        Ok(self.active.insert(session))
    }

    /// Records the dispatcher's output on the owning session.
    pub fn attach_alerts(&mut self, id: &SessionId, alerts: Vec<Alert>) -> Result<(), SessionError> {
        let session = self.active_mut(id)?;
        session.alerts_sent = alerts;
        Ok(())
    }

    /// Applies a per-alert outcome. Unknown alert ids are ignored: a late
    /// receipt for a dropped session must not corrupt the current one.
    pub fn with_alert(&mut self, alert_id: &AlertId, f: impl FnOnce(&mut Alert)) {
        if let Some(session) = self.active.as_mut() {
            if let Some(alert) = session.alert_mut(alert_id) {
                f(alert);
            }
        }
    }

    pub fn resolve(
        &mut self,
        id: &SessionId,
        notes: Option<String>,
        now: UnixTimeMs,
    ) -> Result<&Session, SessionError> {
        {
            let session = self.active_mut(id)?;
            session.status = SessionStatus::Resolved;
            session.resolved_at = Some(now);
            session.notes = notes;
        }
        tracing::info!(session_id = %id, "session resolved");
        self.archive_active();
        self.active.as_ref().ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    pub fn cancel(&mut self, id: &SessionId, now: UnixTimeMs) -> Result<&Session, SessionError> {
        {
            let session = self.active_mut(id)?;
            session.status = SessionStatus::Cancelled;
            session.resolved_at = Some(now);
        }
        tracing::info!(session_id = %id, "session cancelled");
        self.archive_active();
        self.active.as_ref().ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    #[must_use]
    pub fn active(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    /// True only while the current session is in `Active` status. A
    /// resolved or cancelled session stays visible but no longer counts.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(Session::is_active)
    }

    #[must_use]
    pub fn history(&self) -> &[Session] {
        &self.history
    }

    /// Replaces the local history mirror with what the store returned.
    pub fn load_history(&mut self, sessions: Vec<Session>) {
        self.history = sessions;
    }

    fn active_mut(&mut self, id: &SessionId) -> Result<&mut Session, SessionError> {
        let session = self
            .active
            .as_mut()
            .filter(|s| &s.id == id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        if session.status.is_terminal() {
            return Err(SessionError::AlreadyTerminal(id.clone()));
        }
        Ok(session)
    }

    // The closed session stays as "the" session for the UI until the next
    // trigger, and a copy joins the append-only history.
    fn archive_active(&mut self) {
        if let Some(session) = self.active.as_ref() {
            self.history.push(session.clone());
        }
    }
}
