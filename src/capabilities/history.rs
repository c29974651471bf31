//! Session history store capability.
//!
//! Sessions are append-only: the core persists a snapshot at creation and
//! again at each terminal transition, and reads the list back for the
//! history screen. The storage schema behind this is a shell concern.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Session, SessionId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum SessionStoreOperation {
    Persist { session: Box<Session> },
    List { limit: usize },
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionStoreError {
    #[error("session store unreachable: {message}")]
    Connectivity {
        message: String,
        #[serde(default)]
        is_retryable: bool,
    },

    #[error("session store failure: {message}")]
    Storage { message: String },
}

impl SessionStoreError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Connectivity { is_retryable, .. } => *is_retryable,
            Self::Storage { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionStoreOutput {
    Persisted { id: SessionId },
    Sessions(Vec<Session>),
}

impl Operation for SessionStoreOperation {
    type Output = SessionStoreResult;
}

pub type SessionStoreResult = Result<SessionStoreOutput, SessionStoreError>;

pub struct SessionStore<Ev> {
    context: CapabilityContext<SessionStoreOperation, Ev>,
}

impl<Ev> Capability<Ev> for SessionStore<Ev> {
    type Operation = SessionStoreOperation;
    type MappedSelf<MappedEv> = SessionStore<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        SessionStore::new(self.context.map_event(f))
    }
}

impl<Ev> SessionStore<Ev>
where
    Ev: Send + 'static,
{
    pub fn new(context: CapabilityContext<SessionStoreOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn persist<F>(&self, session: Session, make_event: F)
    where
        F: FnOnce(SessionStoreResult) -> Ev + Send + 'static,
    {
        self.request(SessionStoreOperation::Persist { session: Box::new(session) }, make_event);
    }

    pub fn list<F>(&self, limit: usize, make_event: F)
    where
        F: FnOnce(SessionStoreResult) -> Ev + Send + 'static,
    {
        self.request(SessionStoreOperation::List { limit }, make_event);
    }

    fn request<F>(&self, operation: SessionStoreOperation, make_event: F)
    where
        F: FnOnce(SessionStoreResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(result));
        });
    }
}
