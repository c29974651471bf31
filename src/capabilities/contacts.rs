//! Contact store capability.
//!
//! The shell persists contacts (backend call or local storage); the core
//! only validates drafts and mirrors the stored list in the model. Every
//! operation may fail with a validation or connectivity fault.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Contact, ContactFields, ContactId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum ContactStoreOperation {
    List,
    Add { fields: ContactFields },
    Update { id: ContactId, fields: ContactFields },
    Delete { id: ContactId },
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContactStoreError {
    #[error("contact validation failed: {message}")]
    Validation { message: String },

    #[error("contact {id} not found")]
    NotFound { id: ContactId },

    #[error("contact store unreachable: {message}")]
    Connectivity {
        message: String,
        #[serde(default)]
        is_retryable: bool,
    },

    #[error("contact store failure: {message}")]
    Storage { message: String },
}

impl ContactStoreError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Connectivity { is_retryable, .. } => *is_retryable,
            Self::Validation { .. } | Self::NotFound { .. } | Self::Storage { .. } => false,
        }
    }

    #[must_use]
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity { message: message.into(), is_retryable: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ContactStoreOutput {
    Listed(Vec<Contact>),
    Added(Contact),
    Updated(Contact),
    Deleted { id: ContactId },
}

impl Operation for ContactStoreOperation {
    type Output = ContactStoreResult;
}

pub type ContactStoreResult = Result<ContactStoreOutput, ContactStoreError>;

pub struct ContactStore<Ev> {
    context: CapabilityContext<ContactStoreOperation, Ev>,
}

impl<Ev> Capability<Ev> for ContactStore<Ev> {
    type Operation = ContactStoreOperation;
    type MappedSelf<MappedEv> = ContactStore<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        ContactStore::new(self.context.map_event(f))
    }
}

impl<Ev> ContactStore<Ev>
where
    Ev: Send + 'static,
{
    pub fn new(context: CapabilityContext<ContactStoreOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn list<F>(&self, make_event: F)
    where
        F: FnOnce(ContactStoreResult) -> Ev + Send + 'static,
    {
        self.request(ContactStoreOperation::List, make_event);
    }

    pub fn add<F>(&self, fields: ContactFields, make_event: F)
    where
        F: FnOnce(ContactStoreResult) -> Ev + Send + 'static,
    {
        self.request(ContactStoreOperation::Add { fields }, make_event);
    }

    pub fn update<F>(&self, id: ContactId, fields: ContactFields, make_event: F)
    where
        F: FnOnce(ContactStoreResult) -> Ev + Send + 'static,
    {
        self.request(ContactStoreOperation::Update { id, fields }, make_event);
    }

    pub fn delete<F>(&self, id: ContactId, make_event: F)
    where
        F: FnOnce(ContactStoreResult) -> Ev + Send + 'static,
    {
        self.request(ContactStoreOperation::Delete { id }, make_event);
    }

    fn request<F>(&self, operation: ContactStoreOperation, make_event: F)
    where
        F: FnOnce(ContactStoreResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_faults_are_retryable_by_default() {
        assert!(ContactStoreError::connectivity("offline").is_retryable());
        assert!(!ContactStoreError::Validation { message: "bad phone".into() }.is_retryable());
        assert!(!ContactStoreError::NotFound { id: ContactId::new("c1") }.is_retryable());
    }

    #[test]
    fn operation_round_trips_through_serde() {
        let op = ContactStoreOperation::Update {
            id: ContactId::new("c1"),
            fields: ContactFields {
                name: "Ana".into(),
                phone: "4155551234".into(),
                relationship: Some("sister".into()),
                is_primary: true,
            },
        };
        let json = serde_json::to_string(&op).unwrap();
        let back: ContactStoreOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }
}
