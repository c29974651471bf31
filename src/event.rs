use serde::{Deserialize, Serialize};

use crate::capabilities::{ContactStoreResult, DeliveryResult, LocationResult, SessionStoreResult};
use crate::model::{AlertId, ContactFields, ContactId, SessionId, UnixTimeMs};

/// App events. Capability responses are boxed to keep the enum small;
/// events that stamp a wall-clock time carry it from the shell, which is
/// the time authority in this architecture.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Startup
    AppStarted,

    // Contacts
    ContactsLoadRequested,
    ContactSaveRequested {
        fields: ContactFields,
    },
    ContactUpdateRequested {
        id: ContactId,
        fields: ContactFields,
    },
    ContactDeleteRequested {
        id: ContactId,
    },
    ContactStoreResponded(Box<ContactStoreResult>),

    // Emergency flow
    EmergencyTriggered,
    CountdownTicked {
        now: UnixTimeMs,
    },
    CountdownCancelled,
    LocationResolved(Box<LocationResult>),
    AlertDeliveryCompleted {
        alert_id: AlertId,
        result: Box<DeliveryResult>,
    },
    DispatchPauseElapsed {
        now: UnixTimeMs,
    },

    // Session lifecycle
    SessionResolveRequested {
        session_id: SessionId,
        notes: Option<String>,
        at: UnixTimeMs,
    },
    SessionCancelRequested {
        session_id: SessionId,
        at: UnixTimeMs,
    },

    // History
    HistoryLoadRequested,
    SessionStoreResponded(Box<SessionStoreResult>),

    // UI chrome
    ErrorDismissed,
    ToastDismissed,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AppStarted => "app_started",
            Self::ContactsLoadRequested => "contacts_load_requested",
            Self::ContactSaveRequested { .. } => "contact_save_requested",
            Self::ContactUpdateRequested { .. } => "contact_update_requested",
            Self::ContactDeleteRequested { .. } => "contact_delete_requested",
            Self::ContactStoreResponded(_) => "contact_store_responded",
            Self::EmergencyTriggered => "emergency_triggered",
            Self::CountdownTicked { .. } => "countdown_ticked",
            Self::CountdownCancelled => "countdown_cancelled",
            Self::LocationResolved(_) => "location_resolved",
            Self::AlertDeliveryCompleted { .. } => "alert_delivery_completed",
            Self::DispatchPauseElapsed { .. } => "dispatch_pause_elapsed",
            Self::SessionResolveRequested { .. } => "session_resolve_requested",
            Self::SessionCancelRequested { .. } => "session_cancel_requested",
            Self::HistoryLoadRequested => "history_load_requested",
            Self::SessionStoreResponded(_) => "session_store_responded",
            Self::ErrorDismissed => "error_dismissed",
            Self::ToastDismissed => "toast_dismissed",
        }
    }
}
