#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod countdown;
pub mod dispatch;
pub mod event;
pub mod model;
pub mod session;

use serde::{Deserialize, Serialize};

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use event::Event;
pub use model::Model;

/// Seconds between pressing the emergency button and dispatch. The window
/// exists so an accidental press can be cancelled.
pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 3;
pub const COUNTDOWN_TICK_MS: u64 = 1000;
pub const MAX_CONTACTS: usize = 3;
pub const LOCATION_TIMEOUT_MS: u64 = 10_000;
pub const LOCATION_MAX_AGE_MS: u64 = 60_000;
pub const MAX_NOTES_LEN: usize = 2048;
pub const HISTORY_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvalidState,
    Network,
    Timeout,
    Storage,
    Location,
    LocationPermissionDenied,
    Delivery,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidState => "INVALID_STATE",
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Storage => "STORAGE_ERROR",
            Self::Location => "LOCATION_ERROR",
            Self::LocationPermissionDenied => "LOCATION_PERMISSION_DENIED",
            Self::Delivery => "DELIVERY_ERROR",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::Storage | Self::Location | Self::Delivery => {
                ErrorSeverity::Transient
            }
            Self::Validation
            | Self::NotFound
            | Self::InvalidState
            | Self::LocationPermissionDenied
            | Self::Unknown => ErrorSeverity::Permanent,
            Self::Internal => ErrorSeverity::Fatal,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::Storage | Self::Location | Self::Delivery
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            // These carry text written for the user already.
            ErrorKind::Validation
            | ErrorKind::InvalidState
            | ErrorKind::Location
            | ErrorKind::LocationPermissionDenied
            | ErrorKind::Delivery => self.message.clone(),
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Storage => {
                "Unable to save data locally. Please free up some storage space.".into()
            }
            ErrorKind::Internal | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again or contact support.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

impl From<model::ValidationError> for AppError {
    fn from(e: model::ValidationError) -> Self {
        Self::new(ErrorKind::Validation, e.to_string())
    }
}

impl From<capabilities::ContactStoreError> for AppError {
    fn from(e: capabilities::ContactStoreError) -> Self {
        let kind = match &e {
            capabilities::ContactStoreError::Validation { .. } => ErrorKind::Validation,
            capabilities::ContactStoreError::NotFound { .. } => ErrorKind::NotFound,
            capabilities::ContactStoreError::Connectivity { .. } => ErrorKind::Network,
            capabilities::ContactStoreError::Storage { .. } => ErrorKind::Storage,
        };
        Self::new(kind, e.to_string())
    }
}

// --- View model ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ContactView {
    pub id: String,
    pub name: String,
    pub phone_display: String,
    pub relationship: Option<String>,
    pub is_primary: bool,
}

impl From<&model::Contact> for ContactView {
    fn from(c: &model::Contact) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name.clone(),
            phone_display: model::format_phone_number(&c.phone),
            relationship: c.relationship.clone(),
            is_primary: c.is_primary,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LocationView {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AlertView {
    pub alert_id: String,
    pub contact_id: String,
    pub contact_name: String,
    pub channel: model::AlertChannel,
    pub status: model::AlertStatus,
    pub error_message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionView {
    pub id: String,
    pub status: model::SessionStatus,
    pub triggered_at_ms: u64,
    pub location: Option<LocationView>,
    pub alerts: Vec<AlertView>,
    pub resolved_at_ms: Option<u64>,
    pub notes: Option<String>,
}

impl From<&model::Session> for SessionView {
    fn from(s: &model::Session) -> Self {
        let alerts = s
            .alerts_sent
            .iter()
            .map(|a| AlertView {
                alert_id: a.id.to_string(),
                contact_id: a.contact_id.to_string(),
                contact_name: s
                    .contacts_alerted
                    .iter()
                    .find(|c| c.id == a.contact_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                channel: a.channel,
                status: a.status,
                error_message: a.error_message.clone(),
            })
            .collect();

        Self {
            id: s.id.to_string(),
            status: s.status,
            triggered_at_ms: s.triggered_at.0,
            location: s.location.as_ref().map(|loc| LocationView {
                latitude: loc.coordinate.lat(),
                longitude: loc.coordinate.lng(),
                accuracy_m: loc.accuracy_m,
            }),
            alerts,
            resolved_at_ms: s.resolved_at.map(|t| t.0),
            notes: s.notes.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionSummaryView {
    pub id: String,
    pub status: model::SessionStatus,
    pub triggered_at_ms: u64,
    pub resolved_at_ms: Option<u64>,
    pub contacts_alerted: usize,
    pub alerts_failed: usize,
}

impl From<&model::Session> for SessionSummaryView {
    fn from(s: &model::Session) -> Self {
        Self {
            id: s.id.to_string(),
            status: s.status,
            triggered_at_ms: s.triggered_at.0,
            resolved_at_ms: s.resolved_at.map(|t| t.0),
            contacts_alerted: s.contacts_alerted.len(),
            alerts_failed: s
                .alerts_sent
                .iter()
                .filter(|a| a.status == model::AlertStatus::Failed)
                .count(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: model::ToastKind,
    pub duration_ms: u64,
}

impl From<&model::ToastMessage> for ToastView {
    fn from(t: &model::ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    /// No emergency in flight. `can_trigger` is false until at least one
    /// contact exists.
    Idle { can_trigger: bool },
    CountingDown { remaining_seconds: u32 },
    /// Between countdown completion and the last delivery outcome: the
    /// location fix and the per-contact sends are still in progress.
    Dispatching { sent: usize, failed: usize, total: usize },
    ActiveEmergency { session: SessionView },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub state: ViewState,
    pub contacts: Vec<ContactView>,
    pub history: Vec<SessionSummaryView>,
    pub error: Option<UserFacingError>,
    pub toast: Option<ToastView>,
    pub is_loading: bool,
}

pub mod app {
    use super::{
        AppError, Capabilities, ErrorKind, Event, Model, SessionSummaryView, SessionView,
        UserFacingError, ViewModel, ViewState, COUNTDOWN_TICK_MS, DEFAULT_COUNTDOWN_SECONDS,
        HISTORY_PAGE_SIZE, MAX_NOTES_LEN,
    };
    use crate::capabilities::{ContactStoreOutput, LocationOptions, SessionStoreOutput};
    use crate::countdown::Tick;
    use crate::dispatch;
    use crate::model::{AlertStatus, DispatchProgress, ToastMessage};

    #[derive(Default)]
    pub struct App;

    impl App {
        fn request_contacts(caps: &Capabilities) {
            caps.contacts
                .list(|result| Event::ContactStoreResponded(Box::new(result)));
        }

        fn request_history(caps: &Capabilities) {
            caps.history.list(HISTORY_PAGE_SIZE, |result| {
                Event::SessionStoreResponded(Box::new(result))
            });
        }

        fn persist_active(model: &Model, caps: &Capabilities) {
            if let Some(session) = model.sessions.active() {
                caps.history.persist(session.clone(), |result| {
                    Event::SessionStoreResponded(Box::new(result))
                });
            }
        }

        /// Issues the delivery request for the alert under the dispatch
        /// cursor. Does nothing when the queue is exhausted.
        fn send_current(model: &Model, caps: &Capabilities) {
            let Some(alert_id) = model.dispatch.current() else { return };
            let Some(session) = model.sessions.active() else { return };
            let Some(alert) = session.alert(alert_id) else { return };

            let destination = session
                .contacts_alerted
                .iter()
                .find(|c| c.id == alert.contact_id)
                .map(|c| c.phone.clone())
                .unwrap_or_default();

            tracing::debug!(alert_id = %alert.id, contact_id = %alert.contact_id, "dispatching alert");

            let event_alert_id = alert.id.clone();
            caps.delivery.send(alert, destination, move |result| {
                Event::AlertDeliveryCompleted {
                    alert_id: event_alert_id,
                    result: Box::new(result),
                }
            });
        }

        fn finish_dispatch(model: &mut Model, caps: &Capabilities) {
            model.dispatch.finish();

            if let Some(session) = model.sessions.active() {
                let total = session.alerts_sent.len();
                let reached = session
                    .alerts_sent
                    .iter()
                    .filter(|a| a.status != AlertStatus::Failed)
                    .count();
                tracing::info!(session_id = %session.id, reached, total, "alert dispatch complete");

                let summary = format!("Emergency alerts sent to {reached} of {total} contacts.");
                let toast = if reached == total {
                    ToastMessage::success(summary)
                } else {
                    ToastMessage::warning(summary)
                };
                Self::persist_active(model, caps);
                model.set_toast(toast);
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            tracing::debug!(event = event.name(), "update");

            match event {
                Event::AppStarted => {
                    model.is_loading = true;
                    Self::request_contacts(caps);
                    Self::request_history(caps);
                    caps.render.render();
                }

                Event::ContactsLoadRequested => {
                    model.is_loading = true;
                    Self::request_contacts(caps);
                    caps.render.render();
                }

                Event::ContactSaveRequested { fields } => {
                    match fields.validate(&model.contacts, None) {
                        Ok(()) => {
                            model.is_loading = true;
                            caps.contacts.add(fields, |result| {
                                Event::ContactStoreResponded(Box::new(result))
                            });
                        }
                        Err(e) => model.set_error(e.into()),
                    }
                    caps.render.render();
                }

                Event::ContactUpdateRequested { id, fields } => {
                    match fields.validate(&model.contacts, Some(&id)) {
                        Ok(()) => {
                            model.is_loading = true;
                            caps.contacts.update(id, fields, |result| {
                                Event::ContactStoreResponded(Box::new(result))
                            });
                        }
                        Err(e) => model.set_error(e.into()),
                    }
                    caps.render.render();
                }

                Event::ContactDeleteRequested { id } => {
                    model.is_loading = true;
                    caps.contacts
                        .delete(id, |result| Event::ContactStoreResponded(Box::new(result)));
                    caps.render.render();
                }

                Event::ContactStoreResponded(result) => {
                    model.is_loading = false;
                    match *result {
                        Ok(ContactStoreOutput::Listed(contacts)) => {
                            model.contacts = contacts;
                            model.contacts_loaded = true;
                        }
                        Ok(ContactStoreOutput::Added(contact)) => {
                            model.contacts.push(contact);
                            model.set_toast(ToastMessage::success("Contact added."));
                        }
                        Ok(ContactStoreOutput::Updated(contact)) => {
                            if let Some(existing) =
                                model.contacts.iter_mut().find(|c| c.id == contact.id)
                            {
                                *existing = contact;
                            }
                            model.set_toast(ToastMessage::success("Contact updated."));
                        }
                        Ok(ContactStoreOutput::Deleted { id }) => {
                            model.contacts.retain(|c| c.id != id);
                            model.set_toast(ToastMessage::info("Contact removed."));
                        }
                        Err(e) => model.set_error(e.into()),
                    }
                    caps.render.render();
                }

                Event::EmergencyTriggered => {
                    if model.sessions.is_active()
                        || model.dispatch.in_flight()
                        || model.pending_trigger_at.is_some()
                    {
                        model.set_error(AppError::new(
                            ErrorKind::InvalidState,
                            "An emergency is already in progress.",
                        ));
                    } else if model.contacts.is_empty() {
                        model.set_error(AppError::new(
                            ErrorKind::Validation,
                            "Add at least one emergency contact first.",
                        ));
                    } else if let Err(e) = model.countdown.start(DEFAULT_COUNTDOWN_SECONDS) {
                        model.set_error(AppError::new(ErrorKind::InvalidState, e.to_string()));
                    } else {
                        caps.timer
                            .delay(COUNTDOWN_TICK_MS, |now| Event::CountdownTicked { now });
                    }
                    caps.render.render();
                }

                Event::CountdownTicked { now } => {
                    match model.countdown.tick() {
                        Tick::Running { .. } => {
                            caps.timer
                                .delay(COUNTDOWN_TICK_MS, |now| Event::CountdownTicked { now });
                        }
                        Tick::Completed => {
                            model.pending_trigger_at = Some(now);
                            caps.location.request_current(LocationOptions::default(), |result| {
                                Event::LocationResolved(Box::new(result))
                            });
                        }
                        // Stale callback racing a cancellation.
                        Tick::Ignored => {}
                    }
                    caps.render.render();
                }

                Event::CountdownCancelled => {
                    if model.countdown.cancel() {
                        tracing::info!("countdown cancelled before dispatch");
                        model.set_toast(ToastMessage::info("Emergency alert cancelled."));
                    }
                    caps.render.render();
                }

                Event::LocationResolved(result) => {
                    // The trigger stamp is taken exactly once; a stale fix
                    // arriving later cannot start a second dispatch.
                    if let Some(triggered_at) = model.pending_trigger_at.take() {
                        let location = match *result {
                            Ok(output) => match output.into_location() {
                                Ok(location) => Some(location),
                                Err(e) => {
                                    tracing::warn!(error = %e, "shell returned an invalid fix");
                                    None
                                }
                            },
                            Err(e) => {
                                model.set_toast(ToastMessage::warning(e.user_facing_message()));
                                None
                            }
                        };

                        let created = model.sessions.create(
                            model.user_id.clone(),
                            &model.contacts,
                            location,
                            triggered_at,
                        );
                        match created {
                            Ok(session) => {
                                let session_id = session.id.clone();
                                let alerts =
                                    dispatch::plan(session, &model.dispatch_config, triggered_at);
                                let queue = alerts.iter().map(|a| a.id.clone()).collect();

                                if let Err(e) = model.sessions.attach_alerts(&session_id, alerts) {
                                    tracing::error!(error = %e, "failed to attach alert batch");
                                }
                                model.dispatch = DispatchProgress::begin(session_id, queue);
                                Self::persist_active(model, caps);
                                Self::send_current(model, caps);
                            }
                            Err(e) => model.set_error(e.into()),
                        }
                    }
                    caps.render.render();
                }

                Event::AlertDeliveryCompleted { alert_id, result } => {
                    model
                        .sessions
                        .with_alert(&alert_id, |alert| dispatch::apply_outcome(alert, &result));

                    // Only the alert under the cursor advances the batch;
                    // duplicate receipts are absorbed above.
                    if model.dispatch.current() == Some(&alert_id) {
                        model.dispatch.advance();
                        if model.dispatch.in_flight() {
                            let pause = model.dispatch_config.inter_send_delay_ms;
                            if pause > 0 {
                                caps.timer
                                    .delay(pause, |now| Event::DispatchPauseElapsed { now });
                            } else {
                                Self::send_current(model, caps);
                            }
                        } else {
                            Self::finish_dispatch(model, caps);
                        }
                    }
                    caps.render.render();
                }

                Event::DispatchPauseElapsed { now: _ } => {
                    Self::send_current(model, caps);
                }

                Event::SessionResolveRequested { session_id, notes, at } => {
                    if notes.as_ref().is_some_and(|n| n.len() > MAX_NOTES_LEN) {
                        model.set_error(AppError::new(ErrorKind::Validation, "Notes are too long."));
                    } else {
                        match model.sessions.resolve(&session_id, notes, at) {
                            Ok(_) => {
                                Self::persist_active(model, caps);
                                model.set_toast(ToastMessage::success("Emergency resolved."));
                            }
                            Err(e) => model.set_error(e.into()),
                        }
                    }
                    caps.render.render();
                }

                Event::SessionCancelRequested { session_id, at } => {
                    match model.sessions.cancel(&session_id, at) {
                        Ok(_) => {
                            Self::persist_active(model, caps);
                            model.set_toast(ToastMessage::info("Emergency cancelled."));
                        }
                        Err(e) => model.set_error(e.into()),
                    }
                    caps.render.render();
                }

                Event::HistoryLoadRequested => {
                    Self::request_history(caps);
                }

                Event::SessionStoreResponded(result) => {
                    match *result {
                        Ok(SessionStoreOutput::Sessions(sessions)) => {
                            model.sessions.load_history(sessions);
                        }
                        Ok(SessionStoreOutput::Persisted { id }) => {
                            tracing::debug!(session_id = %id, "session persisted");
                        }
                        Err(e) => {
                            // History persistence must never block alerting.
                            tracing::warn!(error = %e, "session store fault");
                            model.set_toast(ToastMessage::warning(
                                "Could not update session history.",
                            ));
                        }
                    }
                    caps.render.render();
                }

                Event::ErrorDismissed => {
                    model.active_error = None;
                    caps.render.render();
                }

                Event::ToastDismissed => {
                    model.active_toast = None;
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let state = if let Some(remaining) = model.countdown.remaining() {
                ViewState::CountingDown { remaining_seconds: remaining }
            } else if model.pending_trigger_at.is_some() || model.dispatch.in_flight() {
                let (sent, failed, total) = model.sessions.active().map_or((0, 0, 0), |s| {
                    let sent = s
                        .alerts_sent
                        .iter()
                        .filter(|a| {
                            matches!(a.status, AlertStatus::Sent | AlertStatus::Delivered)
                        })
                        .count();
                    let failed = s
                        .alerts_sent
                        .iter()
                        .filter(|a| a.status == AlertStatus::Failed)
                        .count();
                    (sent, failed, s.alerts_sent.len())
                });
                ViewState::Dispatching { sent, failed, total }
            } else if let Some(session) = model.sessions.active().filter(|s| s.is_active()) {
                ViewState::ActiveEmergency { session: SessionView::from(session) }
            } else {
                ViewState::Idle { can_trigger: !model.contacts.is_empty() }
            };

            ViewModel {
                state,
                contacts: model.contacts.iter().map(super::ContactView::from).collect(),
                history: model
                    .sessions
                    .history()
                    .iter()
                    .rev()
                    .map(SessionSummaryView::from)
                    .collect(),
                error: model.active_error.as_ref().map(UserFacingError::from),
                toast: model.active_toast.as_ref().map(super::ToastView::from),
                is_loading: model.is_loading,
            }
        }
    }
}
