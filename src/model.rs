use serde::{Deserialize, Serialize};
use std::fmt;

use crate::countdown::Countdown;
use crate::dispatch::DispatchConfig;
use crate::session::SessionManager;
use crate::{AppError, MAX_CONTACTS};

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(ContactId);
typed_id!(SessionId);
typed_id!(AlertId);
typed_id!(UserId);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl ContactId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Explicit timestamp unit: milliseconds since the Unix epoch, UTC.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

// --- Coordinate: validated, NaN-safe ---

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid coordinate: lat={0}, lng={1}")]
    InvalidCoordinate(f64, f64),
    #[error("contact name must not be empty")]
    EmptyName,
    #[error("phone number '{0}' is not plausible")]
    InvalidPhone(String),
    #[error("a contact with phone '{0}' already exists")]
    DuplicatePhone(String),
    #[error("contact limit reached (maximum {max})")]
    ContactLimit { max: usize },
    #[error("value too long ({len} > {max})")]
    TooLong { len: usize, max: usize },
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite()
            || !lng.is_finite()
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lng)
        {
            return Err(ValidationError::InvalidCoordinate(lat, lng));
        }
        Ok(Self { lat, lng })
    }

    #[must_use]
    pub fn lat(&self) -> f64 {
        self.lat
    }
    #[must_use]
    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.lat.to_bits() == other.lat.to_bits() && self.lng.to_bits() == other.lng.to_bits()
    }
}

impl Eq for Coordinate {}

/// A geolocation fix. Immutable once captured; attached to a session at
/// creation time only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coordinate: Coordinate,
    pub accuracy_m: Option<f64>,
    pub captured_at: UnixTimeMs,
}

// --- Contacts ---

pub const MAX_NAME_LEN: usize = 128;
pub const MAX_RELATIONSHIP_LEN: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub phone: String,
    pub relationship: Option<String>,
    pub is_primary: bool,
}

/// Fields for creating or updating a contact through the contact store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

impl ContactFields {
    /// Core-side validation: the surrounding UI also guards these rules,
    /// but the limit and shape checks must hold regardless of the caller.
    pub fn validate(
        &self,
        existing: &[Contact],
        exclude: Option<&ContactId>,
    ) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(ValidationError::TooLong { len: name.len(), max: MAX_NAME_LEN });
        }
        if let Some(rel) = &self.relationship {
            if rel.len() > MAX_RELATIONSHIP_LEN {
                return Err(ValidationError::TooLong { len: rel.len(), max: MAX_RELATIONSHIP_LEN });
            }
        }

        let digits = normalized_phone(&self.phone);
        if digits.len() < 7 || digits.len() > 15 {
            return Err(ValidationError::InvalidPhone(self.phone.clone()));
        }

        let is_new = exclude.is_none();
        if is_new && existing.len() >= MAX_CONTACTS {
            return Err(ValidationError::ContactLimit { max: MAX_CONTACTS });
        }
        if existing
            .iter()
            .filter(|c| Some(&c.id) != exclude)
            .any(|c| normalized_phone(&c.phone) == digits)
        {
            return Err(ValidationError::DuplicatePhone(self.phone.clone()));
        }

        Ok(())
    }
}

fn normalized_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// US-style display formatting; anything unrecognised passes through as-is.
#[must_use]
pub fn format_phone_number(phone: &str) -> String {
    let cleaned = normalized_phone(phone);
    if cleaned.len() == 10 {
        format!("({}) {}-{}", &cleaned[..3], &cleaned[3..6], &cleaned[6..])
    } else if cleaned.len() == 11 && cleaned.starts_with('1') {
        format!("+1 ({}) {}-{}", &cleaned[1..4], &cleaned[4..7], &cleaned[7..])
    } else {
        phone.to_string()
    }
}

// --- Sessions & alerts ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Resolved,
    Cancelled,
}

impl SessionStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Cancelled)
    }
}

/// One emergency episode from trigger to resolution or cancellation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: Option<UserId>,
    pub status: SessionStatus,
    pub triggered_at: UnixTimeMs,
    pub location: Option<Location>,
    pub contacts_alerted: Vec<Contact>,
    pub alerts_sent: Vec<Alert>,
    pub resolved_at: Option<UnixTimeMs>,
    pub notes: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(
        user_id: Option<UserId>,
        contacts: Vec<Contact>,
        location: Option<Location>,
        triggered_at: UnixTimeMs,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            user_id,
            status: SessionStatus::Active,
            triggered_at,
            location,
            contacts_alerted: contacts,
            alerts_sent: Vec::new(),
            resolved_at: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    #[must_use]
    pub fn alert(&self, alert_id: &AlertId) -> Option<&Alert> {
        self.alerts_sent.iter().find(|a| &a.id == alert_id)
    }

    pub fn alert_mut(&mut self, alert_id: &AlertId) -> Option<&mut Alert> {
        self.alerts_sent.iter_mut().find(|a| &a.id == alert_id)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertChannel {
    #[default]
    Sms,
    Push,
    Call,
}

impl AlertChannel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Push => "push",
            Self::Call => "call",
        }
    }
}

/// Forward-only delivery status. `Pending → Sent → Delivered`, or
/// `Pending → Failed`; never reopened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

impl AlertStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

/// One per-contact delivery attempt tied to a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub session_id: SessionId,
    pub contact_id: ContactId,
    pub channel: AlertChannel,
    pub status: AlertStatus,
    pub sent_at: UnixTimeMs,
    pub delivered_at: Option<UnixTimeMs>,
    pub message: String,
    pub error_message: Option<String>,
}

impl Alert {
    /// `Pending → Sent`. Ignored once the alert has reached a terminal state.
    pub fn mark_sent(&mut self, at: UnixTimeMs) {
        if self.status == AlertStatus::Pending {
            self.status = AlertStatus::Sent;
            self.sent_at = at;
        }
    }

    /// `Sent → Delivered` (or straight from `Pending` when the receipt
    /// already confirms delivery).
    pub fn mark_delivered(&mut self, at: UnixTimeMs) {
        if matches!(self.status, AlertStatus::Pending | AlertStatus::Sent) {
            self.status = AlertStatus::Delivered;
            self.delivered_at = Some(at);
        }
    }

    /// Any non-terminal state `→ Failed`, capturing the fault text.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = AlertStatus::Failed;
            self.error_message = Some(error.into());
        }
    }
}

// --- Toasts ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl ToastMessage {
    pub fn info(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: ToastKind::Info, duration_ms: 4000 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: ToastKind::Success, duration_ms: 4000 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: ToastKind::Warning, duration_ms: 6000 }
    }
}

// --- In-flight dispatch bookkeeping ---

/// Progress through a session's ordered alert queue. Alerts go out one at a
/// time; the cursor only moves forward.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchProgress {
    pub session_id: Option<SessionId>,
    pub queue: Vec<AlertId>,
    pub cursor: usize,
}

impl DispatchProgress {
    #[must_use]
    pub fn begin(session_id: SessionId, queue: Vec<AlertId>) -> Self {
        Self { session_id: Some(session_id), queue, cursor: 0 }
    }

    #[must_use]
    pub fn current(&self) -> Option<&AlertId> {
        if self.session_id.is_some() {
            self.queue.get(self.cursor)
        } else {
            None
        }
    }

    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.session_id.is_some() && self.cursor < self.queue.len()
    }

    pub fn finish(&mut self) {
        self.session_id = None;
        self.queue.clear();
        self.cursor = 0;
    }
}

// --- Model ---

#[derive(Default, Serialize, Deserialize, Clone, Debug)]
pub struct Model {
    pub user_id: Option<UserId>,
    pub contacts: Vec<Contact>,
    pub contacts_loaded: bool,

    pub countdown: Countdown,
    /// Stamped when the countdown completes; consumed when the session is
    /// created so a stale location fix cannot start a second dispatch.
    pub pending_trigger_at: Option<UnixTimeMs>,

    pub sessions: SessionManager,
    pub dispatch: DispatchProgress,
    pub dispatch_config: DispatchConfig,

    pub is_loading: bool,
    pub active_error: Option<AppError>,
    pub active_toast: Option<ToastMessage>,
}

impl Model {
    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn set_toast(&mut self, toast: ToastMessage) {
        self.active_toast = Some(toast);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_rejects_nan_and_infinity() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::NAN).is_err());
        assert!(Coordinate::new(f64::INFINITY, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn coordinate_rejects_out_of_range() {
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(-91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, 181.0).is_err());
        assert!(Coordinate::new(0.0, -181.0).is_err());
        assert!(Coordinate::new(90.0, 180.0).is_ok());
    }

    #[test]
    fn phone_formatting_matches_display_rules() {
        assert_eq!(format_phone_number("4155551234"), "(415) 555-1234");
        assert_eq!(format_phone_number("14155551234"), "+1 (415) 555-1234");
        assert_eq!(format_phone_number("415-555-1234"), "(415) 555-1234");
        assert_eq!(format_phone_number("+44 20 7946 0958"), "+44 20 7946 0958");
    }

    fn contact(id: &str, phone: &str) -> Contact {
        Contact {
            id: ContactId::new(id),
            name: format!("contact {id}"),
            phone: phone.into(),
            relationship: None,
            is_primary: false,
        }
    }

    fn fields(name: &str, phone: &str) -> ContactFields {
        ContactFields {
            name: name.into(),
            phone: phone.into(),
            relationship: None,
            is_primary: false,
        }
    }

    #[test]
    fn contact_fields_reject_empty_name_and_bad_phone() {
        assert!(matches!(
            fields("  ", "4155551234").validate(&[], None),
            Err(ValidationError::EmptyName)
        ));
        assert!(matches!(
            fields("Ana", "12ab").validate(&[], None),
            Err(ValidationError::InvalidPhone(_))
        ));
    }

    #[test]
    fn contact_limit_enforced_in_core() {
        let existing = vec![
            contact("a", "4155550001"),
            contact("b", "4155550002"),
            contact("c", "4155550003"),
        ];
        assert!(matches!(
            fields("Dan", "4155550004").validate(&existing, None),
            Err(ValidationError::ContactLimit { max: 3 })
        ));
        // Updating an existing contact is not bound by the limit.
        assert!(fields("Ana", "4155559999")
            .validate(&existing, Some(&ContactId::new("a")))
            .is_ok());
    }

    #[test]
    fn duplicate_phone_rejected_ignoring_formatting() {
        let existing = vec![contact("a", "(415) 555-0001")];
        assert!(matches!(
            fields("Bea", "415-555-0001").validate(&existing, None),
            Err(ValidationError::DuplicatePhone(_))
        ));
    }

    fn pending_alert() -> Alert {
        Alert {
            id: AlertId::new("a"),
            session_id: SessionId::new("s"),
            contact_id: ContactId::new("c"),
            channel: AlertChannel::Sms,
            status: AlertStatus::Pending,
            sent_at: UnixTimeMs(0),
            delivered_at: None,
            message: String::new(),
            error_message: None,
        }
    }

    #[test]
    fn alert_status_transitions_are_forward_only() {
        let mut alert = pending_alert();

        alert.mark_failed("no signal");
        assert_eq!(alert.status, AlertStatus::Failed);

        // Terminal: neither sent nor delivered may reopen it.
        alert.mark_sent(UnixTimeMs(10));
        alert.mark_delivered(UnixTimeMs(11));
        assert_eq!(alert.status, AlertStatus::Failed);
        assert_eq!(alert.delivered_at, None);
    }

    #[test]
    fn delivered_alert_cannot_fail() {
        let mut alert = pending_alert();

        alert.mark_sent(UnixTimeMs(5));
        alert.mark_delivered(UnixTimeMs(6));
        alert.mark_failed("late fault");
        assert_eq!(alert.status, AlertStatus::Delivered);
        assert_eq!(alert.error_message, None);
    }

    #[test]
    fn dispatch_progress_cursor_moves_forward() {
        let mut progress = DispatchProgress::begin(
            SessionId::new("s"),
            vec![AlertId::new("a1"), AlertId::new("a2")],
        );
        assert!(progress.in_flight());
        assert_eq!(progress.current(), Some(&AlertId::new("a1")));

        progress.advance();
        assert_eq!(progress.current(), Some(&AlertId::new("a2")));

        progress.advance();
        assert!(!progress.in_flight());

        progress.finish();
        assert_eq!(progress.current(), None);
    }
}
