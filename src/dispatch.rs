//! Alert planning and message rendering.
//!
//! The dispatcher turns a session and its ordered contact list into one
//! alert record per contact. Delivery itself is a shell concern (the
//! delivery capability); outcomes flow back as events and are applied to
//! the alert records one by one. Sends are paced; the pause is an explicit,
//! injectable [`DispatchConfig`] value so tests can run with zero delay.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::capabilities::{DeliveryError, DeliveryReceipt};
use crate::model::{
    Alert, AlertChannel, AlertId, AlertStatus, Contact, Location, Session, UnixTimeMs,
};

pub const DEFAULT_INTER_SEND_DELAY_MS: u64 = 500;

/// Pacing and channel selection for a dispatch batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Pause between consecutive sends. Zero disables pacing entirely.
    pub inter_send_delay_ms: u64,
    pub channel: AlertChannel,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            inter_send_delay_ms: DEFAULT_INTER_SEND_DELAY_MS,
            channel: AlertChannel::Sms,
        }
    }
}

/// Builds the pending alert batch for a session, one alert per contact,
/// preserving the order the contacts were given in.
#[must_use]
pub fn plan(session: &Session, config: &DispatchConfig, now: UnixTimeMs) -> Vec<Alert> {
    session
        .contacts_alerted
        .iter()
        .map(|contact| Alert {
            id: alert_id(&session.id, contact, config.channel),
            session_id: session.id.clone(),
            contact_id: contact.id.clone(),
            channel: config.channel,
            status: AlertStatus::Pending,
            sent_at: now,
            delivered_at: None,
            message: render_message(&contact.name, session.location.as_ref(), now),
            error_message: None,
        })
        .collect()
}

/// Deterministic alert identity: one alert per (session, contact, channel).
fn alert_id(session_id: &crate::model::SessionId, contact: &Contact, channel: AlertChannel) -> AlertId {
    AlertId::new(format!("alert_{}_{}_{}", session_id, contact.id, channel.as_str()))
}

/// Applies a delivery outcome to its alert record. A failure is recorded on
/// the individual alert and never propagated; the rest of the batch keeps
/// going.
pub fn apply_outcome(alert: &mut Alert, outcome: &Result<DeliveryReceipt, DeliveryError>) {
    match outcome {
        Ok(receipt) => {
            alert.mark_sent(UnixTimeMs(receipt.accepted_at_ms));
            if let Some(delivered) = receipt.delivered_at_ms {
                alert.mark_delivered(UnixTimeMs(delivered));
            }
        }
        Err(e) => {
            tracing::warn!(alert_id = %alert.id, error = %e, "alert delivery failed");
            alert.mark_failed(e.to_string());
        }
    }
}

/// Renders the message body sent to one contact: map link plus raw
/// coordinates when a fix exists, an explicit unavailable note otherwise,
/// and always the send time and the directive to call emergency services
/// directly.
#[must_use]
pub fn render_message(_contact_name: &str, location: Option<&Location>, now: UnixTimeMs) -> String {
    let mut message = String::from(
        "🚨 EMERGENCY ALERT 🚨\n\nThis is an automated emergency message from BEACON.",
    );

    if let Some(loc) = location {
        let lat = loc.coordinate.lat();
        let lng = loc.coordinate.lng();
        message.push_str(&format!(
            "\n\nLocation: https://maps.google.com/maps?q={lat},{lng}"
        ));
        message.push_str(&format!("\nCoordinates: {lat:.6}, {lng:.6}"));
        message.push_str(&format!(
            "\nAccuracy: ~{}m",
            loc.accuracy_m.unwrap_or(0.0).round() as i64
        ));
    } else {
        message.push_str("\n\nLocation: Unable to determine current location");
    }

    message.push_str(&format!("\n\nTime: {}", format_human_time(now)));
    message.push_str(
        "\n\nIf this is a real emergency, please call emergency services immediately.",
    );

    message
}

fn format_human_time(at: UnixTimeMs) -> String {
    DateTime::from_timestamp_millis(at.0 as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{} ms since epoch", at.0))
}
