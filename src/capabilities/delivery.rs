//! Alert delivery capability.
//!
//! One request per alert. The shell owns the actual channel (SMS gateway,
//! push service, or a console mock during development) and answers with a
//! receipt or a fault. The receipt's optional delivery time is how a shell
//! with real provider callbacks distinguishes `sent` from `delivered`;
//! mocked shells confirm both at once.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Alert, AlertChannel, AlertId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum DeliveryOperation {
    Send {
        alert_id: AlertId,
        channel: AlertChannel,
        destination: String,
        message: String,
    },
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("{channel:?} channel is not available")]
    ChannelUnavailable { channel: AlertChannel },

    #[error("send failed: {reason}")]
    SendFailed {
        reason: String,
        #[serde(default)]
        is_retryable: bool,
    },

    #[error("delivery timed out")]
    Timeout,

    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("unknown delivery error: {message}")]
    Unknown { message: String },
}

impl DeliveryError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::SendFailed { is_retryable, .. } => *is_retryable,
            Self::Timeout | Self::RateLimited { .. } => true,
            Self::ChannelUnavailable { .. } | Self::Unknown { .. } => false,
        }
    }

    #[must_use]
    pub fn send_failed(reason: impl Into<String>) -> Self {
        Self::SendFailed { reason: reason.into(), is_retryable: false }
    }
}

/// Shell acknowledgement for one alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub accepted_at_ms: u64,
    /// Present only when the channel can confirm delivery to the handset.
    #[serde(default)]
    pub delivered_at_ms: Option<u64>,
}

impl Operation for DeliveryOperation {
    type Output = DeliveryResult;
}

pub type DeliveryResult = Result<DeliveryReceipt, DeliveryError>;

pub struct DeliveryChannel<Ev> {
    context: CapabilityContext<DeliveryOperation, Ev>,
}

impl<Ev> Capability<Ev> for DeliveryChannel<Ev> {
    type Operation = DeliveryOperation;
    type MappedSelf<MappedEv> = DeliveryChannel<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        DeliveryChannel::new(self.context.map_event(f))
    }
}

impl<Ev> DeliveryChannel<Ev>
where
    Ev: Send + 'static,
{
    pub fn new(context: CapabilityContext<DeliveryOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn send<F>(&self, alert: &Alert, destination: String, make_event: F)
    where
        F: FnOnce(DeliveryResult) -> Ev + Send + 'static,
    {
        let operation = DeliveryOperation::Send {
            alert_id: alert.id.clone(),
            channel: alert.channel,
            destination,
            message: alert.message.clone(),
        };
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(result));
        });
    }
}
