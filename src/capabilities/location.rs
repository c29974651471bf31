//! Geolocation capability.
//!
//! Wraps the shell's location provider (the browser geolocation API in the
//! web shell). The request may fail with permission, availability, or
//! timeout faults; each maps to fixed user-facing text. A failed fix never
//! blocks an emergency — the app degrades to a "location unavailable"
//! message body.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Coordinate, Location, UnixTimeMs, ValidationError};
use crate::{LOCATION_MAX_AGE_MS, LOCATION_TIMEOUT_MS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationOptions {
    pub enable_high_accuracy: bool,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout_ms: LOCATION_TIMEOUT_MS,
            maximum_age_ms: LOCATION_MAX_AGE_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum LocationOperation {
    RequestCurrent { options: LocationOptions },
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location information is unavailable")]
    Unavailable,

    #[error("location request timed out")]
    Timeout,

    #[error("geolocation is not supported on this platform")]
    Unsupported,

    #[error("location error: {message}")]
    Unknown { message: String },
}

impl LocationError {
    #[must_use]
    pub fn user_facing_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Location access denied. Please enable location services."
            }
            Self::Unavailable => "Location information is unavailable.",
            Self::Timeout => "Location request timed out.",
            Self::Unsupported => "Geolocation not supported",
            Self::Unknown { .. } => "An unknown error occurred while retrieving location.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LocationOutput {
    Fix {
        latitude: f64,
        longitude: f64,
        accuracy_m: Option<f64>,
        timestamp_ms: u64,
    },
}

impl LocationOutput {
    /// Validates the raw shell fix into a domain [`Location`].
    pub fn into_location(self) -> Result<Location, ValidationError> {
        let Self::Fix { latitude, longitude, accuracy_m, timestamp_ms } = self;
        Ok(Location {
            coordinate: Coordinate::new(latitude, longitude)?,
            accuracy_m,
            captured_at: UnixTimeMs(timestamp_ms),
        })
    }
}

impl Operation for LocationOperation {
    type Output = LocationResult;
}

pub type LocationResult = Result<LocationOutput, LocationError>;

pub struct LocationProvider<Ev> {
    context: CapabilityContext<LocationOperation, Ev>,
}

impl<Ev> Capability<Ev> for LocationProvider<Ev> {
    type Operation = LocationOperation;
    type MappedSelf<MappedEv> = LocationProvider<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        LocationProvider::new(self.context.map_event(f))
    }
}

impl<Ev> LocationProvider<Ev>
where
    Ev: Send + 'static,
{
    pub fn new(context: CapabilityContext<LocationOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn request_current<F>(&self, options: LocationOptions, make_event: F)
    where
        F: FnOnce(LocationResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(LocationOperation::RequestCurrent { options })
                .await;
            ctx.update_app(make_event(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_favor_accuracy_with_bounded_wait() {
        let options = LocationOptions::default();
        assert!(options.enable_high_accuracy);
        assert_eq!(options.timeout_ms, 10_000);
        assert_eq!(options.maximum_age_ms, 60_000);
    }

    #[test]
    fn error_texts_are_fixed_per_fault() {
        assert_eq!(
            LocationError::PermissionDenied.user_facing_message(),
            "Location access denied. Please enable location services."
        );
        assert_eq!(
            LocationError::Unavailable.user_facing_message(),
            "Location information is unavailable."
        );
        assert_eq!(
            LocationError::Timeout.user_facing_message(),
            "Location request timed out."
        );
    }

    #[test]
    fn fix_validates_into_domain_location() {
        let output = LocationOutput::Fix {
            latitude: 37.7749,
            longitude: -122.4194,
            accuracy_m: Some(8.0),
            timestamp_ms: 1_700_000_000_000,
        };
        let location = output.into_location().unwrap();
        assert_eq!(location.coordinate.lat(), 37.7749);
        assert_eq!(location.captured_at, UnixTimeMs(1_700_000_000_000));
    }

    #[test]
    fn out_of_range_fix_is_rejected() {
        let output = LocationOutput::Fix {
            latitude: 91.0,
            longitude: 0.0,
            accuracy_m: None,
            timestamp_ms: 0,
        };
        assert!(output.into_location().is_err());
    }
}
