use crate::models::{GeoFix, LocationRequest, PermissionStatus};
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

/// W3C geolocation error code for "position unavailable".
pub const POSITION_UNAVAILABLE: i32 = 2;

/// Failure reported by a location provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    #[error("Location request timed out")]
    Timeout,

    #[error("Position error {code}: {message}")]
    Position { code: i32, message: String },
}

/// Device geolocation provider.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn check_permission(&self) -> bool;

    async fn request_permission(&self) -> PermissionStatus;

    async fn current_fix(&self, request: LocationRequest) -> Result<GeoFix, LocationError>;
}

/// Platform the workflow runs on, used only by the legacy permission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlatformInfo {
    /// OS API level, when the platform has one (e.g. Android SDK int).
    pub api_level: Option<u32>,
}

impl PlatformInfo {
    pub fn with_api_level(api_level: u32) -> Self {
        Self {
            api_level: Some(api_level),
        }
    }

    /// Older platform APIs grant location at install time. Only applies when
    /// a threshold is configured and the platform reports a level below it.
    pub fn assumes_location_granted(&self, threshold: Option<u32>) -> bool {
        match (self.api_level, threshold) {
            (Some(level), Some(threshold)) => level < threshold,
            _ => false,
        }
    }
}

/// Provider that always reports the same coordinates, stamped at request time.
pub struct FixedLocationSource {
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
}

impl FixedLocationSource {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

#[async_trait]
impl LocationSource for FixedLocationSource {
    async fn check_permission(&self) -> bool {
        true
    }

    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn current_fix(&self, _request: LocationRequest) -> Result<GeoFix, LocationError> {
        Ok(GeoFix {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            captured_at: Utc::now(),
        })
    }
}
