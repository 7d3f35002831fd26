use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where the user picks an image from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSourceKind {
    Gallery,
    Camera,
}

impl MediaSourceKind {
    /// Capability that must be granted before the picker can be launched.
    pub fn capability(self) -> Capability {
        match self {
            MediaSourceKind::Gallery => Capability::MediaLibrary,
            MediaSourceKind::Camera => Capability::Camera,
        }
    }
}

impl fmt::Display for MediaSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MediaSourceKind::Gallery => write!(f, "gallery"),
            MediaSourceKind::Camera => write!(f, "camera"),
        }
    }
}

/// OS-mediated permission that can be requested and denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Camera,
    MediaLibrary,
    MediaLibraryWrite,
    Location,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Capability::Camera => write!(f, "camera"),
            Capability::MediaLibrary => write!(f, "photo library"),
            Capability::MediaLibraryWrite => write!(f, "gallery (write)"),
            Capability::Location => write!(f, "location"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Locally accessible image, referenced by an opaque handle (URI).
///
/// The handle is only valid until the workflow completes or the platform
/// reclaims the underlying temporary file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub handle: String,
    pub dimensions: Option<Dimensions>,
    pub mime_type: Option<String>,
}

impl MediaAsset {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            dimensions: None,
            mime_type: None,
        }
    }
}

/// What the picker handed back. A cancel is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum PickResult {
    Cancelled,
    Asset(MediaAsset),
}

/// Result of `request_media` as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaOutcome {
    Selected(MediaAsset),
    Cancelled,
}

/// A single geolocation fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in metres, when the provider reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            captured_at: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for GeoFix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// Options forwarded to the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequest {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the provider may hand back instead of a fresh one.
    pub maximum_age: Duration,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_millis(15_000),
            maximum_age: Duration::from_millis(10_000),
        }
    }
}

/// Persisted upload: object reference plus location metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: String,
    pub asset_ref: String,
    pub location: Option<GeoFix>,
    pub content_type: Option<String>,
    pub size: i64,
    pub timestamp: DateTime<Utc>,
}

/// Fields handed to the metadata store; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUploadRecord {
    pub asset_ref: String,
    pub location: Option<GeoFix>,
    pub content_type: Option<String>,
    pub size: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowState {
    Idle,
    AwaitingPermission,
    SelectingMedia,
    MediaReady,
    AwaitingLocation,
    LocationReady,
    Uploading,
    Succeeded,
    Failed,
}

impl WorkflowState {
    /// States the workflow may rest in between operations.
    pub fn is_stable(self) -> bool {
        matches!(
            self,
            WorkflowState::Idle
                | WorkflowState::MediaReady
                | WorkflowState::LocationReady
                | WorkflowState::Succeeded
                | WorkflowState::Failed
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Operations guarded by the single-flight rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RequestMedia,
    RequestLocation,
    Upload,
    SaveToAlbum,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::RequestMedia => write!(f, "request_media"),
            Operation::RequestLocation => write!(f, "request_location"),
            Operation::Upload => write!(f, "upload"),
            Operation::SaveToAlbum => write!(f, "save_to_album"),
        }
    }
}
