use crate::models::{Capability, Operation};
use std::fmt;
use thiserror::Error;

/// Which half of an upload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    ObjectPut,
    MetadataWrite,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UploadStage::ObjectPut => write!(f, "object put"),
            UploadStage::MetadataWrite => write!(f, "metadata write"),
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Permission denied: {0}")]
    PermissionDenied(Capability),

    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    #[error("Asset unavailable: {0}")]
    AssetUnavailable(String),

    #[error("Media source error: {0}")]
    MediaSource(String),

    #[error("Location request timed out")]
    LocationTimeout,

    #[error("Position error {code}: {message}")]
    PositionError { code: i32, message: String },

    #[error("Upload failed during {stage}: {source}")]
    UploadFailed {
        stage: UploadStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("No image to upload")]
    MissingAsset,

    #[error("No location fix available")]
    MissingLocation,

    #[error("Operation already in progress: {0}")]
    Busy(Operation),

    #[error("Save failed: {0}")]
    Save(String),
}

impl WorkflowError {
    /// Alert title shown to the user for this failure.
    pub fn alert_title(&self) -> &'static str {
        match self {
            WorkflowError::PermissionDenied(_) => "Permission required",
            WorkflowError::InvalidAsset(_)
            | WorkflowError::AssetUnavailable(_)
            | WorkflowError::MediaSource(_) => "Error",
            WorkflowError::LocationTimeout | WorkflowError::PositionError { .. } => {
                "Location Error"
            }
            WorkflowError::UploadFailed { .. } => "Upload Failed",
            WorkflowError::MissingAsset => "No image to save",
            WorkflowError::MissingLocation => "No location",
            WorkflowError::Busy(_) => "Busy",
            WorkflowError::Save(_) => "Save Error",
        }
    }

    /// Failures the user resolves by acting (granting a permission, waiting
    /// for the running call). Logged at info rather than error.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            WorkflowError::PermissionDenied(_) | WorkflowError::Busy(_)
        )
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
