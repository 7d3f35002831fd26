pub mod config;
pub mod entities;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::config::{LocationRecording, WorkflowConfig};
pub use crate::error::{UploadStage, WorkflowError, WorkflowResult};
pub use crate::services::workflow::{CaptureUploadWorkflow, Collaborators};
