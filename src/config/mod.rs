use crate::models::LocationRequest;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// How successive location fixes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationRecording {
    /// Only the most recent fix is held; nothing is written locally.
    LatestOnly,
    /// Every fix is kept in memory and appended to `Download/location_data.txt`.
    AppendLog,
}

impl LocationRecording {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "latest" | "latest_only" => Some(Self::LatestOnly),
            "log" | "append" | "append_log" => Some(Self::AppendLog),
            _ => None,
        }
    }
}

/// Configuration for the capture-and-upload workflow
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Request a high accuracy fix (default: true)
    pub location_high_accuracy: bool,

    /// Bound on a single fix request (default: 15 s)
    pub location_timeout: Duration,

    /// Oldest cached fix the provider may return (default: 10 s)
    pub location_max_age: Duration,

    /// Location recording mode (default: latest only)
    pub location_recording: LocationRecording,

    /// App documents directory; the location log lives under `Download/` here
    pub documents_dir: PathBuf,

    /// Refuse to upload without a location fix (default: false)
    pub require_location: bool,

    /// Platform API level below which the location capability is assumed
    /// granted. `None` disables the bypass (default).
    pub legacy_permission_api_level: Option<u32>,

    /// Object store backend: "s3" or "local" (default: "local")
    pub storage_backend: String,

    /// Root directory for the local object store (default: "./uploads")
    pub local_storage_dir: PathBuf,

    /// Key prefix for uploaded objects (default: "images")
    pub upload_prefix: String,

    /// Maximum asset size in bytes (default: 50 MB)
    pub max_asset_size: usize,

    /// Album used by save-to-gallery (default: "Camera Roll")
    pub album_name: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            location_high_accuracy: true,
            location_timeout: Duration::from_millis(15_000),
            location_max_age: Duration::from_millis(10_000),
            location_recording: LocationRecording::LatestOnly,
            documents_dir: PathBuf::from("."),
            require_location: false,
            legacy_permission_api_level: None,
            storage_backend: "local".to_string(),
            local_storage_dir: PathBuf::from("./uploads"),
            upload_prefix: "images".to_string(),
            max_asset_size: 50 * 1024 * 1024, // 50 MB
            album_name: "Camera Roll".to_string(),
        }
    }
}

impl WorkflowConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            location_high_accuracy: env::var("LOCATION_HIGH_ACCURACY")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.location_high_accuracy),

            location_timeout: env::var("LOCATION_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default.location_timeout),

            location_max_age: env::var("LOCATION_MAX_AGE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default.location_max_age),

            location_recording: env::var("LOCATION_RECORDING")
                .ok()
                .and_then(|v| LocationRecording::parse(&v))
                .unwrap_or(default.location_recording),

            documents_dir: env::var("DOCUMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.documents_dir),

            require_location: env::var("REQUIRE_LOCATION")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.require_location),

            legacy_permission_api_level: env::var("LEGACY_PERMISSION_API_LEVEL")
                .ok()
                .and_then(|v| v.parse().ok()),

            storage_backend: env::var("STORAGE_BACKEND").unwrap_or(default.storage_backend),

            local_storage_dir: env::var("LOCAL_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.local_storage_dir),

            upload_prefix: env::var("UPLOAD_PREFIX").unwrap_or(default.upload_prefix),

            max_asset_size: env::var("MAX_ASSET_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_asset_size),

            album_name: env::var("ALBUM_NAME").unwrap_or(default.album_name),
        }
    }

    /// Create config for development (local storage, every fix logged)
    pub fn development() -> Self {
        Self {
            location_recording: LocationRecording::AppendLog,
            storage_backend: "local".to_string(),
            ..Self::default()
        }
    }

    /// Create config for production (S3 storage, location required)
    pub fn production() -> Self {
        let default = Self::from_env();
        Self {
            storage_backend: "s3".to_string(),
            require_location: true,
            legacy_permission_api_level: None,
            ..default
        }
    }

    /// Provider options derived from this config.
    pub fn location_request(&self) -> LocationRequest {
        LocationRequest {
            high_accuracy: self.location_high_accuracy,
            timeout: self.location_timeout,
            maximum_age: self.location_max_age,
        }
    }

    /// Path of the append-only location log.
    pub fn location_log_path(&self) -> PathBuf {
        self.documents_dir.join("Download").join("location_data.txt")
    }
}
