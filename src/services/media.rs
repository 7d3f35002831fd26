use crate::models::{MediaAsset, MediaSourceKind, PermissionStatus, PickResult};
use crate::utils::validation::{detect_image_type, probe_dimensions, validate_asset_handle};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Device-side image picker / camera.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Prompt for the capability behind `kind` (library or camera).
    async fn request_permission(&self, kind: MediaSourceKind) -> PermissionStatus;

    /// Launch the picker. `Err` means the picker itself failed.
    async fn pick_image(&self, kind: MediaSourceKind) -> Result<PickResult>;

    /// Resolve a handle to the image bytes.
    async fn read_asset(&self, asset: &MediaAsset) -> Result<Bytes>;

    /// Prompt for permission to write into the device gallery.
    async fn request_save_permission(&self) -> PermissionStatus;

    /// Store the asset in a named album.
    async fn save_to_album(&self, asset: &MediaAsset, album: &str) -> Result<()>;
}

/// Picker backed by a file on disk. Used by the CLI, where "picking" means
/// pointing at a path and permissions are implicit.
pub struct FileMediaSource {
    selection: Option<PathBuf>,
    gallery_root: PathBuf,
}

impl FileMediaSource {
    pub fn new(selection: Option<PathBuf>, gallery_root: PathBuf) -> Self {
        Self {
            selection,
            gallery_root,
        }
    }
}

fn handle_to_path(handle: &str) -> Result<PathBuf> {
    let url = validate_asset_handle(handle)?;
    if url.scheme() != "file" {
        return Err(anyhow!("Handle '{}' is not a file URI", handle));
    }
    url.to_file_path()
        .map_err(|_| anyhow!("Handle '{}' has no local path", handle))
}

fn path_to_handle(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("Cannot resolve {}", path.display()))?;
    url::Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .map_err(|_| anyhow!("Cannot build a file URI for {}", absolute.display()))
}

#[async_trait]
impl MediaSource for FileMediaSource {
    async fn request_permission(&self, _kind: MediaSourceKind) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn pick_image(&self, kind: MediaSourceKind) -> Result<PickResult> {
        let Some(path) = &self.selection else {
            debug!("No file selected for {}, treating as cancel", kind);
            return Ok(PickResult::Cancelled);
        };

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let mut asset = MediaAsset::new(path_to_handle(path)?);
        asset.mime_type = detect_image_type(&bytes).map(|(mime, _)| mime.to_string());
        asset.dimensions = probe_dimensions(&bytes);

        info!("🖼️  Picked {} from {}", asset.handle, kind);
        Ok(PickResult::Asset(asset))
    }

    async fn read_asset(&self, asset: &MediaAsset) -> Result<Bytes> {
        let path = handle_to_path(&asset.handle)?;
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Bytes::from(data))
    }

    async fn request_save_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn save_to_album(&self, asset: &MediaAsset, album: &str) -> Result<()> {
        let source = handle_to_path(&asset.handle)?;
        let file_name = source
            .file_name()
            .ok_or_else(|| anyhow!("Handle '{}' has no file name", asset.handle))?;

        let album_dir = self.gallery_root.join(album);
        tokio::fs::create_dir_all(&album_dir).await?;
        let dest = album_dir.join(file_name);
        tokio::fs::copy(&source, &dest)
            .await
            .with_context(|| format!("Failed to copy into {}", dest.display()))?;

        info!("💾 Saved {} to album '{}'", asset.handle, album);
        Ok(())
    }
}
