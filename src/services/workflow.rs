use crate::config::{LocationRecording, WorkflowConfig};
use crate::error::{UploadStage, WorkflowError, WorkflowResult};
use crate::models::{
    Capability, GeoFix, MediaAsset, MediaOutcome, MediaSourceKind, NewUploadRecord, Operation,
    PickResult, UploadRecord, WorkflowState,
};
use crate::services::location::{LocationError, LocationSource, POSITION_UNAVAILABLE, PlatformInfo};
use crate::services::location_log::LocationLog;
use crate::services::media::MediaSource;
use crate::services::metadata::MetadataStore;
use crate::services::notification::{self, NotificationSink};
use crate::services::storage::ObjectStore;
use crate::utils::single_flight::SingleFlight;
use crate::utils::validation::{detect_image_type, validate_asset_handle, validate_asset_size};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OwnedSemaphorePermit, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Placeholder used in alerts when no fix is known.
pub const UNKNOWN_LOCATION: &str = "unknown location";

/// External systems the workflow talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaSource>,
    pub location: Arc<dyn LocationSource>,
    pub objects: Arc<dyn ObjectStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub notifier: Arc<dyn NotificationSink>,
}

#[derive(Debug, Default)]
struct Session {
    asset: Option<MediaAsset>,
    latest_fix: Option<GeoFix>,
    history: Vec<GeoFix>,
}

/// Pick or capture a photo, optionally attach a location fix, and persist
/// both to the backend.
///
/// All fields the UI renders (`asset`, fixes, state) are owned here. The UI
/// observes state through [`CaptureUploadWorkflow::subscribe`].
pub struct CaptureUploadWorkflow {
    deps: Collaborators,
    config: WorkflowConfig,
    platform: PlatformInfo,
    location_log: Option<LocationLog>,
    flights: SingleFlight,
    session: Mutex<Session>,
    state_tx: watch::Sender<WorkflowState>,
    alerts: Mutex<Vec<JoinHandle<()>>>,
}

fn permission_message(capability: Capability) -> String {
    match capability {
        Capability::MediaLibraryWrite => {
            "You need to enable permission to save images to the gallery.".to_string()
        }
        other => format!("You need to enable permission to access the {}.", other),
    }
}

fn describe_location(fix: Option<&GeoFix>) -> String {
    fix.map(|f| f.to_string())
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
}

impl CaptureUploadWorkflow {
    pub fn new(deps: Collaborators, config: WorkflowConfig) -> Self {
        let location_log = match config.location_recording {
            LocationRecording::AppendLog => Some(LocationLog::new(config.location_log_path())),
            LocationRecording::LatestOnly => None,
        };
        let (state_tx, _) = watch::channel(WorkflowState::Idle);

        Self {
            deps,
            config,
            platform: PlatformInfo::default(),
            location_log,
            flights: SingleFlight::new(),
            session: Mutex::new(Session::default()),
            state_tx,
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_platform(mut self, platform: PlatformInfo) -> Self {
        self.platform = platform;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn state(&self) -> WorkflowState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state_tx.subscribe()
    }

    pub fn current_asset(&self) -> Option<MediaAsset> {
        self.session().asset.clone()
    }

    pub fn latest_fix(&self) -> Option<GeoFix> {
        self.session().latest_fix.clone()
    }

    /// Every fix recorded so far. Holds at most one entry in `LatestOnly` mode.
    pub fn location_history(&self) -> Vec<GeoFix> {
        self.session().history.clone()
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pending_alerts(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: WorkflowState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            if state.is_stable() {
                info!("Workflow resting in {} (was {})", state, previous);
            } else {
                debug!("Workflow state {} -> {}", previous, state);
            }
        }
    }

    /// State implied by what the session holds right now.
    ///
    /// Operations of different kinds overlap, so a finishing operation cannot
    /// blindly restore what it saw on entry. `entered` is kept only while the
    /// session still matches it. An upload in flight owns the state until it
    /// completes.
    fn resting_state(&self, entered: Option<WorkflowState>) -> WorkflowState {
        if self.flights.is_in_flight(Operation::Upload) {
            return WorkflowState::Uploading;
        }
        let session = self.session();
        let (has_asset, has_fix) = (session.asset.is_some(), session.latest_fix.is_some());

        let still_holds = |state: WorkflowState| match state {
            WorkflowState::Idle => !has_asset,
            WorkflowState::MediaReady => has_asset && !has_fix,
            WorkflowState::LocationReady => has_asset && has_fix,
            WorkflowState::Succeeded | WorkflowState::Failed => has_asset,
            _ => false,
        };
        match entered {
            Some(state) if still_holds(state) => state,
            _ if has_asset && has_fix => WorkflowState::LocationReady,
            _ if has_asset => WorkflowState::MediaReady,
            _ => WorkflowState::Idle,
        }
    }

    /// Moves to the state the session now implies.
    fn settle(&self) {
        let state = self.resting_state(None);
        self.set_state(state);
    }

    /// Returns to `entered` after a denial or failure, unless a concurrent
    /// operation changed what it stood for.
    fn restore(&self, entered: WorkflowState) {
        let state = self.resting_state(Some(entered));
        self.set_state(state);
    }

    /// Publishes the upload outcome unless another operation moved the state
    /// while the upload ran. That operation settles the state when it ends.
    fn finish_upload(&self, outcome: WorkflowState) {
        let published = self.state_tx.send_if_modified(|state| {
            if *state == WorkflowState::Uploading {
                *state = outcome;
                true
            } else {
                false
            }
        });
        if published {
            info!("Workflow resting in {}", outcome);
        } else {
            debug!(
                "Upload finished as {} while state is {}, leaving it",
                outcome,
                self.state()
            );
        }
    }

    fn alert(&self, title: &str, body: impl Into<String>) {
        let handle = notification::dispatch(&self.deps.notifier, title, body);
        let mut pending = self.pending_alerts();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    fn alert_error(&self, err: &WorkflowError) {
        if err.is_user_recoverable() {
            info!("{}", err);
        } else {
            error!("{}", err);
        }
        let body = match err {
            WorkflowError::PermissionDenied(capability) => permission_message(*capability),
            other => other.to_string(),
        };
        self.alert(err.alert_title(), body);
    }

    /// Waits until every alert dispatched so far has been handed to the sink.
    pub async fn flush_alerts(&self) {
        let pending = std::mem::take(&mut *self.pending_alerts());
        for handle in pending {
            if let Err(e) = handle.await {
                warn!("Alert task ended abnormally: {}", e);
            }
        }
    }

    fn begin(&self, op: Operation) -> WorkflowResult<OwnedSemaphorePermit> {
        self.flights.try_acquire(op).ok_or_else(|| {
            let err = WorkflowError::Busy(op);
            self.alert_error(&err);
            err
        })
    }

    /// Ask for the capability behind `kind`, launch the picker and hold the
    /// returned asset.
    ///
    /// Denial returns to the state held on entry. A cancel clears any held
    /// asset without an alert.
    pub async fn request_media(&self, kind: MediaSourceKind) -> WorkflowResult<MediaOutcome> {
        let _flight = self.begin(Operation::RequestMedia)?;
        let entered = self.state();
        let capability = kind.capability();

        self.set_state(WorkflowState::AwaitingPermission);
        if !self.deps.media.request_permission(kind).await.is_granted() {
            self.restore(entered);
            let err = WorkflowError::PermissionDenied(capability);
            self.alert_error(&err);
            return Err(err);
        }

        self.set_state(WorkflowState::SelectingMedia);
        let picked = match self.deps.media.pick_image(kind).await {
            Ok(picked) => picked,
            Err(e) => {
                self.restore(entered);
                debug!("Media picker failed: {:?}", e);
                let err = WorkflowError::MediaSource(e.to_string());
                self.alert_error(&err);
                return Err(err);
            }
        };

        match picked {
            PickResult::Cancelled => {
                info!("User cancelled {} picker", kind);
                self.session().asset = None;
                self.settle();
                Ok(MediaOutcome::Cancelled)
            }
            PickResult::Asset(asset) => {
                if let Err(e) = validate_asset_handle(&asset.handle) {
                    self.restore(entered);
                    warn!("Picker returned an unusable handle: {}", e);
                    self.alert("Error", "Failed to retrieve image URI.");
                    return Err(WorkflowError::InvalidAsset(e.to_string()));
                }

                info!("📷 Image selected: {}", asset.handle);
                self.session().asset = Some(asset.clone());
                self.settle();
                Ok(MediaOutcome::Selected(asset))
            }
        }
    }

    async fn ensure_location_permission(&self) -> bool {
        if self
            .platform
            .assumes_location_granted(self.config.legacy_permission_api_level)
        {
            warn!(
                "Platform API level {:?} predates runtime permissions, assuming location granted",
                self.platform.api_level
            );
            return true;
        }

        if self.deps.location.check_permission().await {
            return true;
        }

        self.set_state(WorkflowState::AwaitingPermission);
        self.deps.location.request_permission().await.is_granted()
    }

    /// Fetch one location fix with a bounded wait.
    ///
    /// The configured timeout is enforced here as well as being passed to the
    /// provider, so a provider that never answers still yields
    /// `LocationTimeout`.
    pub async fn request_location(&self) -> WorkflowResult<GeoFix> {
        let _flight = self.begin(Operation::RequestLocation)?;
        let entered = self.state();

        if !self.ensure_location_permission().await {
            self.restore(entered);
            let err = WorkflowError::PermissionDenied(Capability::Location);
            self.alert_error(&err);
            return Err(err);
        }

        self.set_state(WorkflowState::AwaitingLocation);
        let request = self.config.location_request();
        let outcome =
            tokio::time::timeout(request.timeout, self.deps.location.current_fix(request)).await;

        let fix = match outcome {
            Err(_) | Ok(Err(LocationError::Timeout)) => Err(WorkflowError::LocationTimeout),
            Ok(Err(LocationError::Position { code, message })) => {
                Err(WorkflowError::PositionError { code, message })
            }
            Ok(Ok(fix)) if !fix.is_valid() => Err(WorkflowError::PositionError {
                code: POSITION_UNAVAILABLE,
                message: format!("Provider returned out-of-range coordinates ({})", fix),
            }),
            Ok(Ok(fix)) => Ok(fix),
        };

        let fix = match fix {
            Ok(fix) => fix,
            Err(err) => {
                self.restore(entered);
                self.alert_error(&err);
                return Err(err);
            }
        };

        info!("📍 Location fix: {}", fix);
        {
            let mut session = self.session();
            match self.config.location_recording {
                LocationRecording::LatestOnly => session.history = vec![fix.clone()],
                LocationRecording::AppendLog => session.history.push(fix.clone()),
            }
            session.latest_fix = Some(fix.clone());
        }
        self.settle();

        if let Some(log) = &self.location_log {
            match log.append(&fix).await {
                Ok(()) => {
                    info!("Location saved to: {}", log.path().display());
                    self.alert(
                        "Location Saved",
                        "Location data has been saved to Downloads folder.",
                    );
                }
                Err(e) => {
                    error!("Error saving location data: {:?}", e);
                    self.alert("Error", "Failed to save location data.");
                }
            }
        }

        Ok(fix)
    }

    /// Upload the held asset with the latest fix.
    pub async fn upload_current(&self) -> WorkflowResult<UploadRecord> {
        let (asset, fix) = {
            let session = self.session();
            (session.asset.clone(), session.latest_fix.clone())
        };
        self.upload(asset.as_ref(), fix.as_ref()).await
    }

    /// Store the asset bytes, then write a metadata record pointing at them.
    ///
    /// The two steps form one logical operation for the caller. If the record
    /// write fails after the object was stored, the object is left in place
    /// for out-of-band reconciliation and the upload reports failure.
    pub async fn upload(
        &self,
        asset: Option<&MediaAsset>,
        location: Option<&GeoFix>,
    ) -> WorkflowResult<UploadRecord> {
        let Some(asset) = asset else {
            self.alert("No image to save", "Please capture or select an image first.");
            return Err(WorkflowError::MissingAsset);
        };
        if self.config.require_location && location.is_none() {
            let err = WorkflowError::MissingLocation;
            self.alert_error(&err);
            return Err(err);
        }
        if let Err(e) = validate_asset_handle(&asset.handle) {
            let err = WorkflowError::InvalidAsset(e.to_string());
            self.alert_error(&err);
            return Err(err);
        }

        let _flight = self.begin(Operation::Upload)?;
        self.set_state(WorkflowState::Uploading);

        match self.store(asset, location).await {
            Ok(record) => {
                self.finish_upload(WorkflowState::Succeeded);
                info!("✅ Upload complete: {} (record {})", record.asset_ref, record.id);
                self.alert(
                    "Upload complete",
                    format!(
                        "Stored {} at {}",
                        record.asset_ref,
                        describe_location(record.location.as_ref())
                    ),
                );
                Ok(record)
            }
            Err(err) => {
                self.finish_upload(WorkflowState::Failed);
                error!("Upload failed: {}", err);
                self.alert(
                    err.alert_title(),
                    format!("{} (location: {})", err, describe_location(location)),
                );
                Err(err)
            }
        }
    }

    async fn store(
        &self,
        asset: &MediaAsset,
        location: Option<&GeoFix>,
    ) -> WorkflowResult<UploadRecord> {
        let data = self
            .deps
            .media
            .read_asset(asset)
            .await
            .map_err(|e| WorkflowError::AssetUnavailable(e.to_string()))?;

        validate_asset_size(data.len(), self.config.max_asset_size)
            .map_err(|e| WorkflowError::InvalidAsset(e.to_string()))?;

        let detected = detect_image_type(&data);
        let content_type = detected
            .map(|(mime, _)| mime.to_string())
            .or_else(|| asset.mime_type.clone());
        let extension = detected.map(|(_, ext)| ext).unwrap_or("bin");
        let key = format!("{}/{}.{}", self.config.upload_prefix, Uuid::new_v4(), extension);
        let size = data.len() as i64;

        info!("⬆️  Uploading {} ({} bytes) to {}", asset.handle, size, key);
        let asset_ref = self
            .deps
            .objects
            .put_object(&key, data, content_type.as_deref())
            .await
            .map_err(|source| WorkflowError::UploadFailed {
                stage: UploadStage::ObjectPut,
                source,
            })?;

        self.deps
            .metadata
            .create_record(NewUploadRecord {
                asset_ref: asset_ref.clone(),
                location: location.cloned(),
                content_type,
                size,
            })
            .await
            .map_err(|source| {
                warn!(
                    asset_ref = %asset_ref,
                    "Metadata write failed after object upload; object left for reconciliation"
                );
                WorkflowError::UploadFailed {
                    stage: UploadStage::MetadataWrite,
                    source,
                }
            })
    }

    /// Save the held asset into the device gallery album from config.
    pub async fn save_to_album(&self) -> WorkflowResult<()> {
        let Some(asset) = self.current_asset() else {
            self.alert("No image to save", "Please capture or select an image first.");
            return Err(WorkflowError::MissingAsset);
        };
        let _flight = self.begin(Operation::SaveToAlbum)?;

        if !self.deps.media.request_save_permission().await.is_granted() {
            let err = WorkflowError::PermissionDenied(Capability::MediaLibraryWrite);
            self.alert_error(&err);
            return Err(err);
        }

        let album = &self.config.album_name;
        if let Err(e) = self.deps.media.save_to_album(&asset, album).await {
            error!("Saving to album failed: {:?}", e);
            self.alert("Save Error", "Failed to save the image.");
            return Err(WorkflowError::Save(e.to_string()));
        }

        self.alert(
            "Image saved!",
            format!("The image has been saved to your {}.", album),
        );
        Ok(())
    }
}
