#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use capture_upload::infrastructure::database::run_migrations;
use capture_upload::models::{
    GeoFix, LocationRequest, MediaAsset, MediaSourceKind, NewUploadRecord, PermissionStatus,
    PickResult, UploadRecord,
};
use capture_upload::services::location::{LocationError, LocationSource, PlatformInfo};
use capture_upload::services::media::MediaSource;
use capture_upload::services::metadata::{DbMetadataStore, MetadataStore};
use capture_upload::services::notification::NotificationSink;
use capture_upload::services::storage::ObjectStore;
use capture_upload::{CaptureUploadWorkflow, Collaborators, WorkflowConfig};
use sea_orm::Database;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

pub const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];

pub const ASSET_HANDLE: &str = "file:///data/user/0/cache/ImagePicker/photo.jpg";
pub const SECOND_HANDLE: &str = "file:///data/user/0/cache/Camera/IMG_0002.jpg";

/// `(entered, release)` pair: the fake signals `entered`, then blocks until
/// `release` is notified.
pub type Gate = (Arc<Notify>, Arc<Notify>);

pub fn gate() -> Gate {
    (Arc::new(Notify::new()), Arc::new(Notify::new()))
}

async fn pass_gate(gate: &Option<Gate>) {
    if let Some((entered, release)) = gate {
        entered.notify_one();
        release.notified().await;
    }
}

pub struct FakeMediaSource {
    pub permission: Mutex<PermissionStatus>,
    pub save_permission: PermissionStatus,
    pub pick: Mutex<Result<PickResult, String>>,
    pub bytes: Bytes,
    pub pick_calls: AtomicUsize,
    pub saved: Mutex<Vec<(String, String)>>,
    /// When set, `pick_image` signals `entered` and waits for `release`.
    pub gate: Option<Gate>,
    /// Same, for `save_to_album`.
    pub save_gate: Option<Gate>,
}

impl FakeMediaSource {
    pub fn with_asset(handle: &str) -> Self {
        Self {
            permission: Mutex::new(PermissionStatus::Granted),
            save_permission: PermissionStatus::Granted,
            pick: Mutex::new(Ok(PickResult::Asset(MediaAsset::new(handle)))),
            bytes: Bytes::from_static(JPEG_BYTES),
            pick_calls: AtomicUsize::new(0),
            saved: Mutex::new(Vec::new()),
            gate: None,
            save_gate: None,
        }
    }

    pub fn cancelling() -> Self {
        let source = Self::with_asset(ASSET_HANDLE);
        *source.pick.lock().unwrap() = Ok(PickResult::Cancelled);
        source
    }

    pub fn denying() -> Self {
        let source = Self::with_asset(ASSET_HANDLE);
        *source.permission.lock().unwrap() = PermissionStatus::Denied;
        source
    }

    pub fn set_pick(&self, pick: PickResult) {
        *self.pick.lock().unwrap() = Ok(pick);
    }

    pub fn set_permission(&self, status: PermissionStatus) {
        *self.permission.lock().unwrap() = status;
    }

    pub fn pick_calls(&self) -> usize {
        self.pick_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for FakeMediaSource {
    async fn request_permission(&self, _kind: MediaSourceKind) -> PermissionStatus {
        *self.permission.lock().unwrap()
    }

    async fn pick_image(&self, _kind: MediaSourceKind) -> Result<PickResult> {
        self.pick_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.gate).await;
        self.pick.lock().unwrap().clone().map_err(|e| anyhow!(e))
    }

    async fn read_asset(&self, _asset: &MediaAsset) -> Result<Bytes> {
        Ok(self.bytes.clone())
    }

    async fn request_save_permission(&self) -> PermissionStatus {
        self.save_permission
    }

    async fn save_to_album(&self, asset: &MediaAsset, album: &str) -> Result<()> {
        pass_gate(&self.save_gate).await;
        self.saved
            .lock()
            .unwrap()
            .push((asset.handle.clone(), album.to_string()));
        Ok(())
    }
}

#[derive(Clone)]
pub enum FixBehavior {
    Fix(f64, f64),
    Timeout,
    Position(i32, String),
    /// Never answers.
    Hang,
}

pub struct FakeLocationSource {
    pub already_granted: bool,
    pub grant_on_request: bool,
    pub behavior: Mutex<FixBehavior>,
    pub check_calls: AtomicUsize,
    pub request_calls: AtomicUsize,
    pub fix_calls: AtomicUsize,
    pub last_request: Mutex<Option<LocationRequest>>,
    pub gate: Option<Gate>,
}

impl FakeLocationSource {
    pub fn new(behavior: FixBehavior) -> Self {
        Self {
            already_granted: true,
            grant_on_request: true,
            behavior: Mutex::new(behavior),
            check_calls: AtomicUsize::new(0),
            request_calls: AtomicUsize::new(0),
            fix_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            gate: None,
        }
    }

    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self::new(FixBehavior::Fix(latitude, longitude))
    }

    pub fn set_behavior(&self, behavior: FixBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }
}

#[async_trait]
impl LocationSource for FakeLocationSource {
    async fn check_permission(&self) -> bool {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.already_granted
    }

    async fn request_permission(&self) -> PermissionStatus {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        if self.grant_on_request {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }

    async fn current_fix(&self, request: LocationRequest) -> Result<GeoFix, LocationError> {
        self.fix_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        pass_gate(&self.gate).await;
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            FixBehavior::Fix(lat, lon) => Ok(GeoFix::new(lat, lon)),
            FixBehavior::Timeout => Err(LocationError::Timeout),
            FixBehavior::Position(code, message) => Err(LocationError::Position { code, message }),
            FixBehavior::Hang => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    pub objects: Mutex<HashMap<String, Bytes>>,
    pub put_calls: AtomicUsize,
    pub fail_puts: bool,
    pub gate: Option<Gate>,
}

impl InMemoryObjectStore {
    pub fn failing() -> Self {
        Self {
            fail_puts: true,
            ..Self::default()
        }
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        _content_type: Option<&str>,
    ) -> Result<String> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.gate).await;
        if self.fail_puts {
            return Err(anyhow!("bucket unavailable"));
        }
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(key.to_string())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("no such key: {}", key))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}

#[derive(Default)]
pub struct InMemoryMetadataStore {
    pub records: Mutex<Vec<UploadRecord>>,
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create_record(&self, record: NewUploadRecord) -> Result<UploadRecord> {
        let mut records = self.records.lock().unwrap();
        let created = UploadRecord {
            id: format!("rec-{}", records.len() + 1),
            asset_ref: record.asset_ref,
            location: record.location,
            content_type: record.content_type,
            size: record.size,
            timestamp: chrono::Utc::now(),
        };
        records.push(created.clone());
        Ok(created)
    }

    async fn find_record(&self, id: &str) -> Result<Option<UploadRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }
}

pub struct FailingMetadataStore;

#[async_trait]
impl MetadataStore for FailingMetadataStore {
    async fn create_record(&self, _record: NewUploadRecord) -> Result<UploadRecord> {
        Err(anyhow!("database is locked"))
    }

    async fn find_record(&self, _id: &str) -> Result<Option<UploadRecord>> {
        Ok(None)
    }
}

pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<(String, String)>,
}

impl RecordingNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.tx.send((title.to_string(), body.to_string()))?;
        Ok(())
    }
}

/// Waits for the next detached alert.
pub async fn next_alert(rx: &mut mpsc::UnboundedReceiver<(String, String)>) -> (String, String) {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for alert")
        .expect("notifier dropped")
}

/// Lets spawned alert tasks run, then asserts none were sent.
pub async fn assert_no_alert(rx: &mut mpsc::UnboundedReceiver<(String, String)>) {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(rx.try_recv().is_err(), "unexpected alert");
}

pub async fn sqlite_metadata() -> Arc<DbMetadataStore> {
    let _ = tracing_subscriber::fmt::try_init();
    let db = Database::connect("sqlite::memory:").await.unwrap();
    run_migrations(&db).await.unwrap();
    Arc::new(DbMetadataStore::new(db))
}

pub struct Harness {
    pub workflow: Arc<CaptureUploadWorkflow>,
    pub media: Arc<FakeMediaSource>,
    pub location: Arc<FakeLocationSource>,
    pub objects: Arc<InMemoryObjectStore>,
    pub alerts: mpsc::UnboundedReceiver<(String, String)>,
}

pub struct HarnessBuilder {
    pub media: FakeMediaSource,
    pub location: FakeLocationSource,
    pub objects: InMemoryObjectStore,
    pub metadata: Option<Arc<dyn MetadataStore>>,
    pub config: WorkflowConfig,
    pub platform: PlatformInfo,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            media: FakeMediaSource::with_asset(ASSET_HANDLE),
            location: FakeLocationSource::at(37.4, -122.1),
            objects: InMemoryObjectStore::default(),
            metadata: None,
            config: WorkflowConfig::default(),
            platform: PlatformInfo::default(),
        }
    }

    pub fn media(mut self, media: FakeMediaSource) -> Self {
        self.media = media;
        self
    }

    pub fn location(mut self, location: FakeLocationSource) -> Self {
        self.location = location;
        self
    }

    pub fn objects(mut self, objects: InMemoryObjectStore) -> Self {
        self.objects = objects;
        self
    }

    pub fn metadata(mut self, metadata: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn platform(mut self, platform: PlatformInfo) -> Self {
        self.platform = platform;
        self
    }

    pub async fn build(self) -> Harness {
        let media = Arc::new(self.media);
        let location = Arc::new(self.location);
        let objects = Arc::new(self.objects);
        let metadata = match self.metadata {
            Some(metadata) => metadata,
            None => sqlite_metadata().await,
        };
        let (notifier, alerts) = RecordingNotifier::new();

        let deps = Collaborators {
            media: media.clone(),
            location: location.clone(),
            objects: objects.clone(),
            metadata,
            notifier: Arc::new(notifier),
        };

        Harness {
            workflow: Arc::new(
                CaptureUploadWorkflow::new(deps, self.config).with_platform(self.platform),
            ),
            media,
            location,
            objects,
            alerts,
        }
    }
}
