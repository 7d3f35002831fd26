use crate::entities::{prelude::*, upload_records};
use crate::models::{GeoFix, NewUploadRecord, UploadRecord};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

/// Database of upload records referencing stored objects.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist a record; the store assigns the id and the timestamp.
    async fn create_record(&self, record: NewUploadRecord) -> Result<UploadRecord>;
    async fn find_record(&self, id: &str) -> Result<Option<UploadRecord>>;
}

pub struct DbMetadataStore {
    db: DatabaseConnection,
}

impl DbMetadataStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl From<upload_records::Model> for UploadRecord {
    fn from(model: upload_records::Model) -> Self {
        let location = match (model.latitude, model.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoFix {
                latitude,
                longitude,
                accuracy: model.accuracy,
                captured_at: model.location_captured_at.unwrap_or(model.created_at),
            }),
            _ => None,
        };

        UploadRecord {
            id: model.id,
            asset_ref: model.asset_ref,
            location,
            content_type: model.content_type,
            size: model.size,
            timestamp: model.created_at,
        }
    }
}

#[async_trait]
impl MetadataStore for DbMetadataStore {
    async fn create_record(&self, record: NewUploadRecord) -> Result<UploadRecord> {
        let location = record.location.as_ref();
        let model = upload_records::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            asset_ref: Set(record.asset_ref),
            content_type: Set(record.content_type),
            size: Set(record.size),
            latitude: Set(location.map(|l| l.latitude)),
            longitude: Set(location.map(|l| l.longitude)),
            accuracy: Set(location.and_then(|l| l.accuracy)),
            location_captured_at: Set(location.map(|l| l.captured_at)),
            created_at: Set(Utc::now()),
        };

        let saved = model.insert(&self.db).await?;
        tracing::debug!("Created upload record {}", saved.id);
        Ok(saved.into())
    }

    async fn find_record(&self, id: &str) -> Result<Option<UploadRecord>> {
        let found = UploadRecords::find_by_id(id.to_string()).one(&self.db).await?;
        Ok(found.map(Into::into))
    }
}
