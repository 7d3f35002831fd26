use crate::config::WorkflowConfig;
use crate::services::storage::{LocalObjectStore, ObjectStore, S3ObjectStore};
use anyhow::{Context, anyhow};
use aws_sdk_s3::config::Region;
use std::env;
use std::sync::Arc;
use tracing::info;

pub async fn setup_object_store(config: &WorkflowConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.storage_backend.as_str() {
        "s3" => Ok(Arc::new(setup_s3().await?)),
        "local" => {
            info!(
                "🗄️  Local Storage: {}",
                config.local_storage_dir.display()
            );
            tokio::fs::create_dir_all(&config.local_storage_dir).await?;
            Ok(Arc::new(LocalObjectStore::new(&config.local_storage_dir)))
        }
        other => Err(anyhow!("Unknown STORAGE_BACKEND '{}'", other)),
    }
}

async fn setup_s3() -> anyhow::Result<S3ObjectStore> {
    let endpoint_url = env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT must be set")?;
    let access_key = env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY must be set")?;
    let secret_key = env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY must be set")?;
    let bucket = env::var("MINIO_BUCKET").context("MINIO_BUCKET must be set")?;
    let region = env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string());

    info!("☁️  S3 Storage: {} (Bucket: {})", endpoint_url, bucket);

    let aws_config = aws_config::from_env()
        .endpoint_url(&endpoint_url)
        .region(Region::new(region))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Ensure bucket exists
    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
        Err(_) => {
            info!("🪣 Bucket '{}' not found, creating...", bucket);
            if let Err(e) = s3_client.create_bucket().bucket(&bucket).send().await {
                tracing::error!("❌ Failed to create bucket '{}': {}", bucket, e);
            } else {
                info!("✅ Bucket '{}' created successfully", bucket);
            }
        }
    }

    Ok(S3ObjectStore::new(s3_client, bucket))
}
