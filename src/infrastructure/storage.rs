use crate::config::{BlobSettings, StorageConfig};
use crate::services::blob::{BlobMirror, CloudMirror, PassthroughMirror, S3BlobStore};
use crate::services::storage::{LocalStorage, StorageBackend};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    tokio::fs::create_dir_all(&config.storage_root).await?;
    info!(
        "💾 Local storage: {} ({} host)",
        config.storage_root.display(),
        config.host_kind.as_str()
    );
    Ok(Arc::new(LocalStorage::new(config.storage_root.clone())))
}

/// Chooses the mirror once for the lifetime of the process.
pub async fn setup_mirror(
    config: &StorageConfig,
    local: Arc<dyn StorageBackend>,
) -> Arc<dyn BlobMirror> {
    match &config.blob {
        Some(blob) => {
            info!(
                "☁️  Blob mirror enabled: bucket={}, namespace={}",
                blob.bucket, blob.namespace
            );
            let client = build_s3_client(blob).await;
            Arc::new(CloudMirror::new(
                local,
                Arc::new(S3BlobStore::new(client, blob.bucket.clone())),
                blob.namespace.clone(),
                blob.public_base_url.clone(),
            ))
        }
        None => {
            info!("☁️  Blob mirror disabled (BLOB_READ_WRITE_TOKEN not set)");
            Arc::new(PassthroughMirror)
        }
    }
}

async fn build_s3_client(blob: &BlobSettings) -> aws_sdk_s3::Client {
    let mut loader = aws_config::from_env().region(Region::new(blob.region.clone()));

    if let Some(endpoint) = &blob.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    if let (Some(access_key), Some(secret_key)) = (&blob.access_key, &blob.secret_key) {
        loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    let aws_config = loader.load().await;

    // Custom endpoints (MinIO and friends) need path-style addressing
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(blob.endpoint.is_some())
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
