use crate::models::StoredFile;
use crate::services::storage::{LOCAL_URL_PREFIX, StorageBackend, StorageError, StorageResult};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tracing::info;

/// Object store the mirror publishes to
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_public(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;
}

pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_public(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let res = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 put_object failed: bucket={}, key={}, error={:?}",
                self.bucket,
                key,
                e
            );
            return Err(StorageError::Backend(e.to_string()));
        }
        Ok(())
    }
}

/// Optional publishing step applied after a local store
#[async_trait]
pub trait BlobMirror: Send + Sync {
    async fn promote(&self, local: StoredFile) -> StorageResult<StoredFile>;
    fn is_enabled(&self) -> bool;
}

/// Used when no blob token is configured: returns its input unchanged
pub struct PassthroughMirror;

#[async_trait]
impl BlobMirror for PassthroughMirror {
    async fn promote(&self, local: StoredFile) -> StorageResult<StoredFile> {
        Ok(local)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Re-reads the local copy and publishes it under the cloud namespace
pub struct CloudMirror {
    local: Arc<dyn StorageBackend>,
    store: Arc<dyn BlobStore>,
    namespace: String,
    public_base_url: String,
}

impl CloudMirror {
    pub fn new(
        local: Arc<dyn StorageBackend>,
        store: Arc<dyn BlobStore>,
        namespace: String,
        public_base_url: String,
    ) -> Self {
        Self {
            local,
            store,
            namespace,
            public_base_url,
        }
    }
}

#[async_trait]
impl BlobMirror for CloudMirror {
    async fn promote(&self, local: StoredFile) -> StorageResult<StoredFile> {
        let data = self.local.read(&local.key).await?;
        let key = cloud_key(&local.url, &self.namespace)?;

        self.store
            .put_public(&key, data, &local.content_type)
            .await?;

        let url = format!("{}/{}", self.public_base_url.trim_end_matches('/'), key);
        info!("☁️  Mirrored {} to {}", local.key, url);

        Ok(StoredFile { url, ..local })
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Swaps the local URL prefix for the cloud namespace.
pub fn cloud_key(local_url: &str, namespace: &str) -> StorageResult<String> {
    let suffix = local_url.strip_prefix(LOCAL_URL_PREFIX).ok_or_else(|| {
        StorageError::InvalidPath(format!("Not a local storage URL: {}", local_url))
    })?;
    let suffix = percent_decode_str(suffix)
        .decode_utf8()
        .map_err(|e| StorageError::InvalidPath(e.to_string()))?;

    let namespace = namespace.trim_matches('/');
    if namespace.is_empty() {
        return Ok(suffix.into_owned());
    }
    Ok(format!("{}/{}", namespace, suffix))
}
