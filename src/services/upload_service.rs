use crate::api::error::AppError;
use crate::config::StorageConfig;
use crate::models::{StoredFile, UploadKind, UploadRequest};
use crate::services::blob::BlobMirror;
use crate::services::storage::{
    StorageBackend, StoreOptions, detect_content_type, extension_for,
};
use crate::utils::validation::{
    normalize_folder, sanitize_filename, validate_file_size, validate_mime_type,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Validate, store locally, then hand the result to the mirror.
pub struct UploadService {
    storage: Arc<dyn StorageBackend>,
    mirror: Arc<dyn BlobMirror>,
    config: Arc<StorageConfig>,
}

impl UploadService {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        mirror: Arc<dyn BlobMirror>,
        config: Arc<StorageConfig>,
    ) -> Self {
        Self {
            storage,
            mirror,
            config,
        }
    }

    pub async fn upload(
        &self,
        kind: UploadKind,
        req: UploadRequest,
    ) -> Result<StoredFile, AppError> {
        validate_mime_type(&req.content_type, kind)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        validate_file_size(req.data.len(), self.config.max_file_size)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let filename =
            sanitize_filename(&req.filename).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let filename = match kind {
            UploadKind::Media => with_media_extension(filename, &req.content_type),
            UploadKind::Report => filename,
        };
        let folder = normalize_folder(req.folder.as_deref(), kind.default_folder())
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let options = StoreOptions {
            kind,
            folder,
            content_type: req.content_type,
        };

        // Storage failures are reported to the caller as-is
        let stored = self
            .storage
            .store(&req.data, &filename, &options)
            .await
            .map_err(|e| {
                warn!("Local store failed for {}: {}", filename, e);
                AppError::BadRequest(e.to_string())
            })?;

        let key = stored.key.clone();
        let stored = match self.mirror.promote(stored).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Blob mirror failed for {}: {}", key, e);
                if let Err(cleanup) = self.storage.delete(&key).await {
                    warn!("Failed to remove local copy {}: {}", key, cleanup);
                }
                return Err(AppError::BadRequest(e.to_string()));
            }
        };

        info!(
            "📄 Stored {} ({} bytes) at {}",
            stored.key, stored.size, stored.url
        );
        Ok(stored)
    }
}

/// Media is served by extension, so the stored name must carry one matching its type.
fn with_media_extension(filename: String, content_type: &str) -> String {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    match extension_for(&normalized) {
        Some(ext) if detect_content_type(&filename) != normalized => {
            format!("{}.{}", filename, ext)
        }
        _ => filename,
    }
}
