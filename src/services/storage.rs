use crate::models::{StoredFile, UploadKind};
use async_trait::async_trait;
use chrono::Utc;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// URL prefix under which locally stored files are served
pub const LOCAL_URL_PREFIX: &str = "/api/storage/";

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub kind: UploadKind,
    /// Already-normalized folder below the kind's namespace
    pub folder: String,
    pub content_type: String,
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn store(
        &self,
        data: &[u8],
        filename: &str,
        options: &StoreOptions,
    ) -> StorageResult<StoredFile>;
    async fn exists(&self, key: &str) -> StorageResult<bool>;
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;
    async fn delete(&self, key: &str) -> StorageResult<()>;
    async fn health_check(&self) -> bool;
}

/// Writes files below a root directory on the local filesystem
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        let clean = key.trim_start_matches('/');
        if clean.is_empty() || clean.split(['/', '\\']).any(|s| s == "..") {
            return Err(StorageError::InvalidPath(key.to_string()));
        }
        Ok(self.root.join(clean))
    }

    async fn ensure_parent_dir(&self, file_path: &Path) -> StorageResult<()> {
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn store(
        &self,
        data: &[u8],
        filename: &str,
        options: &StoreOptions,
    ) -> StorageResult<StoredFile> {
        let key = format!(
            "{}/{}/{}",
            options.kind.namespace(),
            options.folder,
            filename
        );
        let file_path = self.resolve(&key)?;

        self.ensure_parent_dir(&file_path).await?;
        fs::write(&file_path, data).await?;

        debug!("Stored {} bytes at {:?}", data.len(), file_path);

        Ok(StoredFile {
            url: local_url(&key),
            key,
            filename: filename.to_string(),
            content_type: options.content_type.clone(),
            size: data.len() as u64,
            hash: hex::encode(Sha256::digest(data)),
            uploaded_at: Utc::now(),
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let file_path = self.resolve(key)?;
        match fs::try_exists(&file_path).await {
            Ok(found) => Ok(found),
            // A regular file used as a directory component
            Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let file_path = self.resolve(key)?;

        let canonical = match fs::canonicalize(&file_path).await {
            Ok(path) => path,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
                ) =>
            {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let root = fs::canonicalize(&self.root).await?;

        // Symlinks may still point outside the root
        if !canonical.starts_with(&root) {
            return Err(StorageError::InvalidPath(format!(
                "Path outside storage root: {}",
                key
            )));
        }

        let data = fs::read(&canonical).await?;
        debug!("Read {} bytes from {:?}", data.len(), canonical);
        Ok(data)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let file_path = self.resolve(key)?;
        match fs::remove_file(&file_path).await {
            Ok(()) => {
                debug!("Removed {:?}", file_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn health_check(&self) -> bool {
        if fs::create_dir_all(&self.root).await.is_err() {
            return false;
        }
        match fs::metadata(&self.root).await {
            Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
            Err(_) => false,
        }
    }
}

/// Retrieval URL for a storage key, one percent-encoded segment at a time
pub fn local_url(key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect();
    format!("{}{}", LOCAL_URL_PREFIX, encoded.join("/"))
}

/// Content type served for a stored file, from its extension
pub fn detect_content_type(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Content type served for a storage key. Everything under the report
/// namespace was accepted as PDF, whatever its name.
pub fn served_content_type(key: &str) -> &'static str {
    let namespace = key.split('/').next().unwrap_or("");
    if namespace == UploadKind::Report.namespace() {
        return "application/pdf";
    }
    detect_content_type(key)
}

/// File extension matching an accepted media type
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "application/pdf" => Some("pdf"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}
