use std::env;
use std::path::PathBuf;

/// Where the process runs, which decides the local storage root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// Long-lived host: files live under the project directory.
    Persistent,
    /// Serverless host: only the temp directory is writable.
    Ephemeral,
}

impl HostKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "persistent" => Some(Self::Persistent),
            "ephemeral" | "serverless" => Some(Self::Ephemeral),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persistent => "persistent",
            Self::Ephemeral => "ephemeral",
        }
    }
}

/// Connection settings for the S3-compatible blob mirror
#[derive(Debug, Clone)]
pub struct BlobSettings {
    /// Token whose presence turns the mirror on
    pub token: String,
    pub endpoint: Option<String>,
    pub bucket: String,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Base of the public URLs handed back to clients
    pub public_base_url: String,
    /// Prefix substituted for the local storage namespace in object keys
    pub namespace: String,
}

/// Process-wide storage configuration, resolved once at startup
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub host_kind: HostKind,

    /// Project directory used as the parent of `storage/` on a persistent host
    pub project_dir: PathBuf,

    /// Root under which every local file is written
    pub storage_root: PathBuf,

    /// Blob mirror settings, `None` when `BLOB_READ_WRITE_TOKEN` is unset
    pub blob: Option<BlobSettings>,

    /// Maximum upload size in bytes (default: 10 MB)
    pub max_file_size: usize,

    /// JWT secret used to verify bearer tokens
    pub jwt_secret: String,

    /// Allowed CORS origins (comma separated in the environment)
    pub allowed_origins: Vec<String>,
}

pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
pub const DEFAULT_BLOB_NAMESPACE: &str = "uploads";

impl Default for StorageConfig {
    fn default() -> Self {
        let project_dir = PathBuf::from(".");
        Self {
            host_kind: HostKind::Persistent,
            storage_root: storage_root_for(HostKind::Persistent, &project_dir),
            project_dir,
            blob: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            jwt_secret: "secret".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

/// Persistent hosts keep files next to the project, ephemeral ones in the temp dir.
pub fn storage_root_for(host_kind: HostKind, project_dir: &std::path::Path) -> PathBuf {
    match host_kind {
        HostKind::Persistent => project_dir.join("storage"),
        HostKind::Ephemeral => env::temp_dir().join("storage"),
    }
}

impl StorageConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        let host_kind = env::var("STORAGE_HOST_KIND")
            .ok()
            .and_then(|v| HostKind::parse(&v))
            .unwrap_or_else(|| {
                if env::var("VERCEL").is_ok() {
                    HostKind::Ephemeral
                } else {
                    default.host_kind
                }
            });

        let project_dir = env::var("PROJECT_DIR")
            .map(PathBuf::from)
            .or_else(|_| env::current_dir())
            .unwrap_or(default.project_dir);

        Self {
            host_kind,
            storage_root: storage_root_for(host_kind, &project_dir),
            project_dir,
            blob: blob_settings_from_env(),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Local-only configuration rooted at `storage_root`, used by tests and local runs
    pub fn development(storage_root: PathBuf) -> Self {
        Self {
            storage_root,
            jwt_secret: "dev_secret".to_string(),
            ..Self::default()
        }
    }

    /// Same as [`StorageConfig::from_env`] but refuses to start without a real JWT secret
    pub fn production() -> anyhow::Result<Self> {
        let config = Self::from_env();
        if env::var("JWT_SECRET").is_err() {
            anyhow::bail!("JWT_SECRET must be set in production");
        }
        Ok(config)
    }

    pub fn blob_enabled(&self) -> bool {
        self.blob.is_some()
    }
}

fn blob_settings_from_env() -> Option<BlobSettings> {
    let token = env::var("BLOB_READ_WRITE_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())?;

    let bucket = env::var("BLOB_BUCKET").unwrap_or_else(|_| "blood-donor".to_string());
    let endpoint = env::var("BLOB_ENDPOINT").ok();
    let public_base_url = env::var("BLOB_PUBLIC_BASE_URL").unwrap_or_else(|_| match &endpoint {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        None => format!("https://{}.s3.amazonaws.com", bucket),
    });

    Some(BlobSettings {
        token,
        endpoint,
        bucket,
        region: env::var("BLOB_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        access_key: env::var("BLOB_ACCESS_KEY").ok(),
        secret_key: env::var("BLOB_SECRET_KEY").ok(),
        public_base_url,
        namespace: env::var("BLOB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_BLOB_NAMESPACE.to_string()),
    })
}
