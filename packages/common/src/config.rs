use std::path::PathBuf;

use serde::Deserialize;

/// Which object store backs document uploads.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    S3,
}

/// S3-compatible bucket settings. Only read when `backend = "s3"`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct S3Config {
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// Custom endpoint for MinIO and friends. Empty means AWS.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub path_style: bool,
}

fn default_s3_region() -> String {
    "us-east-1".into()
}

/// Object storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory of the filesystem backend. Default: "./data/objects".
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
    /// Prefix of public object URLs. Default: "http://127.0.0.1:3000/api/v1/files".
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// HMAC key for filesystem-backend signed URLs.
    #[serde(default = "default_signing_secret")]
    pub signing_secret: String,
    /// Largest accepted upload in bytes. Default: 50 MiB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
    /// Upper bound for any single store call. Default: 30.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Lifetime of download URLs. Default: 60.
    #[serde(default = "default_signed_url_ttl_secs")]
    pub signed_url_ttl_secs: u32,
    #[serde(default)]
    pub s3: S3Config,
}

fn default_base_path() -> PathBuf {
    PathBuf::from("./data/objects")
}
fn default_public_base_url() -> String {
    "http://127.0.0.1:3000/api/v1/files".into()
}
fn default_signing_secret() -> String {
    "change-me".into()
}
fn default_max_upload_size() -> u64 {
    50 * 1024 * 1024
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_signed_url_ttl_secs() -> u32 {
    60
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            base_path: default_base_path(),
            public_base_url: default_public_base_url(),
            signing_secret: default_signing_secret(),
            max_upload_size: default_max_upload_size(),
            timeout_secs: default_timeout_secs(),
            signed_url_ttl_secs: default_signed_url_ttl_secs(),
            s3: S3Config::default(),
        }
    }
}
