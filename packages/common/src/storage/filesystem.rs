use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::BufReader;

use super::error::StorageError;
use super::key::ObjectKey;
use super::signing::UrlSigner;
use super::traits::{BoxReader, ObjectStore};

/// Filesystem-backed object store.
///
/// Objects live at `{base_path}/{key}`. Writes go through a temp file in
/// `{base_path}/.tmp` and are renamed into place, so readers never observe a
/// partially written object.
pub struct FilesystemObjectStore {
    base_path: PathBuf,
    max_size: u64,
    signer: UrlSigner,
}

impl FilesystemObjectStore {
    /// Create a new filesystem object store.
    pub async fn new(
        base_path: PathBuf,
        max_size: u64,
        signer: UrlSigner,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
            signer,
        })
    }

    fn object_path(&self, key: &ObjectKey) -> PathBuf {
        self.base_path.join(key.as_str())
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put(
        &self,
        key: &ObjectKey,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let object_path = self.object_path(key);
        if fs::try_exists(&object_path).await? {
            return Err(StorageError::Backend(format!("object already exists: {key}")));
        }

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, &data).await {
            discard_temp(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &object_path).await {
            discard_temp(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn get_stream(&self, key: &ObjectKey) -> Result<BoxReader, StorageError> {
        match fs::File::open(self.object_path(key)).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        match fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, key: &ObjectKey) -> String {
        self.signer.public_url(key)
    }

    async fn presign_get(&self, key: &ObjectKey, ttl_secs: u32) -> Result<String, StorageError> {
        if !fs::try_exists(self.object_path(key)).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(self.signer.sign(key, ttl_secs, Utc::now().timestamp()))
    }

    fn verify_presigned(&self, key: &ObjectKey, expires: i64, signature: &str) -> bool {
        self.signer
            .verify(key, expires, signature, Utc::now().timestamp())
    }
}

async fn discard_temp(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
    }
}
