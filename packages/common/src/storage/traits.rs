use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::key::ObjectKey;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Key-addressed object storage for uploaded documents.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`. Existing objects are never overwritten.
    async fn put(
        &self,
        key: &ObjectKey,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Retrieve an object as a streaming async reader.
    async fn get_stream(&self, key: &ObjectKey) -> Result<BoxReader, StorageError>;

    /// Retrieve all bytes of an object.
    async fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(key).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn delete(&self, key: &ObjectKey) -> Result<bool, StorageError>;

    /// Permanent, unauthenticated URL of an object.
    fn public_url(&self, key: &ObjectKey) -> String;

    /// Time-limited download URL of an object.
    async fn presign_get(&self, key: &ObjectKey, ttl_secs: u32) -> Result<String, StorageError>;

    /// Check a signature previously issued by [`ObjectStore::presign_get`].
    ///
    /// Backends whose URLs are verified elsewhere (e.g. by S3 itself) reject
    /// everything.
    fn verify_presigned(&self, _key: &ObjectKey, _expires: i64, _signature: &str) -> bool {
        false
    }
}
