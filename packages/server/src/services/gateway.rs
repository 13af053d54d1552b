//! Bounded-time access to the object store holding document files.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::storage::{BoxReader, ObjectKey, ObjectStore, StorageError};
use tracing::{debug, warn};

/// Where an upload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: ObjectKey,
    pub public_url: String,
}

/// Every call to the store goes through here so that each one is bounded by
/// the configured deadline.
#[derive(Clone)]
pub struct DocumentStoreGateway {
    store: Arc<dyn ObjectStore>,
    timeout: Duration,
    signed_url_ttl_secs: u32,
}

impl DocumentStoreGateway {
    pub fn new(store: Arc<dyn ObjectStore>, timeout: Duration, signed_url_ttl_secs: u32) -> Self {
        Self {
            store,
            timeout,
            signed_url_ttl_secs,
        }
    }

    /// Upload `data` for `owner` under a freshly generated key.
    pub async fn put(
        &self,
        owner: &str,
        filename: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let key = ObjectKey::generate(owner, filename)?;
        self.bounded(self.store.put(&key, data, content_type)).await?;
        let public_url = self.store.public_url(&key);
        debug!(key = %key, "Stored object");
        Ok(StoredObject { key, public_url })
    }

    /// Remove an object. A missing object counts as removed.
    pub async fn remove(&self, key: &ObjectKey) -> Result<(), StorageError> {
        match self.bounded(self.store.delete(key)).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(key = %key, "Object already absent");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Time-limited download URL, or the public URL when signing fails.
    pub async fn download_url(&self, key: &ObjectKey) -> String {
        match self
            .bounded(self.store.presign_get(key, self.signed_url_ttl_secs))
            .await
        {
            Ok(url) => url,
            Err(e) => {
                warn!(key = %key, error = %e, "Signing failed, falling back to public URL");
                self.store.public_url(key)
            }
        }
    }

    pub async fn open(&self, key: &ObjectKey) -> Result<BoxReader, StorageError> {
        self.bounded(self.store.get_stream(key)).await
    }

    pub fn verify(&self, key: &ObjectKey, expires: i64, signature: &str) -> bool {
        self.store.verify_presigned(key, expires, signature)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| StorageError::Timeout(self.timeout.as_secs()))?
    }
}
