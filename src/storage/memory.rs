use crate::storage::sign;
use crate::storage::validate_key;
use crate::storage::AccessMethod;
use crate::storage::ObjectStore;
use crate::storage::PresignedUrl;
use crate::storage::StorageConfig;
use crate::storage::StorageError;
use chrono::Duration;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use url::Url;

/// Process-local store issuing `memory://<bucket>/<key>` URLs. The configured root is unused.
pub struct MemoryObjectStore {
    config: StorageConfig,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Stored keys in lexical order.
    pub fn keys(&self) -> Vec<String> {
        let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = objects.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        objects.insert(key.to_owned(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        objects.get(key).cloned().ok_or_else(|| StorageError::NotFound(key.to_owned()))
    }

    fn presign(&self, key: &str, method: AccessMethod, expires_in: Option<Duration>) -> Result<PresignedUrl, StorageError> {
        validate_key(key)?;
        let url = Url::parse(&format!("memory://{}/{}", self.config.bucket, key)).map_err(|e| StorageError::InvalidUrl {
            key: key.to_owned(),
            message: e.to_string(),
        })?;
        let expires_at = Utc::now() + expires_in.unwrap_or(self.config.url_expiration);
        Ok(sign(url, method, expires_at))
    }
}
