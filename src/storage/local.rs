use crate::storage::sign;
use crate::storage::validate_key;
use crate::storage::AccessMethod;
use crate::storage::ObjectStore;
use crate::storage::PresignedUrl;
use crate::storage::StorageConfig;
use crate::storage::StorageError;
use chrono::Duration;
use chrono::Utc;
use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use url::Url;

/// Objects stored as files under `<root>/<bucket>/<key>`; access URLs are `file://` URLs.
pub struct LocalObjectStore {
    config: StorageConfig,
}

impl LocalObjectStore {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.config.root.join(&self.config.bucket).join(key))
    }
}

fn io_error(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        key: key.to_owned(),
        source,
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(key))?;
        }
        fs::write(&path, bytes).map_err(io_error(key))?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path(key)?;
        fs::read(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_owned()),
            _ => io_error(key)(source),
        })
    }

    fn presign(&self, key: &str, method: AccessMethod, expires_in: Option<Duration>) -> Result<PresignedUrl, StorageError> {
        let path = std::path::absolute(self.path(key)?).map_err(io_error(key))?;
        let url = Url::from_file_path(&path).map_err(|_| StorageError::InvalidUrl {
            key: key.to_owned(),
            message: format!("'{}' is not representable as a file URL", path.display()),
        })?;
        let expires_at = Utc::now() + expires_in.unwrap_or(self.config.url_expiration);
        Ok(sign(url, method, expires_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(root: &TempDir) -> LocalObjectStore {
        LocalObjectStore::new(StorageConfig::new(root.path(), "excel-integrator"))
    }

    #[test]
    fn puts_and_gets_objects() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        store.put("input/stock.xlsx", b"PK").unwrap();
        assert_eq!(store.get("input/stock.xlsx").unwrap(), b"PK");
        assert!(root.path().join("excel-integrator/input/stock.xlsx").is_file());

        store.put("input/stock.xlsx", b"PK2").unwrap();
        assert_eq!(store.get("input/stock.xlsx").unwrap(), b"PK2");
    }

    #[test]
    fn missing_object_is_not_found() {
        let root = TempDir::new().unwrap();
        assert!(matches!(store(&root).get("input/none.xlsx"), Err(StorageError::NotFound(key)) if key == "input/none.xlsx"));
    }

    #[test]
    fn rejects_keys_outside_the_bucket() {
        let root = TempDir::new().unwrap();
        assert!(matches!(store(&root).put("../escape.xlsx", b""), Err(StorageError::InvalidKey(_))));
        assert!(!root.path().join("escape.xlsx").exists());
    }

    #[test]
    fn presigns_file_urls() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        let url = store.presign("output/processed_stock.xlsx", AccessMethod::Get, None).unwrap();
        assert_eq!(url.url.scheme(), "file");
        assert!(url.url.path().ends_with("/excel-integrator/output/processed_stock.xlsx"));
        assert_eq!(url.method, AccessMethod::Get);
        let remaining = url.expires_at - Utc::now();
        assert!(remaining <= Duration::hours(1) && remaining > Duration::minutes(59));

        let short = store.presign("input/a.xlsx", AccessMethod::Put, Some(Duration::seconds(30))).unwrap();
        assert!(short.url.query().unwrap_or_default().starts_with("method=PUT&expires="));
        assert!(short.expires_at - Utc::now() <= Duration::seconds(30));
    }
}
