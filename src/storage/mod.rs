//! # Object Storage
//!
//! Where uploaded workbooks and consolidated outputs live between the steps of a job, and how
//! time-limited access URLs to them are issued.
//!
//! Every store owns its [`StorageConfig`]; there is no process-wide client.
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use std::fmt::Display;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

pub mod local;
pub mod memory;
pub mod naming;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

/// Lifetime of an access URL unless the caller asks for another.
pub const DEFAULT_URL_EXPIRATION_SECONDS: i64 = 3_600;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object '{0}' does not exist")]
    NotFound(String),

    /// Empty, absolute or escaping the bucket
    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("Cannot build access URL for '{key}': {message}")]
    InvalidUrl { key: String, message: String },

    #[error("Storage access to '{key}' failed: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Operation an access URL grants.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessMethod {
    Get,
    Put,
}

impl Display for AccessMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessMethod::Get => write!(f, "GET"),
            AccessMethod::Put => write!(f, "PUT"),
        }
    }
}

/// A URL granting one operation on one object until `expires_at`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresignedUrl {
    pub url: Url,
    pub method: AccessMethod,
    pub expires_at: DateTime<Utc>,
}

impl PresignedUrl {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory holding the buckets of a local store
    pub root: PathBuf,
    pub bucket: String,
    pub url_expiration: Duration,
}

impl StorageConfig {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
            url_expiration: Duration::seconds(DEFAULT_URL_EXPIRATION_SECONDS),
        }
    }

    pub fn with_url_expiration(mut self, url_expiration: Duration) -> Self {
        self.url_expiration = url_expiration;
        self
    }
}

/// Durable object storage with time-limited access URLs.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Issues a URL granting `method` on `key`. `expires_in` defaults to the configured expiration.
    fn presign(&self, key: &str, method: AccessMethod, expires_in: Option<Duration>) -> Result<PresignedUrl, StorageError>;
}

/// Accepts relative keys made of plain path segments.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let is_valid = !key.is_empty()
        && !key.contains('\\')
        && Path::new(key).components().all(|component| matches!(component, Component::Normal(_)));
    if is_valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_owned()))
    }
}

/// Appends the granted method and expiry, as a unix timestamp, to an object URL.
pub(crate) fn sign(mut url: Url, method: AccessMethod, expires_at: DateTime<Utc>) -> PresignedUrl {
    url.query_pairs_mut()
        .append_pair("method", &method.to_string())
        .append_pair("expires", &expires_at.timestamp().to_string());
    PresignedUrl { url, method, expires_at }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_stay_inside_the_bucket() {
        assert!(validate_key("input/stock.xlsx").is_ok());
        assert!(validate_key("output/processed_stock.xlsx").is_ok());
        for key in ["", "/etc/passwd", "../secret", "input/../../x", "./input", "a\\b"] {
            assert!(matches!(validate_key(key), Err(StorageError::InvalidKey(_))), "{}", key);
        }
    }

    #[test]
    fn presigned_urls_expire() {
        let issued = Utc::now();
        let url = sign(
            Url::parse("memory://bucket/input/a.xlsx").unwrap(),
            AccessMethod::Put,
            issued + Duration::seconds(DEFAULT_URL_EXPIRATION_SECONDS),
        );
        assert_eq!(url.url.query(), Some(format!("method=PUT&expires={}", url.expires_at.timestamp()).as_str()));
        assert!(!url.is_expired(issued));
        assert!(url.is_expired(issued + Duration::hours(1)));
    }

    #[test]
    fn default_expiration_is_one_hour() {
        let config = StorageConfig::new("/tmp", "bucket");
        assert_eq!(config.url_expiration, Duration::hours(1));
        assert_eq!(config.with_url_expiration(Duration::minutes(5)).url_expiration.num_seconds(), 300);
    }
}
