//! Object storage for uploaded images
//!
//! Provides an S3-shaped capability:
//! - Creating the bucket at startup
//! - Putting, fetching and deleting objects by key
//!
//! Backends: [`LocalObjectStore`] keeps each bucket as a directory on disk,
//! [`MemoryObjectStore`] keeps objects in a map for tests.

pub mod local;
pub mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Bucket does not exist: {0}")]
    NoSuchBucket(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// An object as read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket this store writes into.
    fn bucket(&self) -> &str;

    /// Create the bucket; succeeds if it already exists.
    async fn create_bucket(&self) -> Result<()>;

    /// Store `data` under `key`, replacing any previous object.
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;

    async fn get_object(&self, key: &str) -> Result<StoredObject>;

    async fn delete_object(&self, key: &str) -> Result<()>;
}

/// Keys are relative, `/`-separated, and may not climb out of the bucket.
pub fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
