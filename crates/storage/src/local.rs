use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::{ObjectStore, Result, StorageError, StoredObject, validate_key};

const CONTENT_TYPE_SUFFIX: &str = ".content-type";

/// Filesystem-backed object store
///
/// The bucket is a directory under `base_path`; object keys map to relative
/// paths inside it. The content type is kept in a sidecar file next to the
/// object.
pub struct LocalObjectStore {
    base_path: PathBuf,
    bucket: String,
}

impl LocalObjectStore {
    /// Create a new local store
    ///
    /// # Arguments
    /// * `base_path` - Directory holding bucket directories
    /// * `bucket` - Bucket name, a single path segment
    pub fn new<P: AsRef<Path>>(base_path: P, bucket: &str) -> Result<Self> {
        if bucket.contains('/') {
            return Err(StorageError::InvalidKey(bucket.to_string()));
        }
        validate_key(bucket)?;
        Ok(Self {
            base_path: base_path.as_ref().to_path_buf(),
            bucket: bucket.to_string(),
        })
    }

    fn bucket_path(&self) -> PathBuf {
        self.base_path.join(&self.bucket)
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.bucket_path().join(key))
    }

    async fn ensure_bucket(&self) -> Result<()> {
        if fs::try_exists(self.bucket_path()).await? {
            Ok(())
        } else {
            Err(StorageError::NoSuchBucket(self.bucket.clone()))
        }
    }

    /// Get the base storage path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

fn sidecar(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(CONTENT_TYPE_SUFFIX);
    PathBuf::from(name)
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn create_bucket(&self) -> Result<()> {
        fs::create_dir_all(self.bucket_path()).await?;
        tracing::debug!(bucket = %self.bucket, path = %self.bucket_path().display(), "bucket ready");
        Ok(())
    }

    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let path = self.object_path(key)?;
        self.ensure_bucket().await?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        fs::write(sidecar(&path), content_type.as_bytes()).await?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StoredObject> {
        let path = self.object_path(key)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let content_type = fs::read_to_string(sidecar(&path)).await.ok();

        Ok(StoredObject { data, content_type })
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        // sidecar may be missing for objects written by hand
        let _ = fs::remove_file(sidecar(&path)).await;
        Ok(())
    }
}
