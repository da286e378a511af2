use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{ObjectStore, Result, StorageError, StoredObject, validate_key};

/// In-process object store used by tests
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<Option<HashMap<String, StoredObject>>>,
}

impl MemoryObjectStore {
    /// A store whose bucket still has to be created.
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: RwLock::new(None),
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        let objects = self.objects.read().await;
        let mut keys: Vec<String> = objects
            .as_ref()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn create_bucket(&self) -> Result<()> {
        self.objects.write().await.get_or_insert_with(HashMap::new);
        Ok(())
    }

    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        validate_key(key)?;
        let mut objects = self.objects.write().await;
        let bucket = objects
            .as_mut()
            .ok_or_else(|| StorageError::NoSuchBucket(self.bucket.clone()))?;
        bucket.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StoredObject> {
        let objects = self.objects.read().await;
        objects
            .as_ref()
            .and_then(|o| o.get(key))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let mut objects = self.objects.write().await;
        objects
            .as_mut()
            .and_then(|o| o.remove(key))
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}
