use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::{ObjectStore, StorageError};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

/// In-memory bucket for tests. Keys containing `fail_put_on` reject writes,
/// keys containing `fail_get_on` reject reads. `fail_listing` only affects
/// the top-level prefix listing.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    fail_put_on: Option<String>,
    fail_get_on: Option<String>,
    fail_listing: bool,
    fail_delete: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_put_on(mut self, fragment: &str) -> Self {
        self.fail_put_on = Some(fragment.to_string());
        self
    }

    pub fn failing_get_on(mut self, fragment: &str) -> Self {
        self.fail_get_on = Some(fragment.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn insert(&self, key: &str, body: impl Into<Bytes>, content_type: &str) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: body.into(),
                content_type: content_type.to_string(),
            },
        );
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        "test-bucket"
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if self.fail_put_on.as_deref().is_some_and(|f| key.contains(f)) {
            return Err(StorageError::Request {
                op: "put_object",
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.insert(key, body, content_type);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        if self.fail_get_on.as_deref().is_some_and(|f| key.contains(f)) {
            return Err(StorageError::Request {
                op: "get_object",
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.object(key)
            .map(|o| o.body)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list_prefixes(&self) -> Result<Vec<String>, StorageError> {
        if self.fail_listing {
            return Err(StorageError::Request {
                op: "list_objects_v2",
                key: self.bucket().to_string(),
                message: "injected failure".to_string(),
            });
        }
        let mut prefixes: Vec<String> = self
            .keys()
            .into_iter()
            .filter_map(|k| k.split_once('/').map(|(p, _)| p.to_string()))
            .collect();
        prefixes.dedup();
        Ok(prefixes)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.keys().into_iter().filter(|k| k.starts_with(prefix)).collect())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), StorageError> {
        if self.fail_delete {
            return Err(StorageError::Request {
                op: "delete_objects",
                key: self.bucket().to_string(),
                message: "injected failure".to_string(),
            });
        }
        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }
}
