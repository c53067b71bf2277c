use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[cfg(test)]
pub mod memory;
pub mod s3;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("{op} failed for '{key}': {message}")]
    Request {
        op: &'static str,
        key: String,
        message: String,
    },
}

/// The slice of object storage the pipeline and catalog need.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Distinct top-level prefixes (`"{name}/"` folders) with the trailing
    /// slash stripped.
    async fn list_prefixes(&self) -> Result<Vec<String>, StorageError>;

    /// Every key that starts with `prefix`.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn delete_objects(&self, keys: &[String]) -> Result<(), StorageError>;
}
