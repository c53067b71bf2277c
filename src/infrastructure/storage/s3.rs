use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
};
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{info, warn};

use super::{ObjectStore, StorageError};

// Upper bound S3 puts on a single DeleteObjects request.
const MAX_DELETE_BATCH: usize = 1000;

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
    region: String,
}

impl StorageService {
    pub async fn new(
        endpoint: &str,
        region: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ S3 client ready for {} (bucket '{}')", endpoint, bucket);

        Self {
            client,
            bucket: bucket.to_string(),
            region: region.to_string(),
        }
    }

    /// Creates the bucket when `head_bucket` says it is missing.
    pub async fn ensure_bucket(&self) -> Result<(), StorageError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!("✅ Bucket '{}' exists", self.bucket);
                return Ok(());
            }
            Err(e) => {
                let missing = e.as_service_error().is_some_and(|se| se.is_not_found());
                if !missing {
                    return Err(request_error("head_bucket", &self.bucket, e));
                }
            }
        }

        warn!("Bucket '{}' not found, creating it", self.bucket);

        let mut req = self.client.create_bucket().bucket(&self.bucket);
        if self.region != "us-east-1" {
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        req.send()
            .await
            .map_err(|e| request_error("create_bucket", &self.bucket, e))?;

        info!("✅ Created bucket '{}'", self.bucket);
        Ok(())
    }
}

fn request_error<E>(op: &'static str, key: &str, err: E) -> StorageError
where
    E: std::error::Error,
{
    StorageError::Request {
        op,
        key: key.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

#[async_trait]
impl ObjectStore for StorageService {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| request_error("put_object", key, e))?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound(key.to_string())
                } else {
                    request_error("get_object", key, e)
                }
            })?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| request_error("get_object", key, e))?;

        Ok(body.into_bytes())
    }

    async fn list_prefixes(&self) -> Result<Vec<String>, StorageError> {
        let mut prefixes = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .delimiter("/")
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| request_error("list_objects_v2", &self.bucket, e))?;

            prefixes.extend(
                resp.common_prefixes()
                    .iter()
                    .filter_map(|p| p.prefix())
                    .map(|p| p.trim_end_matches('/').to_string())
                    .filter(|p| !p.is_empty()),
            );

            match resp.next_continuation_token() {
                Some(next) if resp.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string())
                }
                _ => break,
            }
        }

        Ok(prefixes)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| request_error("list_objects_v2", prefix, e))?;

            keys.extend(resp.contents().iter().filter_map(|o| o.key()).map(str::to_string));

            match resp.next_continuation_token() {
                Some(next) if resp.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string())
                }
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), StorageError> {
        for batch in keys.chunks(MAX_DELETE_BATCH) {
            let objects = batch
                .iter()
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| request_error("delete_objects", key, e))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| request_error("delete_objects", &self.bucket, e))?;

            let resp = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| request_error("delete_objects", &self.bucket, e))?;

            // Quiet mode only reports the keys that could not be removed.
            if let Some(failed) = resp.errors().first() {
                return Err(StorageError::Request {
                    op: "delete_objects",
                    key: failed.key().unwrap_or_default().to_string(),
                    message: failed.message().unwrap_or("unknown error").to_string(),
                });
            }
        }

        Ok(())
    }
}
