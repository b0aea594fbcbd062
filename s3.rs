//! OpenDAL-backed S3 object store

use crate::config::Config;
use crate::error::{Result, SealStoreError};
use crate::object_store::{ObjectInfo, ObjectStore, PutOptions};
use async_trait::async_trait;
use opendal::Operator;
use tracing::debug;

/// Build an OpenDAL Operator for S3 (or any S3-compatible endpoint).
///
/// With `kms_key_id` set, every write through the operator asks the provider
/// to encrypt with that customer-managed key.
pub fn build_operator(cfg: &Config, kms_key_id: Option<&str>) -> Result<Operator> {
    let mut builder = opendal::services::S3::default()
        .root("/")
        .region(&cfg.region)
        .bucket(&cfg.bucket);

    if let Some(endpoint) = &cfg.endpoint {
        builder = builder.endpoint(endpoint);
    }
    if let (Some(id), Some(secret)) = (&cfg.access_key_id, &cfg.secret_access_key) {
        builder = builder.access_key_id(id).secret_access_key(secret);
    }
    if let Some(kms) = kms_key_id {
        builder = builder.server_side_encryption_with_customer_managed_kms_key(kms);
    }

    let op = Operator::new(builder)
        .map_err(|e| SealStoreError::config(format!("creating S3 operator: {}", e)))?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}

pub struct S3ObjectStore {
    config: Config,
    op: Operator,
}

impl S3ObjectStore {
    pub fn new(config: Config) -> Result<Self> {
        let op = build_operator(&config, None)?;
        Ok(Self { config, op })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, content: Vec<u8>, options: PutOptions) -> Result<()> {
        // SSE settings live on the operator, so managed-key writes get their own
        let op = match options.managed_key_id.as_deref() {
            Some(kms) => build_operator(&self.config, Some(kms))?,
            None => self.op.clone(),
        };

        debug!(
            bucket = %self.config.bucket,
            key,
            size = content.len(),
            managed_key = options.managed_key_id.is_some(),
            "putting object"
        );

        let mut write = op.write_with(key, content).user_metadata(options.metadata);
        if let Some(content_type) = &options.content_type {
            write = write.content_type(content_type);
        }
        write.await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let buffer = self.op.read(key).await?;
        Ok(buffer.to_vec())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let entries = self.op.list_with(prefix).recursive(true).await?;
        let mut objects: Vec<ObjectInfo> = entries
            .into_iter()
            .filter(|entry| !entry.metadata().is_dir())
            .map(|entry| {
                let meta = entry.metadata();
                ObjectInfo {
                    key: entry.path().to_string(),
                    size: meta.content_length(),
                    last_modified: meta.last_modified().map(|t| t.to_string()),
                    etag: meta.etag().map(str::to_string),
                }
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.op.delete(key).await?;
        Ok(())
    }

    async fn check_access(&self) -> Result<()> {
        self.op
            .list("/")
            .await
            .map(|_| ())
            .map_err(|e| SealStoreError::storage(format!("bucket access check failed: {}", e)))
    }
}
