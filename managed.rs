//! Uploads encrypted server-side with a provider-managed key.
//!
//! [`ManagedKeyUploader`] never touches key material; it only passes the
//! managed-key identifier through with every write. Its public operations
//! report failure as `false` / an empty list and log the cause.

use crate::error::{Result, SealStoreError};
use crate::object_store::{ObjectInfo, ObjectStore, PutOptions};
use crate::util;
use rand_core::{OsRng, RngCore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub key: String,
    pub size: u64,
}

pub struct ManagedKeyUploader {
    store: Arc<dyn ObjectStore>,
    kms_key_id: String,
}

impl ManagedKeyUploader {
    pub fn new(store: Arc<dyn ObjectStore>, kms_key_id: impl Into<String>) -> Self {
        Self {
            store,
            kms_key_id: kms_key_id.into(),
        }
    }

    pub fn kms_key_id(&self) -> &str {
        &self.kms_key_id
    }

    pub async fn verify_bucket_access(&self) -> bool {
        match self.store.check_access().await {
            Ok(()) => {
                info!("bucket access verified");
                true
            }
            Err(e) => {
                error!(error = %e, "bucket access error");
                false
            }
        }
    }

    /// Store `content` under `key`, encrypted by the provider with the managed key
    pub async fn upload(
        &self,
        content: Vec<u8>,
        key: &str,
        content_type: &str,
        metadata: BTreeMap<String, String>,
    ) -> bool {
        let options = PutOptions {
            content_type: Some(content_type.to_string()),
            metadata,
            managed_key_id: Some(self.kms_key_id.clone()),
        };
        match self.store.put(key, content, options).await {
            Ok(()) => true,
            Err(e) => {
                error!(key, error = %e, "upload error");
                false
            }
        }
    }

    pub async fn list(&self, prefix: &str) -> Vec<ObjectInfo> {
        self.store.list(prefix).await.unwrap_or_else(|e| {
            error!(prefix, error = %e, "list objects error");
            Vec::new()
        })
    }

    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                error!(key, error = %e, "delete error");
                false
            }
        }
    }

    /// Upload a named file. Without an explicit key one is generated as
    /// `<8 hex chars>_<filename>`; the content type comes from the extension.
    pub async fn upload_named(
        &self,
        filename: &str,
        content: Vec<u8>,
        key: Option<String>,
        extra_metadata: Option<(String, String)>,
    ) -> Result<UploadReceipt> {
        let key = key
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| format!("{}_{}", random_prefix(), filename));

        let mut metadata = BTreeMap::from([(
            "original_filename".to_string(),
            filename.to_string(),
        )]);
        if let Some((k, v)) = extra_metadata {
            metadata.insert(k, v);
        }

        let size = content.len() as u64;
        let content_type = util::content_type_for(filename);
        if !self.upload(content, &key, content_type, metadata).await {
            return Err(SealStoreError::storage(format!("upload failed for {}", key)));
        }

        info!(key = %key, size, "file uploaded with managed key");
        Ok(UploadReceipt { key, size })
    }
}

fn random_prefix() -> String {
    let mut bytes = [0u8; 4];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
