//! Client-side encrypted object storage.
//!
//! [`EncryptedVault`] encrypts locally with a password, then stores the
//! container as `<filename>.encrypted` in an [`ObjectStore`]. Plaintext and
//! container are staged in a temporary directory that is removed on every
//! exit path when the staging guard drops.

use crate::error::{Result, SealStoreError};
use crate::metadata::EncryptedObjectMetadata;
use crate::object_store::{ObjectInfo, ObjectStore, PutOptions};
use crate::service::{DecryptReport, EncryptionService};
use crate::util;
use serde::Serialize;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info, warn};

/// Suffix appended to every client-side encrypted object key
pub const ENCRYPTED_SUFFIX: &str = ".encrypted";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub key: String,
    pub original_size: u64,
    pub encrypted_size: u64,
    pub original_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub filename: String,
    pub content: Vec<u8>,
    pub report: DecryptReport,
}

pub struct EncryptedVault {
    store: Arc<dyn ObjectStore>,
    service: EncryptionService,
}

fn staging_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("sealstore-")
        .tempdir()
        .map_err(|e| SealStoreError::storage(format!("creating staging directory: {}", e)))
}

impl EncryptedVault {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            service: EncryptionService::new(),
        }
    }

    pub fn object_key(filename: &str) -> String {
        format!("{}{}", filename, ENCRYPTED_SUFFIX)
    }

    /// Encrypt `content` and store it. Returns the key and sizes.
    pub async fn upload_encrypted(
        &self,
        filename: &str,
        content: &[u8],
        password: &str,
    ) -> Result<UploadSummary> {
        let filename = util::secure_filename(filename);
        if filename.is_empty() {
            return Err(SealStoreError::input("filename is empty after sanitizing"));
        }

        let staging = staging_dir()?;
        let plain_path = staging.path().join("plain");
        let enc_path = staging.path().join("container");
        fs::write(&plain_path, content).await?;

        let report = self
            .service
            .encrypt_file(&plain_path, &enc_path, password)
            .await
            .into_result()?;

        let key = Self::object_key(&filename);
        let container = fs::read(&enc_path).await?;
        let metadata = EncryptedObjectMetadata {
            original_filename: filename.clone(),
            original_size: report.original_size,
            original_hash: report.original_hash.clone(),
        };
        let options = PutOptions {
            content_type: Some("application/octet-stream".to_string()),
            metadata: metadata.to_map(),
            managed_key_id: None,
        };

        debug!(key = %key, size = container.len(), "uploading container");
        self.store.put(&key, container, options).await?;

        info!(
            key = %key,
            original_size = report.original_size,
            encrypted_size = report.encrypted_size,
            "file encrypted and uploaded"
        );
        Ok(UploadSummary {
            key,
            original_size: report.original_size,
            encrypted_size: report.encrypted_size,
            original_hash: report.original_hash,
        })
    }

    /// Fetch `<filename>.encrypted` and decrypt it. `filename` is sanitized
    /// the same way as on upload.
    ///
    /// An integrity mismatch is returned in the report, not as an error.
    pub async fn download_decrypted(&self, filename: &str, password: &str) -> Result<DownloadedFile> {
        let filename = util::secure_filename(filename);
        let key = Self::object_key(&filename);
        let container = self.store.get(&key).await?;

        let staging = staging_dir()?;
        let enc_path = staging.path().join("container");
        let plain_path = staging.path().join("plain");
        fs::write(&enc_path, &container).await?;

        let report = self
            .service
            .decrypt_file(&enc_path, &plain_path, password)
            .await
            .into_result()?;

        if !report.integrity_check {
            warn!(key = %key, "downloaded object failed integrity check");
        }

        let content = fs::read(&plain_path).await?;
        Ok(DownloadedFile {
            filename,
            content,
            report,
        })
    }

    /// Objects stored by this vault (keys ending in `.encrypted`)
    pub async fn list_encrypted(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut objects = self.store.list(prefix).await?;
        objects.retain(|o| o.key.ends_with(ENCRYPTED_SUFFIX));
        Ok(objects)
    }
}
