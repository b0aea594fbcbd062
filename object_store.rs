//! Object storage abstraction.
//!
//! Stores are built explicitly and handed to the components that need them;
//! nothing in the crate holds a global client.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  EncryptedVault   │  ManagedKeyUploader  │
//! ├──────────────────────────────────────────┤
//! │            ObjectStore trait             │
//! ├─────────────────────┬────────────────────┤
//! │    S3ObjectStore    │ MemoryObjectStore  │
//! └─────────────────────┴────────────────────┘
//! ```

use crate::error::{Result, SealStoreError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Options for a single object write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    /// Provider-managed key to encrypt the object with server-side
    pub managed_key_id: Option<String>,
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

/// Trait for object storage backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object, replacing any existing one
    async fn put(&self, key: &str, content: Vec<u8>, options: PutOptions) -> Result<()>;

    /// Fetch an object's content
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// List objects whose key starts with `prefix`, in key order
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Confirm the backing bucket is reachable
    async fn check_access(&self) -> Result<()>;
}

/// A stored object in [`MemoryObjectStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content: Vec<u8>,
    pub options: PutOptions,
    pub version: u64,
}

/// In-memory object store for tests and local runs
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full stored record, including the options it was written with
    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, content: Vec<u8>, options: PutOptions) -> Result<()> {
        let mut objects = self.objects.write().await;
        let version = objects.get(key).map_or(1, |o| o.version + 1);
        objects.insert(
            key.to_string(),
            StoredObject {
                content,
                options,
                version,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.content.clone())
            .ok_or_else(|| SealStoreError::storage(format!("object not found: {}", key)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, obj)| ObjectInfo {
                key: key.clone(),
                size: obj.content.len() as u64,
                last_modified: None,
                etag: Some(format!("\"{}-{}\"", key.len(), obj.version)),
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn check_access(&self) -> Result<()> {
        Ok(())
    }
}
