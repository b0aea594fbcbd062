use crate::error::{Result, SealStoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ENCRYPTION_ALGORITHM: &str = "AES-256-CBC";

const KEY_FILENAME: &str = "original-filename";
const KEY_ENCRYPTED: &str = "encrypted";
const KEY_ALGORITHM: &str = "encryption-algorithm";
const KEY_SIZE: &str = "original-size";
const KEY_HASH: &str = "original-hash";

/// User metadata stored alongside a client-side encrypted object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedObjectMetadata {
    pub original_filename: String,
    pub original_size: u64,
    pub original_hash: String,
}

impl EncryptedObjectMetadata {
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (KEY_FILENAME.to_string(), self.original_filename.clone()),
            (KEY_ENCRYPTED.to_string(), "true".to_string()),
            (KEY_ALGORITHM.to_string(), ENCRYPTION_ALGORITHM.to_string()),
            (KEY_SIZE.to_string(), self.original_size.to_string()),
            (KEY_HASH.to_string(), self.original_hash.clone()),
        ])
    }

    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        let field = |key: &str| {
            map.get(key)
                .cloned()
                .ok_or_else(|| SealStoreError::format(format!("object metadata missing {}", key)))
        };

        if map.get(KEY_ENCRYPTED).map(String::as_str) != Some("true") {
            return Err(SealStoreError::format("object is not marked as encrypted"));
        }
        let algorithm = field(KEY_ALGORITHM)?;
        if algorithm != ENCRYPTION_ALGORITHM {
            return Err(SealStoreError::format(format!(
                "unsupported encryption algorithm: {}",
                algorithm
            )));
        }

        let original_size = field(KEY_SIZE)?
            .parse()
            .map_err(|e| SealStoreError::format(format!("bad {}: {}", KEY_SIZE, e)))?;

        Ok(Self {
            original_filename: field(KEY_FILENAME)?,
            original_size,
            original_hash: field(KEY_HASH)?,
        })
    }
}
