//! SHA-256 content hashing for integrity checks.

use crate::error::{Result, SealStoreError};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read size for hashing. Only full coverage matters, not the size.
const HASH_CHUNK_SIZE: usize = 4096;

/// Hex SHA-256 of everything the reader yields
pub async fn hash_reader<R>(reader: &mut R) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];
    loop {
        let n = reader
            .read(&mut buffer)
            .await
            .map_err(|e| SealStoreError::input(format!("read failed: {}", e)))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 of a file's contents
pub async fn hash_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => SealStoreError::input(format!("file not found: {}", path.display())),
        _ => SealStoreError::input(format!("cannot read {}: {}", path.display(), e)),
    })?;
    hash_reader(&mut file).await.map_err(|e| match e {
        SealStoreError::Input(msg) => {
            SealStoreError::input(format!("reading {}: {}", path.display(), msg))
        }
        other => other,
    })
}

pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Equality check on two hex digests. Both values are at rest, so this is
/// not constant-time.
pub fn compare(expected_hex: &str, actual_hex: &str) -> bool {
    expected_hex == actual_hex
}
