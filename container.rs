//! Container header encoding.
//!
//! ## Container Format
//!
//! ```text
//! [salt:16][iv:16][original_hash:64 ascii hex][original_length:8 BE][ciphertext...]
//! ```
//!
//! The header is always [`HEADER_LEN`] bytes. The ciphertext body that follows
//! is AES-256-CBC output with PKCS#7 padding, so its length is a positive
//! multiple of 16.

use crate::error::{Result, SealStoreError};
use crate::kdf::{Salt, SALT_LEN};
use crate::streaming::{Iv, IV_LEN};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Length of the hex-encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// Total header size: salt + iv + hash + length
pub const HEADER_LEN: usize = SALT_LEN + IV_LEN + HASH_HEX_LEN + 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub salt: Salt,
    pub iv: Iv,
    /// Hex SHA-256 of the plaintext
    pub original_hash: String,
    /// Plaintext length before padding
    pub original_length: u64,
}

impl ContainerHeader {
    /// Serialize to the fixed 104-byte layout.
    pub fn to_bytes(&self) -> Result<[u8; HEADER_LEN]> {
        let hash = self.original_hash.as_bytes();
        if hash.len() != HASH_HEX_LEN || !hash.iter().all(u8::is_ascii_hexdigit) {
            return Err(SealStoreError::format(format!(
                "original hash must be {} hex characters, got {:?}",
                HASH_HEX_LEN, self.original_hash
            )));
        }

        let mut out = [0u8; HEADER_LEN];
        let (salt, rest) = out.split_at_mut(SALT_LEN);
        let (iv, rest) = rest.split_at_mut(IV_LEN);
        let (hash_out, len_out) = rest.split_at_mut(HASH_HEX_LEN);
        salt.copy_from_slice(&self.salt);
        iv.copy_from_slice(&self.iv);
        hash_out.copy_from_slice(hash);
        len_out.copy_from_slice(&self.original_length.to_be_bytes());
        Ok(out)
    }

    /// Parse the fixed 104-byte layout.
    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        let (salt_bytes, rest) = bytes.split_at(SALT_LEN);
        let (iv_bytes, rest) = rest.split_at(IV_LEN);
        let (hash_bytes, len_bytes) = rest.split_at(HASH_HEX_LEN);

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(salt_bytes);
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(iv_bytes);

        if !hash_bytes.iter().all(u8::is_ascii_hexdigit) {
            return Err(SealStoreError::format(
                "original hash field is not hex-encoded",
            ));
        }
        // Digests compare as lowercase hex
        let original_hash = String::from_utf8_lossy(hash_bytes).to_ascii_lowercase();

        let mut len = [0u8; 8];
        len.copy_from_slice(len_bytes);

        Ok(Self {
            salt,
            iv,
            original_hash,
            original_length: u64::from_be_bytes(len),
        })
    }

    /// Write the header ahead of any ciphertext
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes).await?;
        Ok(())
    }

    /// Read exactly one header; the reader is left at the first ciphertext byte.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut bytes = [0u8; HEADER_LEN];
        match reader.read_exact(&mut bytes).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(SealStoreError::format(format!(
                    "container truncated: header requires {} bytes",
                    HEADER_LEN
                )));
            }
            Err(e) => {
                return Err(SealStoreError::input(format!(
                    "reading container header: {}",
                    e
                )))
            }
        }
        Self::from_bytes(&bytes)
    }
}
