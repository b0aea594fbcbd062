//! Streaming AES-256-CBC encryption and decryption.
//!
//! This module provides [`CbcStreamCipher`], which drives a container body
//! from a reader to a writer. Encryption reads the input in 64KB chunks and
//! keeps only one chunk in memory at a time. Decryption buffers the whole
//! body, since the padding sits in the last block.
//!
//! ## Padding
//!
//! PKCS#7 over the whole stream. Full chunks are passed through the cipher
//! unpadded. The final read (short, or empty when the input is an exact
//! multiple of the chunk size) is padded to the block size before the last
//! cipher step. The body is therefore always `(len / 16 + 1) * 16` bytes.

use crate::error::{Result, SealStoreError};
use crate::kdf::KEY_LEN;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256, Block};
use rand_core::{OsRng, RngCore};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};
use zeroize::Zeroize;

/// Chunk size for streaming encryption (64KB). Must stay a multiple of [`BLOCK_SIZE`].
pub const CHUNK_SIZE: usize = 64 * 1024;

/// AES block size
pub const BLOCK_SIZE: usize = 16;

pub const IV_LEN: usize = BLOCK_SIZE;

pub type Iv = [u8; IV_LEN];

/// Generate a fresh random IV
pub fn random_iv() -> Iv {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Length of the ciphertext body produced for a plaintext of `len` bytes
pub fn padded_len(len: u64) -> u64 {
    (len / BLOCK_SIZE as u64 + 1) * BLOCK_SIZE as u64
}

/// Append PKCS#7 padding. Always adds between 1 and 16 bytes.
pub fn pkcs7_pad(buf: &mut Vec<u8>) {
    let pad = BLOCK_SIZE - buf.len() % BLOCK_SIZE;
    buf.resize(buf.len() + pad, pad as u8);
}

/// Strip PKCS#7 padding, returning the unpadded prefix.
pub fn pkcs7_unpad(buf: &[u8]) -> Result<&[u8]> {
    let last = *buf
        .last()
        .ok_or_else(|| SealStoreError::decryption("invalid padding: empty plaintext"))?;
    let pad = usize::from(last);
    if pad == 0 || pad > BLOCK_SIZE || pad > buf.len() {
        return Err(SealStoreError::decryption("invalid padding bytes"));
    }
    let (data, padding) = buf.split_at(buf.len() - pad);
    if padding.iter().any(|&b| b != last) {
        return Err(SealStoreError::decryption("invalid padding bytes"));
    }
    Ok(data)
}

/// Fill `buf` from the reader, stopping early only at end of input.
async fn read_chunk<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|e| SealStoreError::input(format!("read failed: {}", e)))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// CbcStreamCipher handles the body of a single container.
/// Holds no state between calls beyond its key schedule and IV.
pub struct CbcStreamCipher {
    cipher: Aes256,
    iv: Iv,
}

impl CbcStreamCipher {
    pub fn new(key: &[u8; KEY_LEN], iv: Iv) -> Self {
        Self {
            cipher: Aes256::new(key.into()),
            iv,
        }
    }

    fn encrypt_blocks(&self, prev: &mut Iv, buf: &mut [u8]) {
        debug_assert_eq!(buf.len() % BLOCK_SIZE, 0);
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            for (b, p) in block.iter_mut().zip(prev.iter()) {
                *b ^= p;
            }
            self.cipher.encrypt_block(Block::from_mut_slice(block));
            prev.copy_from_slice(block);
        }
    }

    fn decrypt_blocks(&self, prev: &mut Iv, buf: &mut [u8]) {
        debug_assert_eq!(buf.len() % BLOCK_SIZE, 0);
        let mut ciphertext = [0u8; BLOCK_SIZE];
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            ciphertext.copy_from_slice(block);
            self.cipher.decrypt_block(Block::from_mut_slice(block));
            for (b, p) in block.iter_mut().zip(prev.iter()) {
                *b ^= p;
            }
            *prev = ciphertext;
        }
    }

    /// Encrypts everything from reader into writer.
    /// Returns the number of plaintext bytes consumed.
    pub async fn encrypt_stream<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<u64>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut prev = self.iv;
        let mut total_bytes = 0u64;

        loop {
            buffer.resize(CHUNK_SIZE, 0);
            let n = read_chunk(reader, &mut buffer).await?;
            total_bytes += n as u64;

            if n == CHUNK_SIZE {
                // Padding is deferred until the final read
                self.encrypt_blocks(&mut prev, &mut buffer);
                writer.write_all(&buffer).await?;
                continue;
            }

            // Short read or zero-byte read: this is the last chunk
            buffer.truncate(n);
            pkcs7_pad(&mut buffer);
            self.encrypt_blocks(&mut prev, &mut buffer);
            writer.write_all(&buffer).await?;
            debug!(final_chunk = n, padded = buffer.len(), "wrote final cipher chunk");
            break;
        }

        buffer.zeroize();
        writer.flush().await?;
        Ok(total_bytes)
    }

    /// Decrypts the remaining body from reader, strips padding, truncates to
    /// `original_length` and writes the plaintext.
    /// Returns the number of plaintext bytes written.
    pub async fn decrypt_stream<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        original_length: u64,
    ) -> Result<u64>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut plaintext = Vec::new();
        let mut prev = self.iv;

        loop {
            let n = read_chunk(reader, &mut buffer).await?;
            if n == 0 {
                break;
            }
            // Only the last read can be short, so this catches any misaligned body
            if n % BLOCK_SIZE != 0 {
                return Err(SealStoreError::format(
                    "ciphertext length is not a multiple of the block size",
                ));
            }
            let chunk = &mut buffer[..n];
            self.decrypt_blocks(&mut prev, chunk);
            plaintext.extend_from_slice(chunk);
            if n < CHUNK_SIZE {
                break;
            }
        }
        buffer.zeroize();

        if plaintext.is_empty() {
            return Err(SealStoreError::format("container has no ciphertext body"));
        }

        let result = pkcs7_unpad(&plaintext).map(<[u8]>::len);
        let unpadded_len = match result {
            Ok(len) => len,
            Err(e) => {
                plaintext.zeroize();
                return Err(e);
            }
        };

        let expected = usize::try_from(original_length).unwrap_or(usize::MAX);
        if unpadded_len != expected {
            warn!(
                unpadded = unpadded_len,
                expected = original_length,
                "unpadded length disagrees with stored length"
            );
        }
        let out_len = unpadded_len.min(expected);

        let written = writer.write_all(&plaintext[..out_len]).await;
        plaintext.zeroize();
        written?;
        writer.flush().await?;

        Ok(out_len as u64)
    }
}
