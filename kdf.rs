//! Password-based key derivation.
//!
//! This module turns a password and a 16-byte salt into a 256-bit
//! [`DerivedKey`] using PBKDF2-HMAC-SHA256.
//!
//! ## Security Features
//!
//! - Keys are zeroized on drop (via `Zeroize` trait)
//! - Salts come from `OsRng` when the caller does not supply one
//! - `Debug` never prints key material

use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use std::fmt;
use tracing::warn;
use zeroize::Zeroize;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// PBKDF2 rounds. Part of the container contract: changing it breaks
/// decryption of every existing container.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

pub type Salt = [u8; SALT_LEN];

/// A 256-bit key derived from a password. Lives for one encrypt or decrypt call.
pub struct DerivedKey {
    bytes: [u8; KEY_LEN],
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh random salt
pub fn random_salt() -> Salt {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a key from `password`, generating a salt when none is given.
///
/// Deterministic for a fixed `(password, salt)` pair. An empty password is
/// accepted but logged.
pub fn derive_key(password: &str, salt: Option<Salt>) -> (DerivedKey, Salt) {
    if password.is_empty() {
        warn!("deriving key from an empty password");
    }
    let salt = salt.unwrap_or_else(random_salt);

    let mut bytes = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut bytes);

    (DerivedKey { bytes }, salt)
}
