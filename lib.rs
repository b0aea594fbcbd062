//! # SealStore - Protected File Storage
//!
//! SealStore protects files before they reach object storage, using one of two
//! strategies:
//!
//! - **Client-side**: a password-derived AES-256-CBC key encrypts the file
//!   locally into a self-describing container, which is then uploaded
//! - **Managed-key**: the file is uploaded as-is and the storage provider
//!   encrypts it server-side with a managed key identified by reference
//!
//! ## Container Format
//!
//! ```text
//! [salt:16][iv:16][sha256 hex:64][original length:8 BE][AES-256-CBC + PKCS#7 body]
//! ```
//!
//! The key is PBKDF2-HMAC-SHA256 (100,000 rounds) over the password and salt.
//! The embedded hash is checked after decryption. A mismatch is reported as
//! `integrity_check: false` in a successful result, not as an error.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sealstore::service::{EncryptionService, OperationResult};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = EncryptionService::new();
//!
//!     let result = service
//!         .encrypt_file(Path::new("notes.txt"), Path::new("notes.enc"), "correct-horse")
//!         .await;
//!     if let OperationResult::Success(report) = result {
//!         println!("{} -> {} bytes", report.original_size, report.encrypted_size);
//!     }
//!
//!     let result = service
//!         .decrypt_file(Path::new("notes.enc"), Path::new("notes.out"), "correct-horse")
//!         .await;
//!     println!("{}", serde_json::to_string(&result).unwrap());
//! }
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod integrity;
pub mod kdf;
pub mod managed;
pub mod metadata;
pub mod object_store;
pub mod s3;
pub mod service;
pub mod streaming;
pub mod util;
pub mod vault;

// Re-export common types for convenience
pub use error::SealStoreError;
pub use service::{DecryptReport, EncryptReport, EncryptionService, OperationResult};
