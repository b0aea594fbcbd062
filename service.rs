//! File encryption service.
//!
//! [`EncryptionService`] composes key derivation, the container header, the
//! CBC stream cipher and the integrity check into two operations,
//! [`EncryptionService::encrypt_file`] and [`EncryptionService::decrypt_file`].
//!
//! Neither operation returns an error. Every fault is converted into an
//! [`OperationResult::Failure`] naming the pipeline stage that failed. A
//! decrypt whose recomputed hash differs from the stored one is still a
//! [`OperationResult::Success`] with `integrity_check: false`.

use crate::container::ContainerHeader;
use crate::error::{FailureKind, Result, SealStoreError};
use crate::integrity;
use crate::kdf::{self, DerivedKey, Salt};
use crate::streaming::{self, CbcStreamCipher};
use serde::ser::{Serialize, Serializer};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

/// Pipeline stages, in the order encrypt and decrypt pass through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    HashOriginal,
    DeriveKey,
    WriteHeader,
    StreamEncrypt,
    ReadHeader,
    StreamDecrypt,
    VerifyIntegrity,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EncryptReport {
    pub original_size: u64,
    pub encrypted_size: u64,
    pub original_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DecryptReport {
    pub original_size: u64,
    pub decrypted_size: u64,
    pub integrity_check: bool,
    pub original_hash: String,
    pub decrypted_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OperationFailure {
    pub kind: FailureKind,
    pub stage: Stage,
    pub error: String,
}

impl OperationFailure {
    fn new(stage: Stage, err: &SealStoreError) -> Self {
        Self {
            kind: err.kind(),
            stage,
            error: err.to_string(),
        }
    }
}

impl From<OperationFailure> for SealStoreError {
    fn from(failure: OperationFailure) -> Self {
        let msg = format!("{:?} stage: {}", failure.stage, failure.error);
        match failure.kind {
            FailureKind::Input => Self::Input(msg),
            FailureKind::Format => Self::Format(msg),
            FailureKind::Decryption => Self::Decryption(msg),
            FailureKind::Key => Self::Key(msg),
            FailureKind::Storage => Self::Storage(msg),
            FailureKind::Config => Self::Config(msg),
        }
    }
}

/// Outcome of a service call. Serializes as `{"success": true, ..report}` or
/// `{"success": false, "kind": .., "stage": .., "error": ..}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult<T> {
    Success(T),
    Failure(OperationFailure),
}

impl<T> OperationResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn report(&self) -> Option<&T> {
        match self {
            Self::Success(report) => Some(report),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&OperationFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    pub fn into_result(self) -> std::result::Result<T, OperationFailure> {
        match self {
            Self::Success(report) => Ok(report),
            Self::Failure(failure) => Err(failure),
        }
    }
}

impl<T: Serialize> Serialize for OperationResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(serde::Serialize)]
        struct Tagged<'a, B: Serialize> {
            success: bool,
            #[serde(flatten)]
            body: &'a B,
        }

        match self {
            Self::Success(report) => Tagged {
                success: true,
                body: report,
            }
            .serialize(serializer),
            Self::Failure(failure) => Tagged {
                success: false,
                body: failure,
            }
            .serialize(serializer),
        }
    }
}

/// Stateless orchestrator; calls are independent and may run concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncryptionService;

impl EncryptionService {
    pub fn new() -> Self {
        Self
    }

    /// Encrypt `input` into a container at `output`
    pub async fn encrypt_file(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
    ) -> OperationResult<EncryptReport> {
        let mut stage = Stage::Start;
        match self.run_encrypt(input, output, password, &mut stage).await {
            Ok(report) => {
                info!(
                    input = %input.display(),
                    original_size = report.original_size,
                    encrypted_size = report.encrypted_size,
                    "file encrypted successfully"
                );
                OperationResult::Success(report)
            }
            Err(e) => {
                error!(input = %input.display(), stage = ?stage, error = %e, "encryption failed");
                OperationResult::Failure(OperationFailure::new(stage, &e))
            }
        }
    }

    /// Decrypt the container at `input` into `output` and verify its hash
    pub async fn decrypt_file(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
    ) -> OperationResult<DecryptReport> {
        let mut stage = Stage::Start;
        match self.run_decrypt(input, output, password, &mut stage).await {
            Ok(report) => {
                if report.integrity_check {
                    info!(
                        input = %input.display(),
                        decrypted_size = report.decrypted_size,
                        "file decrypted successfully"
                    );
                } else {
                    warn!(
                        input = %input.display(),
                        expected = %report.original_hash,
                        actual = %report.decrypted_hash,
                        "decrypted content failed integrity check"
                    );
                }
                OperationResult::Success(report)
            }
            Err(e) => {
                error!(input = %input.display(), stage = ?stage, error = %e, "decryption failed");
                OperationResult::Failure(OperationFailure::new(stage, &e))
            }
        }
    }

    async fn run_encrypt(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
        stage: &mut Stage,
    ) -> Result<EncryptReport> {
        let original_size = input_metadata(input).await?.len();

        *stage = Stage::HashOriginal;
        debug!(input = %input.display(), "hashing original");
        let original_hash = integrity::hash_file(input).await?;

        *stage = Stage::DeriveKey;
        let (key, salt) = derive_off_thread(password, None).await?;
        let iv = streaming::random_iv();

        *stage = Stage::WriteHeader;
        let out_file = fs::File::create(output).await.map_err(|e| {
            SealStoreError::storage(format!("creating {}: {}", output.display(), e))
        })?;
        let mut writer = BufWriter::new(out_file);
        let header = ContainerHeader {
            salt,
            iv,
            original_hash: original_hash.clone(),
            original_length: original_size,
        };
        header.write_to(&mut writer).await?;

        *stage = Stage::StreamEncrypt;
        debug!(input = %input.display(), "streaming cipher body");
        let mut reader = BufReader::new(open_input(input).await?);
        let engine = CbcStreamCipher::new(key.as_bytes(), iv);
        drop(key);
        let processed = engine
            .encrypt_stream(&mut reader, &mut writer)
            .await
            .map_err(name_source(input))?;
        writer.shutdown().await?;

        if processed != original_size {
            return Err(SealStoreError::input(format!(
                "{} changed while encrypting: expected {} bytes, read {}",
                input.display(),
                original_size,
                processed
            )));
        }

        let encrypted_size = fs::metadata(output).await?.len();
        Ok(EncryptReport {
            original_size,
            encrypted_size,
            original_hash,
        })
    }

    async fn run_decrypt(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
        stage: &mut Stage,
    ) -> Result<DecryptReport> {
        let mut reader = BufReader::new(open_input(input).await?);

        *stage = Stage::ReadHeader;
        let header = ContainerHeader::read_from(&mut reader)
            .await
            .map_err(name_source(input))?;
        debug!(
            input = %input.display(),
            original_length = header.original_length,
            "read container header"
        );

        *stage = Stage::DeriveKey;
        let (key, _) = derive_off_thread(password, Some(header.salt)).await?;

        *stage = Stage::StreamDecrypt;
        let engine = CbcStreamCipher::new(key.as_bytes(), header.iv);
        drop(key);
        let out_file = fs::File::create(output).await.map_err(|e| {
            SealStoreError::storage(format!("creating {}: {}", output.display(), e))
        })?;
        let mut writer = BufWriter::new(out_file);
        let decrypted_size = engine
            .decrypt_stream(&mut reader, &mut writer, header.original_length)
            .await
            .map_err(name_source(input))?;
        writer.shutdown().await?;

        *stage = Stage::VerifyIntegrity;
        let decrypted_hash = integrity::hash_file(output).await?;
        let integrity_check = integrity::compare(&header.original_hash, &decrypted_hash);

        Ok(DecryptReport {
            original_size: header.original_length,
            decrypted_size,
            integrity_check,
            original_hash: header.original_hash,
            decrypted_hash,
        })
    }
}

async fn input_metadata(path: &Path) -> Result<std::fs::Metadata> {
    let meta = fs::metadata(path).await.map_err(|e| missing_input(path, &e))?;
    if !meta.is_file() {
        return Err(SealStoreError::input(format!(
            "not a regular file: {}",
            path.display()
        )));
    }
    Ok(meta)
}

async fn open_input(path: &Path) -> Result<fs::File> {
    fs::File::open(path).await.map_err(|e| missing_input(path, &e))
}

fn missing_input(path: &Path, err: &std::io::Error) -> SealStoreError {
    match err.kind() {
        ErrorKind::NotFound => SealStoreError::input(format!("file not found: {}", path.display())),
        _ => SealStoreError::input(format!("cannot read {}: {}", path.display(), err)),
    }
}

/// Attach the source path to read failures
fn name_source(path: &Path) -> impl Fn(SealStoreError) -> SealStoreError + '_ {
    move |err| match err {
        SealStoreError::Input(msg) => {
            SealStoreError::input(format!("reading {}: {}", path.display(), msg))
        }
        other => other,
    }
}

/// PBKDF2 is CPU-bound, keep it off the async workers
async fn derive_off_thread(password: &str, salt: Option<Salt>) -> Result<(DerivedKey, Salt)> {
    let password = Zeroizing::new(password.to_owned());
    tokio::task::spawn_blocking(move || kdf::derive_key(&password, salt))
        .await
        .map_err(|e| SealStoreError::key(format!("key derivation task failed: {}", e)))
}
