use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SealStoreError>;

/// Custom error types for SealStore operations
#[derive(Debug, Error)]
pub enum SealStoreError {
    /// Missing or unreadable source file or stream
    #[error("Input error: {0}")]
    Input(String),

    /// Malformed container (truncated header, misaligned ciphertext)
    #[error("Format error: {0}")]
    Format(String),

    /// Cipher failures, typically bad padding from a wrong password or corrupted body
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Key derivation failures
    #[error("Key error: {0}")]
    Key(String),

    /// Local I/O and object storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

/// Coarse classification of a failure, carried in structured results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Input,
    Format,
    Decryption,
    Key,
    Storage,
    Config,
}

impl SealStoreError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn decryption(msg: impl Into<String>) -> Self {
        Self::Decryption(msg.into())
    }

    pub fn key(msg: impl Into<String>) -> Self {
        Self::Key(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Input(_) => FailureKind::Input,
            Self::Format(_) => FailureKind::Format,
            Self::Decryption(_) => FailureKind::Decryption,
            Self::Key(_) => FailureKind::Key,
            Self::Storage(_) => FailureKind::Storage,
            Self::Config(_) => FailureKind::Config,
        }
    }
}

impl From<std::io::Error> for SealStoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<opendal::Error> for SealStoreError {
    fn from(err: opendal::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
