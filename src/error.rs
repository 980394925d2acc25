//! Error types for backup persistence and reconciliation.

use thiserror::Error;

/// Main error type for backup operations.
///
/// Storage backends return these; [`BackupStore`](crate::BackupStore)
/// converts them into safe defaults before they reach the controller.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Quota exceeded writing {key}: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("Malformed backup payload under {key}: {reason}")]
    MalformedPayload { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid storage format: {0}")]
    InvalidFormat(String),

    #[error("Storage directory is locked by another process")]
    Locked,

    #[error("Tree nesting exceeds {depth} levels")]
    CyclicTree { depth: usize },
}

impl From<serde_json::Error> for BackupError {
    fn from(e: serde_json::Error) -> Self {
        BackupError::Serialization(e.to_string())
    }
}

/// Result type for backup operations.
pub type Result<T> = std::result::Result<T, BackupError>;
