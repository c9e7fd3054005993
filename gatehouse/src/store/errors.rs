use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for store operations that application code can handle.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record exists for the given key
    #[error("Record not found")]
    NotFound,

    /// A record for this username already exists
    #[error("User {username:?} already exists")]
    AlreadyExists { username: String },

    /// The stored verifier does not match the presented secret
    #[error("Credential verification failed")]
    InvalidCredentials,

    /// A required field was missing or malformed before storage was touched
    #[error("{message}")]
    InvalidInput { message: String },

    /// A persisted record could not be parsed. Surfaced separately from
    /// `NotFound` so operators can tell a broken store from a missing key.
    #[error("Corrupt record at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Underlying filesystem error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type alias for store operation results
pub type Result<T> = std::result::Result<T, StoreError>;
