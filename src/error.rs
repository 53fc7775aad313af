//! Error types for the silence store.

use crate::types::SilenceId;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Silence with ID {0} doesn't exist")]
    SilenceNotFound(SilenceId),

    #[error("No silence IDs left after {0}")]
    IdsExhausted(SilenceId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Store is locked by another process: {}", .0.display())]
    Locked(PathBuf),

    #[error("Store not initialized: {}", .0.display())]
    NotInitialized(PathBuf),
}

impl StoreError {
    /// Returns true if the error refers to a missing silence.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::SilenceNotFound(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
