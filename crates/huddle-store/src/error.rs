//! Error types for the store adapters

use crate::types::SliceKey;

/// Failure surfaced by a cache or remote store operation
///
/// Remote failures are always returned as values; adapters never panic on
/// network or authorization problems.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Remote store could not be reached
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// Caller is not authorized for the document
    #[error("unauthorized access to '{key}'")]
    Unauthorized { key: SliceKey },

    /// Stored text could not be decoded
    #[error("corrupt value for '{key}': {message}")]
    Corrupt { key: SliceKey, message: String },

    /// Value could not be encoded for storage
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Remote store rejected the write
    #[error("write rejected for '{key}': {message}")]
    Rejected { key: SliceKey, message: String },
}

impl StoreError {
    /// Transient failures that a later write may get past
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Create corrupt-value error
    pub fn corrupt(key: &SliceKey, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.clone(),
            message: message.into(),
        }
    }
}
