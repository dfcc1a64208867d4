//! Error types for the sync engine
//!
//! - `SyncError` for engine operations
//! - `ValidationError` for rejected slice mutations
//! - `ConfigError` for configuration loading

use crate::session::SessionPhase;
use huddle_access::AccessError;
use huddle_scope::{SlotConflict, SlotError};
use huddle_store::{SliceKey, StoreError};
use std::path::PathBuf;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Store adapter failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Guarded action denied
    #[error("access error: {0}")]
    Access(#[from] AccessError),

    /// Mutation rejected before it reached the slice
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Wristband slot assignment failed
    #[error("slot assignment failed: {0}")]
    Slot(#[from] SlotError),

    /// Slice not present in the catalog
    #[error("unknown slice '{0}'")]
    UnknownSlice(SliceKey),

    /// No authenticated user
    #[error("no active session")]
    NoSession,

    /// Session has not finished bootstrapping
    #[error("session is not ready")]
    NotReady,

    /// Session phase change not permitted
    #[error("illegal session transition {from:?} -> {to:?}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },

    /// Forced push finished with failures
    #[error("push failed for {} slice(s)", .failures.len())]
    PushFailed {
        written: usize,
        failures: Vec<(SliceKey, StoreError)>,
    },

    /// Slice value could not be interpreted
    #[error("slice '{key}' is malformed: {message}")]
    Malformed { key: SliceKey, message: String },
}

impl SyncError {
    /// Check if retrying the operation later may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::NotReady => true,
            Self::PushFailed { failures, .. } => failures.iter().all(|(_, e)| e.is_transient()),
            _ => false,
        }
    }

    /// Check if the session was not ready
    #[inline]
    #[must_use]
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady | Self::NoSession)
    }

    /// Create malformed-slice error
    #[must_use]
    pub fn malformed(key: &SliceKey, message: impl Into<String>) -> Self {
        Self::Malformed {
            key: key.clone(),
            message: message.into(),
        }
    }
}

/// Slice mutation rejected by a validator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Two plays would share a wristband slot
    #[error(transparent)]
    SlotConflict(#[from] SlotConflict),

    /// Validator-specific rejection
    #[error("'{key}' rejected: {reason}")]
    Rejected { key: SliceKey, reason: String },
}

impl ValidationError {
    /// Create rejection
    #[must_use]
    pub fn rejected(key: &SliceKey, reason: impl Into<String>) -> Self {
        Self::Rejected {
            key: key.clone(),
            reason: reason.into(),
        }
    }
}

/// Configuration loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML did not parse
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
