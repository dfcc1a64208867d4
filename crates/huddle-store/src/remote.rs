//! Remote store adapter
//!
//! The remote store is authoritative once pulled, addressed by
//! `(UserId, SliceKey)`. Network and authorization failures come back as
//! [`StoreError`] values.

use crate::error::StoreError;
use crate::subscription::Subscription;
use crate::types::{SliceKey, UserId};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Callback invoked with the new document (or `None` when deleted)
pub type ChangeCallback = Arc<dyn Fn(Option<Value>) + Send + Sync>;

/// Remote account state as seen at bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    /// Account has stored documents
    Active,
    /// No document has ever been written for the account
    New,
    /// Account was deleted; remaining documents are not trusted
    Deleted,
}

impl AccountStatus {
    /// Brand-new or previously-deleted accounts go through first-run setup
    #[inline]
    #[must_use]
    pub fn is_wiped(self) -> bool {
        matches!(self, Self::New | Self::Deleted)
    }
}

/// Asynchronous per-user document store
#[async_trait]
pub trait RemoteStore: Send + Sync + std::fmt::Debug {
    /// Read one document
    ///
    /// # Errors
    /// Any transport or authorization failure
    async fn read(&self, user: &UserId, key: &SliceKey) -> Result<Option<Value>, StoreError>;

    /// Replace one document (last write wins)
    ///
    /// # Errors
    /// Any transport or authorization failure
    async fn write(&self, user: &UserId, key: &SliceKey, value: &Value) -> Result<(), StoreError>;

    /// Classify the account for first-run detection
    ///
    /// # Errors
    /// Any transport or authorization failure
    async fn account_status(&self, user: &UserId) -> Result<AccountStatus, StoreError>;

    /// Register for live pushes of one document
    ///
    /// The returned handle unsubscribes when dropped.
    fn subscribe(&self, user: &UserId, key: &SliceKey, on_change: ChangeCallback) -> Subscription;
}
