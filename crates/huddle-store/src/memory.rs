//! In-process remote store
//!
//! Behaves like the hosted document store closely enough to exercise the
//! engine: per-user documents, live pushes, and injectable failures and latency.

use crate::error::StoreError;
use crate::remote::{AccountStatus, ChangeCallback, RemoteStore};
use crate::subscription::{Subscription, SubscriptionId};
use crate::types::{SliceKey, UserId};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

type DocKey = (UserId, SliceKey);

/// One write accepted by [`InMemoryRemote`]
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    /// Owner of the document
    pub user: UserId,
    /// Document key
    pub key: SliceKey,
    /// Value written
    pub value: Value,
}

#[derive(Default)]
struct Inner {
    documents: DashMap<DocKey, Value>,
    deleted_accounts: RwLock<HashSet<UserId>>,
    failing_reads: RwLock<HashSet<SliceKey>>,
    failing_writes: RwLock<HashSet<SliceKey>>,
    offline: AtomicBool,
    latency: RwLock<Option<Duration>>,
    writes: Mutex<Vec<WriteRecord>>,
    reads: AtomicUsize,
    subscribers: DashMap<DocKey, Vec<(SubscriptionId, ChangeCallback)>>,
    next_subscription: AtomicU64,
}

impl Inner {
    fn notify(&self, doc: &DocKey, value: Option<&Value>) {
        // Callbacks run outside the map guard so they may touch the store.
        let callbacks: Vec<ChangeCallback> = self
            .subscribers
            .get(doc)
            .map(|subs| subs.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default();
        for callback in callbacks {
            callback(value.cloned());
        }
    }

    fn unsubscribe(&self, doc: &DocKey, id: SubscriptionId) {
        if let Some(mut subs) = self.subscribers.get_mut(doc) {
            subs.retain(|(sub_id, _)| *sub_id != id);
        }
    }
}

/// Shared-handle in-memory document store
///
/// Clones share the same documents, so a test can keep one handle for
/// inspection while the engine owns another.
#[derive(Clone, Default)]
pub struct InMemoryRemote {
    inner: Arc<Inner>,
}

impl InMemoryRemote {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document without recording a write or notifying subscribers
    pub fn seed(&self, user: &UserId, key: &SliceKey, value: Value) {
        self.inner
            .documents
            .insert((user.clone(), key.clone()), value);
    }

    /// Simulate another device writing a document
    pub fn publish(&self, user: &UserId, key: &SliceKey, value: Value) {
        let doc = (user.clone(), key.clone());
        self.inner.documents.insert(doc.clone(), value.clone());
        self.inner.notify(&doc, Some(&value));
    }

    /// Current document
    #[must_use]
    pub fn document(&self, user: &UserId, key: &SliceKey) -> Option<Value> {
        self.inner
            .documents
            .get(&(user.clone(), key.clone()))
            .map(|v| v.value().clone())
    }

    /// Mark an account as deleted
    pub fn mark_deleted(&self, user: &UserId) {
        self.inner.deleted_accounts.write().insert(user.clone());
    }

    /// Make reads of one key fail
    pub fn fail_reads_for(&self, key: &SliceKey) {
        self.inner.failing_reads.write().insert(key.clone());
    }

    /// Make writes of one key fail
    pub fn fail_writes_for(&self, key: &SliceKey) {
        self.inner.failing_writes.write().insert(key.clone());
    }

    /// Remove every injected key failure
    pub fn clear_failures(&self) {
        self.inner.failing_reads.write().clear();
        self.inner.failing_writes.write().clear();
    }

    /// Toggle whole-store unavailability
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every read and write
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.inner.latency.write() = latency;
    }

    /// Every accepted write, oldest first
    #[must_use]
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.inner.writes.lock().clone()
    }

    /// Accepted writes for one key
    #[must_use]
    pub fn writes_for(&self, key: &SliceKey) -> Vec<WriteRecord> {
        self.inner
            .writes
            .lock()
            .iter()
            .filter(|w| &w.key == key)
            .cloned()
            .collect()
    }

    /// Number of accepted writes
    #[inline]
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.writes.lock().len()
    }

    /// Number of read calls, failed ones included
    #[inline]
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions for a document
    #[must_use]
    pub fn subscriber_count(&self, user: &UserId, key: &SliceKey) -> usize {
        self.inner
            .subscribers
            .get(&(user.clone(), key.clone()))
            .map_or(0, |subs| subs.len())
    }

    async fn simulate_latency(&self) {
        let latency = *self.inner.latency.read();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("remote store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn read(&self, user: &UserId, key: &SliceKey) -> Result<Option<Value>, StoreError> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_online()?;
        if self.inner.failing_reads.read().contains(key) {
            return Err(StoreError::Unavailable(format!("read of '{key}' failed")));
        }
        Ok(self.document(user, key))
    }

    async fn write(&self, user: &UserId, key: &SliceKey, value: &Value) -> Result<(), StoreError> {
        self.simulate_latency().await;
        self.check_online()?;
        if self.inner.failing_writes.read().contains(key) {
            return Err(StoreError::Rejected {
                key: key.clone(),
                message: "injected write failure".to_string(),
            });
        }

        let doc = (user.clone(), key.clone());
        self.inner.documents.insert(doc.clone(), value.clone());
        self.inner.writes.lock().push(WriteRecord {
            user: user.clone(),
            key: key.clone(),
            value: value.clone(),
        });
        tracing::trace!(%user, %key, "remote document written");
        self.inner.notify(&doc, Some(value));
        Ok(())
    }

    async fn account_status(&self, user: &UserId) -> Result<AccountStatus, StoreError> {
        self.simulate_latency().await;
        self.check_online()?;
        if self.inner.deleted_accounts.read().contains(user) {
            return Ok(AccountStatus::Deleted);
        }
        let has_documents = self
            .inner
            .documents
            .iter()
            .any(|entry| &entry.key().0 == user);
        Ok(if has_documents {
            AccountStatus::Active
        } else {
            AccountStatus::New
        })
    }

    fn subscribe(&self, user: &UserId, key: &SliceKey, on_change: ChangeCallback) -> Subscription {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::SeqCst) + 1);
        let doc = (user.clone(), key.clone());
        self.inner
            .subscribers
            .entry(doc.clone())
            .or_default()
            .push((id, on_change));

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(id, move || {
            if let Some(inner) = weak.upgrade() {
                inner.unsubscribe(&doc, id);
            }
        })
    }
}

impl fmt::Debug for InMemoryRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRemote")
            .field("documents", &self.inner.documents.len())
            .field("writes", &self.write_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coach() -> UserId {
        UserId::new("coach-1")
    }

    #[tokio::test]
    async fn write_then_read() {
        let remote = InMemoryRemote::new();
        let key = SliceKey::new("roster");
        remote.write(&coach(), &key, &json!(["a"])).await.unwrap();

        assert_eq!(remote.read(&coach(), &key).await.unwrap(), Some(json!(["a"])));
        assert_eq!(remote.write_count(), 1);
    }

    #[tokio::test]
    async fn documents_are_scoped_per_user() {
        let remote = InMemoryRemote::new();
        let key = SliceKey::new("roster");
        remote.seed(&coach(), &key, json!(["a"]));

        let other = UserId::new("coach-2");
        assert_eq!(remote.read(&other, &key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn injected_failures() {
        let remote = InMemoryRemote::new();
        let key = SliceKey::new("budget");
        remote.fail_reads_for(&key);
        remote.fail_writes_for(&key);

        assert!(remote.read(&coach(), &key).await.is_err());
        assert!(remote.write(&coach(), &key, &json!({})).await.is_err());
        assert_eq!(remote.write_count(), 0);

        remote.clear_failures();
        assert!(remote.write(&coach(), &key, &json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn offline_store_is_unavailable() {
        let remote = InMemoryRemote::new();
        remote.set_offline(true);
        let err = remote
            .read(&coach(), &SliceKey::new("roster"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn account_status_transitions() {
        let remote = InMemoryRemote::new();
        assert_eq!(remote.account_status(&coach()).await.unwrap(), AccountStatus::New);

        remote.seed(&coach(), &SliceKey::new("roster"), json!([]));
        assert_eq!(remote.account_status(&coach()).await.unwrap(), AccountStatus::Active);

        remote.mark_deleted(&coach());
        assert_eq!(remote.account_status(&coach()).await.unwrap(), AccountStatus::Deleted);
    }

    #[tokio::test]
    async fn subscription_receives_pushes_until_dropped() {
        let remote = InMemoryRemote::new();
        let key = SliceKey::new("admins");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let sub = remote.subscribe(
            &coach(),
            &key,
            Arc::new(move |value| sink.lock().push(value)),
        );
        remote.publish(&coach(), &key, json!(["u1"]));
        assert_eq!(remote.subscriber_count(&coach(), &key), 1);

        drop(sub);
        remote.publish(&coach(), &key, json!(["u2"]));

        assert_eq!(seen.lock().as_slice(), &[Some(json!(["u1"]))]);
        assert_eq!(remote.subscriber_count(&coach(), &key), 0);
    }
}
