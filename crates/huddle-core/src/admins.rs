//! Live administrator list
//!
//! The administrator document lives outside any user's slices. The engine
//! reads it once at sign-in, then holds a subscription for the session so
//! promotions and demotions apply without a reload. Detaching drops the
//! subscription.

use huddle_store::{RemoteStore, SliceKey, Subscription, UserId};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Extract user ids from an administrator document
///
/// Accepts a bare list or `{"admins": [...]}`; anything else is empty.
#[must_use]
pub fn parse_admins(document: &Value) -> BTreeSet<UserId> {
    let list = match document {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get("admins").and_then(Value::as_array),
        _ => None,
    };
    list.into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(UserId::new)
        .collect()
}

/// Session-scoped administrator set
#[derive(Debug, Default)]
pub struct AdminList {
    admins: Arc<RwLock<BTreeSet<UserId>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl AdminList {
    /// Create an empty, detached list
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the document and subscribe to changes
    ///
    /// A failed read leaves the list empty; the subscription still attaches.
    pub async fn attach(&self, remote: &dyn RemoteStore, owner: &UserId, key: &SliceKey) {
        self.detach();

        let admins = Arc::clone(&self.admins);
        let subscription = remote.subscribe(
            owner,
            key,
            Arc::new(move |document: Option<Value>| {
                let next = document.as_ref().map(parse_admins).unwrap_or_default();
                tracing::info!(count = next.len(), "administrator list updated");
                *admins.write() = next;
            }),
        );
        *self.subscription.lock() = Some(subscription);

        match remote.read(owner, key).await {
            Ok(document) => {
                let next = document.as_ref().map(parse_admins).unwrap_or_default();
                *self.admins.write() = next;
            }
            Err(error) => tracing::warn!(%error, "administrator list unavailable"),
        }
    }

    /// Drop the subscription and forget the list
    pub fn detach(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        self.admins.write().clear();
    }

    /// Whether a subscription is held
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.subscription.lock().as_ref().is_some_and(Subscription::is_active)
    }

    /// Whether `user` is an administrator
    #[must_use]
    pub fn contains(&self, user: &UserId) -> bool {
        self.admins.read().contains(user)
    }

    /// Current administrators
    #[must_use]
    pub fn snapshot(&self) -> BTreeSet<UserId> {
        self.admins.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_store::InMemoryRemote;
    use serde_json::json;

    #[test]
    fn parses_both_shapes() {
        assert_eq!(parse_admins(&json!(["a", "b"])).len(), 2);
        assert_eq!(parse_admins(&json!({"admins": ["a"]})).len(), 1);
        assert!(parse_admins(&json!(42)).is_empty());
    }

    #[tokio::test]
    async fn follows_live_updates_until_detached() {
        let remote = InMemoryRemote::new();
        let owner = UserId::new("system");
        let key = SliceKey::new("admins");
        remote.seed(&owner, &key, json!(["u1"]));

        let list = AdminList::new();
        list.attach(&remote, &owner, &key).await;
        assert!(list.contains(&UserId::new("u1")));
        assert_eq!(remote.subscriber_count(&owner, &key), 1);

        remote.publish(&owner, &key, json!(["u2"]));
        assert!(!list.contains(&UserId::new("u1")));
        assert!(list.contains(&UserId::new("u2")));

        list.detach();
        assert_eq!(remote.subscriber_count(&owner, &key), 0);
        assert!(!list.is_attached());
        remote.publish(&owner, &key, json!(["u3"]));
        assert!(list.snapshot().is_empty());
    }
}
