use huddle_store::{
    read_json, write_json, AccountStatus, InMemoryRemote, LocalCache, MemoryCache, RemoteStore, SliceKey,
    StoreError, UserId,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn coach() -> UserId {
    UserId::new("coach")
}

#[test]
fn corrupt_cache_entry_is_reported_not_hidden() {
    let cache = MemoryCache::with_entries([("roster", "{not json")]);
    let key = SliceKey::new("roster");
    let err = read_json(&cache, &key).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
    assert!(!err.is_transient());

    write_json(&cache, &key, &json!(["ok"])).unwrap();
    assert_eq!(read_json(&cache, &key).unwrap(), Some(json!(["ok"])));
    assert_eq!(cache.keys(), vec!["roster".to_string()]);
}

#[tokio::test]
async fn subscribers_see_writes_until_dropped() {
    let remote = InMemoryRemote::new();
    let key = SliceKey::new("rolePermissions");
    let seen: Arc<Mutex<Vec<Option<Value>>>> = Arc::default();

    let subscription = remote.subscribe(&coach(), &key, {
        let seen = seen.clone();
        Arc::new(move |doc: Option<Value>| seen.lock().push(doc))
    });
    assert!(subscription.is_active());
    assert_eq!(remote.subscriber_count(&coach(), &key), 1);

    remote.write(&coach(), &key, &json!({"a": 1})).await.unwrap();
    remote.publish(&coach(), &key, json!({"a": 2}));
    drop(subscription);
    remote.publish(&coach(), &key, json!({"a": 3}));

    assert_eq!(*seen.lock(), vec![Some(json!({"a": 1})), Some(json!({"a": 2}))]);
    assert_eq!(remote.subscriber_count(&coach(), &key), 0);
}

#[tokio::test]
async fn other_users_documents_are_invisible() {
    let remote = InMemoryRemote::new();
    let key = SliceKey::new("roster");
    remote.seed(&coach(), &key, json!(["Kai"]));

    assert_eq!(remote.read(&UserId::new("other"), &key).await.unwrap(), None);
    assert_eq!(remote.account_status(&UserId::new("other")).await.unwrap(), AccountStatus::New);
    assert_eq!(remote.account_status(&coach()).await.unwrap(), AccountStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn offline_store_fails_transiently() {
    let remote = InMemoryRemote::new();
    remote.set_latency(Some(Duration::from_millis(250)));
    remote.set_offline(true);

    let err = remote
        .write(&coach(), &SliceKey::new("roster"), &json!([]))
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(remote.write_count(), 0);

    remote.set_offline(false);
    remote.write(&coach(), &SliceKey::new("roster"), &json!([])).await.unwrap();
    assert_eq!(remote.write_count(), 1);
}
