//! Testing utilities for the huddle workspace
//!
//! Shared fixtures, a recording observer and a remote store wrapper that
//! keeps an ordered timeline of calls.

#![allow(missing_docs)]

use async_trait::async_trait;
use huddle_core::{HuddleConfig, SyncEngine, SyncObserver};
use huddle_store::{
    AccountStatus, ChangeCallback, InMemoryRemote, MemoryCache, RemoteStore, SliceKey, StoreError,
    Subscription, UserId,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

/// Install a test-friendly subscriber honouring `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One call seen by [`TimelineRemote`]
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    Status(UserId),
    Read(UserId, SliceKey),
    Write(UserId, SliceKey, Value),
}

/// Remote store recording every call in order
#[derive(Debug, Clone, Default)]
pub struct TimelineRemote {
    inner: InMemoryRemote,
    events: Arc<Mutex<Vec<RemoteEvent>>>,
}

impl TimelineRemote {
    #[must_use]
    pub fn new(inner: InMemoryRemote) -> Self {
        Self {
            inner,
            events: Arc::default(),
        }
    }

    #[must_use]
    pub fn events(&self) -> Vec<RemoteEvent> {
        self.events.lock().clone()
    }

    /// Writes in call order
    #[must_use]
    pub fn writes(&self) -> Vec<(UserId, SliceKey, Value)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RemoteEvent::Write(u, k, v) => Some((u, k, v)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RemoteStore for TimelineRemote {
    async fn read(&self, user: &UserId, key: &SliceKey) -> Result<Option<Value>, StoreError> {
        self.events.lock().push(RemoteEvent::Read(user.clone(), key.clone()));
        self.inner.read(user, key).await
    }

    async fn write(&self, user: &UserId, key: &SliceKey, value: &Value) -> Result<(), StoreError> {
        self.events
            .lock()
            .push(RemoteEvent::Write(user.clone(), key.clone(), value.clone()));
        self.inner.write(user, key, value).await
    }

    async fn account_status(&self, user: &UserId) -> Result<AccountStatus, StoreError> {
        self.events.lock().push(RemoteEvent::Status(user.clone()));
        self.inner.account_status(user).await
    }

    fn subscribe(&self, user: &UserId, key: &SliceKey, on_change: ChangeCallback) -> Subscription {
        self.inner.subscribe(user, key, on_change)
    }
}

/// Observer keeping failed writes for assertions
#[derive(Debug, Default)]
pub struct RecordingObserver {
    failures: Mutex<Vec<(UserId, SliceKey, String)>>,
    written: Mutex<Vec<(UserId, SliceKey)>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn failures(&self) -> Vec<(UserId, SliceKey, String)> {
        self.failures.lock().clone()
    }

    #[must_use]
    pub fn written(&self) -> Vec<(UserId, SliceKey)> {
        self.written.lock().clone()
    }
}

impl SyncObserver for RecordingObserver {
    fn on_written(&self, user: &UserId, key: &SliceKey) {
        self.written.lock().push((user.clone(), key.clone()));
    }

    fn on_write_failed(&self, user: &UserId, key: &SliceKey, error: &StoreError) {
        self.failures
            .lock()
            .push((user.clone(), key.clone(), error.to_string()));
    }
}

/// Engine wired to in-memory stores
#[derive(Debug, Clone)]
pub struct Harness {
    pub engine: SyncEngine,
    pub remote: InMemoryRemote,
    pub timeline: TimelineRemote,
    pub local: Arc<MemoryCache>,
    pub observer: Arc<RecordingObserver>,
}

/// Debounce used by [`harness`]
pub const TEST_DEBOUNCE: Duration = Duration::from_millis(500);

/// Harness with a 500ms debounce
#[must_use]
pub fn harness() -> Harness {
    harness_with(Arc::new(MemoryCache::new()), InMemoryRemote::new())
}

/// Harness over existing stores
#[must_use]
pub fn harness_with(local: Arc<MemoryCache>, remote: InMemoryRemote) -> Harness {
    init_tracing();
    let timeline = TimelineRemote::new(remote.clone());
    let observer = Arc::new(RecordingObserver::default());
    let engine = SyncEngine::builder(local.clone(), Arc::new(timeline.clone()))
        .with_config(HuddleConfig::new().with_default_debounce(TEST_DEBOUNCE))
        .with_observer(observer.clone())
        .build();
    Harness {
        engine,
        remote,
        timeline,
        local,
        observer,
    }
}

/// `staff` entry for a user
#[must_use]
pub fn staff_member(user: &str, roles: &[&str]) -> Value {
    json!({"userId": user, "name": user, "roles": roles})
}

/// Card `card1` in namespace `offense`, numbered from 101, rows `[header, 7, 42]`
#[must_use]
pub fn wristband_layout() -> Value {
    json!({"cards": [{
        "id": "card1",
        "namespace": "offense",
        "numbering": {"mode": "sequential", "start": 101},
        "rows": [{"header": true}, {"playId": "7"}, {"playId": "42"}]
    }]})
}

/// Give `user` an existing account with a roster document
pub fn seed_account(remote: &InMemoryRemote, user: &UserId, roster: Value) {
    remote.seed(user, &SliceKey::new("roster"), roster);
}
