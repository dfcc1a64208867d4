//! Debounced slice controller
//!
//! One controller per slice key. On each observed value:
//! - gate closed: ignored
//! - first value after creation (the mount value): recorded, never written
//! - otherwise: the pending timer is cancelled and a new one started
//!
//! A timer that fires writes the value it was scheduled with, but only if the
//! gate is still open for the generation and user it was scheduled under.

use crate::observer::{StatsCounters, SyncObserver, SyncStats};
use crate::session::SessionGate;
use huddle_store::{RemoteStore, SliceKey, UserId};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

struct Pending {
    id: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct ControllerState {
    mounted: bool,
    pending: Option<Pending>,
    next_id: u64,
    last_written: Option<Value>,
}

struct Shared {
    key: SliceKey,
    debounce: Duration,
    gate: Arc<SessionGate>,
    remote: Arc<dyn RemoteStore>,
    observer: Arc<dyn SyncObserver>,
    stats: StatsCounters,
    state: Mutex<ControllerState>,
}

/// Debounced remote writer for one slice
pub struct DebouncedController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for DebouncedController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedController")
            .field("key", &self.shared.key)
            .field("debounce", &self.shared.debounce)
            .field("pending", &self.has_pending())
            .finish()
    }
}

impl DebouncedController {
    /// Create an unmounted controller
    #[must_use]
    pub fn new(
        key: SliceKey,
        debounce: Duration,
        gate: Arc<SessionGate>,
        remote: Arc<dyn RemoteStore>,
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                key,
                debounce,
                gate,
                remote,
                observer,
                stats: StatsCounters::default(),
                state: Mutex::new(ControllerState::default()),
            }),
        }
    }

    /// Slice key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &SliceKey {
        &self.shared.key
    }

    /// Debounce interval
    #[inline]
    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.shared.debounce
    }

    /// Observe a new slice value
    pub fn observe(&self, value: &Value) {
        let shared = &self.shared;
        let gate = shared.gate.snapshot();
        let Some(user) = gate.user.filter(|_| gate.ready) else {
            StatsCounters::bump(&shared.stats.suppressed);
            tracing::trace!(key = %shared.key, "gate closed, change not scheduled");
            return;
        };

        let mut state = shared.state.lock();
        if !state.mounted {
            state.mounted = true;
            StatsCounters::bump(&shared.stats.suppressed);
            tracing::trace!(key = %shared.key, "mount value recorded");
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!(key = %shared.key, "no async runtime, change not scheduled");
            return;
        };

        if let Some(previous) = state.pending.take() {
            previous.handle.abort();
            StatsCounters::bump(&shared.stats.superseded);
            tracing::debug!(key = %shared.key, "pending write superseded");
        }

        state.next_id += 1;
        let id = state.next_id;
        let task = runtime.spawn(fire(
            Arc::clone(shared),
            id,
            gate.generation,
            user,
            value.clone(),
        ));
        state.pending = Some(Pending {
            id,
            handle: task.abort_handle(),
        });
        drop(state);

        StatsCounters::bump(&shared.stats.scheduled);
        shared.observer.on_scheduled(&shared.key, shared.debounce);
    }

    /// Record a value that already matches the remote document
    ///
    /// Cancels the pending write and marks the controller mounted.
    pub fn acknowledge(&self, value: &Value) {
        let mut state = self.shared.state.lock();
        state.mounted = true;
        state.last_written = Some(value.clone());
        if let Some(pending) = state.pending.take() {
            pending.handle.abort();
            StatsCounters::bump(&self.shared.stats.superseded);
        }
    }

    /// Value most recently sent to the remote store
    #[must_use]
    pub fn last_written(&self) -> Option<Value> {
        self.shared.state.lock().last_written.clone()
    }

    /// Whether a timer is outstanding
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    /// Cancel the outstanding timer, if any
    ///
    /// Returns `true` if a timer was cancelled.
    pub fn cancel(&self) -> bool {
        let pending = self.shared.state.lock().pending.take();
        match pending {
            Some(p) => {
                p.handle.abort();
                StatsCounters::bump(&self.shared.stats.superseded);
                true
            }
            None => false,
        }
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.snapshot()
    }
}

impl Drop for DebouncedController {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn fire(shared: Arc<Shared>, id: u64, generation: u64, user: UserId, value: Value) {
    tokio::time::sleep(shared.debounce).await;

    {
        let mut state = shared.state.lock();
        if state.pending.as_ref().map(|p| p.id) != Some(id) {
            return;
        }
        state.pending = None;
        if !shared.gate.is_ready_for(generation) || shared.gate.user().as_ref() != Some(&user) {
            StatsCounters::bump(&shared.stats.suppressed);
            tracing::debug!(key = %shared.key, "session changed before write fired");
            return;
        }
        state.last_written = Some(value.clone());
    }

    match shared.remote.write(&user, &shared.key, &value).await {
        Ok(()) => {
            StatsCounters::bump(&shared.stats.written);
            shared.observer.on_written(&user, &shared.key);
        }
        Err(error) => {
            StatsCounters::bump(&shared.stats.failed);
            shared.observer.on_write_failed(&user, &shared.key, &error);
        }
    }
}
