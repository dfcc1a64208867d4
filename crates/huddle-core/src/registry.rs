//! Controller registry
//!
//! Holds the session's controllers keyed by slice. Controllers are created
//! when the gate opens and all dropped on teardown, which cancels their
//! timers.

use crate::controller::DebouncedController;
use crate::observer::{SyncObserver, SyncStats};
use crate::session::SessionGate;
use dashmap::DashMap;
use huddle_store::{RemoteStore, SliceKey};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Keyed set of debounced controllers
#[derive(Debug)]
pub struct SyncRegistry {
    controllers: DashMap<SliceKey, DebouncedController>,
    gate: Arc<SessionGate>,
    remote: Arc<dyn RemoteStore>,
    observer: Arc<dyn SyncObserver>,
    /// Counters of controllers already torn down
    retired: Mutex<SyncStats>,
}

impl SyncRegistry {
    /// Create empty registry
    #[must_use]
    pub fn new(
        gate: Arc<SessionGate>,
        remote: Arc<dyn RemoteStore>,
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        Self {
            controllers: DashMap::new(),
            gate,
            remote,
            observer,
            retired: Mutex::new(SyncStats::default()),
        }
    }

    /// Create a controller for `key` and feed it its mount value
    ///
    /// An existing controller for the key is replaced.
    pub fn mount(&self, key: SliceKey, debounce: Duration, value: &Value) {
        let controller = DebouncedController::new(
            key.clone(),
            debounce,
            self.gate.clone(),
            self.remote.clone(),
            self.observer.clone(),
        );
        controller.observe(value);
        if let Some(old) = self.controllers.insert(key, controller) {
            self.retire(&old);
        }
    }

    /// Forward a change to the key's controller
    ///
    /// Returns `false` when no controller is mounted for the key.
    pub fn observe(&self, key: &SliceKey, value: &Value) -> bool {
        match self.controllers.get(key) {
            Some(controller) => {
                controller.observe(value);
                true
            }
            None => {
                tracing::trace!(%key, "no controller mounted");
                false
            }
        }
    }

    /// Record a remote-originated value for the key
    pub fn acknowledge(&self, key: &SliceKey, value: &Value) {
        if let Some(controller) = self.controllers.get(key) {
            controller.acknowledge(value);
        }
    }

    /// Cancel the key's pending write
    pub fn cancel(&self, key: &SliceKey) -> bool {
        self.controllers.get(key).is_some_and(|c| c.cancel())
    }

    /// Value last sent for the key
    #[must_use]
    pub fn last_written(&self, key: &SliceKey) -> Option<Value> {
        self.controllers.get(key).and_then(|c| c.last_written())
    }

    /// Drop every controller, cancelling outstanding timers
    ///
    /// Returns the number of timers cancelled.
    pub fn teardown(&self) -> usize {
        let keys: Vec<SliceKey> = self.controllers.iter().map(|e| e.key().clone()).collect();
        let mut cancelled = 0;
        for key in keys {
            if let Some((_, controller)) = self.controllers.remove(&key) {
                if controller.cancel() {
                    cancelled += 1;
                }
                self.retire(&controller);
            }
        }
        if cancelled > 0 {
            tracing::info!(cancelled, "cancelled pending writes on teardown");
        }
        cancelled
    }

    fn retire(&self, controller: &DebouncedController) {
        controller.cancel();
        let mut retired = self.retired.lock();
        *retired = retired.combine(controller.stats());
    }

    /// Whether a controller is mounted for the key
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &SliceKey) -> bool {
        self.controllers.contains_key(key)
    }

    /// Number of mounted controllers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// Check if no controllers are mounted
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Number of outstanding timers
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.controllers.iter().filter(|c| c.has_pending()).count()
    }

    /// Counters across live and retired controllers
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.controllers
            .iter()
            .fold(*self.retired.lock(), |acc, c| acc.combine(c.stats()))
    }

    /// Counters for one mounted controller
    #[must_use]
    pub fn stats_for(&self, key: &SliceKey) -> Option<SyncStats> {
        self.controllers.get(key).map(|c| c.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::TracingObserver;
    use huddle_store::{InMemoryRemote, UserId};
    use serde_json::json;

    fn registry() -> (SyncRegistry, Arc<SessionGate>, InMemoryRemote) {
        let gate = Arc::new(SessionGate::new());
        let remote = InMemoryRemote::new();
        let registry = SyncRegistry::new(gate.clone(), Arc::new(remote.clone()), Arc::new(TracingObserver));
        (registry, gate, remote)
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let (registry, gate, remote) = registry();
        let generation = gate.begin(UserId::new("u1")).unwrap();
        gate.mark_ready(generation, false);
        let roster = SliceKey::new("roster");
        let budget = SliceKey::new("budget");
        registry.mount(roster.clone(), Duration::from_millis(100), &json!([]));
        registry.mount(budget.clone(), Duration::from_millis(300), &json!({}));

        remote.fail_writes_for(&budget);
        registry.observe(&budget, &json!({"total": 1}));
        registry.observe(&roster, &json!(["a"]));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(remote.writes_for(&roster).len(), 1);
        let stats = registry.stats();
        assert_eq!(stats.written, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_timers() {
        let (registry, gate, remote) = registry();
        let generation = gate.begin(UserId::new("u1")).unwrap();
        gate.mark_ready(generation, false);
        let key = SliceKey::new("roster");
        registry.mount(key.clone(), Duration::from_millis(100), &json!([]));
        registry.observe(&key, &json!(["a"]));
        assert_eq!(registry.pending_count(), 1);

        assert_eq!(registry.teardown(), 1);
        assert!(registry.is_empty());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(remote.write_count(), 0);
        assert_eq!(registry.stats().superseded, 1);
    }

    #[test]
    fn observe_without_controller_is_ignored() {
        let (registry, _, _) = registry();
        assert!(!registry.observe(&SliceKey::new("roster"), &json!([])));
    }
}
