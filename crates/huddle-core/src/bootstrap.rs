//! Bootstrap sequencer
//!
//! Pulls every catalogued slice for a user into the local cache, once per
//! session generation, then opens the gate. The gate opens whatever happens
//! to the pull: per-slice failures are tolerated, and dropping the future
//! part-way still opens it for the generation it was started for.

use crate::catalog::SliceCatalog;
use crate::session::SessionGate;
use futures::future::join_all;
use huddle_store::{write_json, AccountStatus, LocalCache, RemoteStore, SliceKey, StoreError, UserId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Reserved cache key naming the user whose slices the cache holds
pub const OWNER_KEY: &str = "__huddle_owner";

/// Summary of one bootstrap pull
#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    pub user: Option<UserId>,
    pub generation: u64,
    /// Slices pulled into the cache
    pub loaded: Vec<SliceKey>,
    /// Slices the remote store has no document for
    pub missing: Vec<SliceKey>,
    /// Slices whose read failed; the cached value stands
    pub failed: Vec<(SliceKey, StoreError)>,
    /// Account status, when it could be determined
    pub account: Option<AccountStatus>,
    /// New or previously deleted account
    pub wiped: bool,
    /// Cached slices removed because they belonged to someone else or a deleted account
    pub cleared: usize,
    /// Whether this run opened the gate
    pub opened_gate: bool,
}

/// Outcome of [`BootstrapSequencer::run`]
#[derive(Debug, Clone)]
pub enum BootstrapOutcome {
    /// The pull ran
    Completed(BootstrapReport),
    /// This generation was already bootstrapped
    AlreadyDone,
}

impl BootstrapOutcome {
    /// Report, if the pull ran
    #[must_use]
    pub fn report(&self) -> Option<&BootstrapReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::AlreadyDone => None,
        }
    }
}

/// Opens the gate when dropped
struct ReadyGuard<'a> {
    gate: &'a SessionGate,
    generation: u64,
    wiped: bool,
    opened: Option<bool>,
}

impl ReadyGuard<'_> {
    fn open(mut self) -> bool {
        let opened = self.gate.mark_ready(self.generation, self.wiped);
        self.opened = Some(opened);
        opened
    }
}

impl Drop for ReadyGuard<'_> {
    fn drop(&mut self) {
        if self.opened.is_none() {
            tracing::warn!(generation = self.generation, "bootstrap abandoned, opening gate");
            self.gate.mark_ready(self.generation, self.wiped);
        }
    }
}

/// One-pull-per-session loader
#[derive(Debug)]
pub struct BootstrapSequencer {
    remote: Arc<dyn RemoteStore>,
    local: Arc<dyn LocalCache>,
    catalog: Arc<SliceCatalog>,
    gate: Arc<SessionGate>,
    /// Latest generation a run was started for
    claimed: Mutex<Option<u64>>,
}

impl BootstrapSequencer {
    /// Create sequencer
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        local: Arc<dyn LocalCache>,
        catalog: Arc<SliceCatalog>,
        gate: Arc<SessionGate>,
    ) -> Self {
        Self {
            remote,
            local,
            catalog,
            gate,
            claimed: Mutex::new(None),
        }
    }

    /// Pull every slice for `user` under `generation` and open the gate
    ///
    /// A call for a generation at or below the latest one already run does
    /// nothing; generations only grow, so an older one is a stale session.
    pub async fn run(&self, user: &UserId, generation: u64) -> BootstrapOutcome {
        {
            let mut claimed = self.claimed.lock();
            if claimed.is_some_and(|latest| latest >= generation) {
                tracing::debug!(%user, generation, "bootstrap already ran for this session");
                return BootstrapOutcome::AlreadyDone;
            }
            *claimed = Some(generation);
        }

        let mut guard = ReadyGuard {
            gate: &self.gate,
            generation,
            wiped: false,
            opened: None,
        };
        let mut report = BootstrapReport {
            user: Some(user.clone()),
            generation,
            ..BootstrapReport::default()
        };

        report.cleared += self.claim_cache(user);

        match self.remote.account_status(user).await {
            Ok(status) => {
                report.account = Some(status);
                report.wiped = status.is_wiped();
                guard.wiped = report.wiped;
                if status == AccountStatus::Deleted {
                    report.cleared += self.clear_slices();
                }
            }
            Err(error) => tracing::warn!(%user, %error, "account status unavailable"),
        }

        let reads = self.catalog.iter().map(|spec| async move {
            let result = self.remote.read(user, &spec.key).await;
            (spec, result)
        });
        for (spec, result) in join_all(reads).await {
            match result {
                Ok(Some(document)) => {
                    let value = spec.normalize(Some(document), &[]);
                    match write_json(self.local.as_ref(), &spec.key, &value) {
                        Ok(()) => report.loaded.push(spec.key.clone()),
                        Err(error) => {
                            tracing::warn!(key = %spec.key, %error, "could not cache pulled slice");
                            report.failed.push((spec.key.clone(), error));
                        }
                    }
                }
                Ok(None) => report.missing.push(spec.key.clone()),
                Err(error) => {
                    tracing::warn!(key = %spec.key, %error, "remote read failed, keeping cached value");
                    report.failed.push((spec.key.clone(), error));
                }
            }
        }

        report.opened_gate = guard.open();
        tracing::info!(
            %user,
            generation,
            loaded = report.loaded.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            wiped = report.wiped,
            "bootstrap complete"
        );
        BootstrapOutcome::Completed(report)
    }

    /// Latest generation a run was started for
    #[must_use]
    pub fn latest_generation(&self) -> Option<u64> {
        *self.claimed.lock()
    }

    /// Take ownership of the cache for `user`, clearing another user's slices
    fn claim_cache(&self, user: &UserId) -> usize {
        let owner = self.local.get(OWNER_KEY);
        let cleared = match owner.as_deref() {
            Some(previous) if previous != user.as_str() => {
                tracing::info!(%user, previous, "cache held another user's slices");
                self.clear_slices()
            }
            _ => 0,
        };
        self.local.set(OWNER_KEY, user.as_str().to_string());
        cleared
    }

    fn clear_slices(&self) -> usize {
        let present: HashSet<String> = self.local.keys().into_iter().collect();
        let mut cleared = 0;
        for key in self.catalog.keys() {
            if present.contains(key.as_str()) {
                self.local.remove(key.as_str());
                cleared += 1;
            }
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::keys;
    use huddle_store::{read_json, InMemoryRemote, MemoryCache};
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        remote: InMemoryRemote,
        local: Arc<MemoryCache>,
        gate: Arc<SessionGate>,
        sequencer: BootstrapSequencer,
    }

    fn fixture() -> Fixture {
        let remote = InMemoryRemote::new();
        let local = Arc::new(MemoryCache::new());
        let gate = Arc::new(SessionGate::new());
        let sequencer = BootstrapSequencer::new(
            Arc::new(remote.clone()),
            local.clone(),
            Arc::new(SliceCatalog::builtin()),
            gate.clone(),
        );
        Fixture { remote, local, gate, sequencer }
    }

    #[tokio::test]
    async fn pulls_documents_into_cache_and_opens_gate() {
        let f = fixture();
        let user = UserId::new("u1");
        f.remote.seed(&user, &SliceKey::new(keys::ROSTER), json!([{"name": "Kai"}]));
        let generation = f.gate.begin(user.clone()).unwrap();

        let outcome = f.sequencer.run(&user, generation).await;
        let report = outcome.report().unwrap();

        assert!(report.opened_gate);
        assert!(f.gate.is_ready());
        assert!(!report.wiped);
        assert_eq!(report.loaded, vec![SliceKey::new(keys::ROSTER)]);
        assert_eq!(
            read_json(f.local.as_ref(), &SliceKey::new(keys::ROSTER)).unwrap(),
            Some(json!([{"name": "Kai"}]))
        );
    }

    #[tokio::test]
    async fn second_run_is_noop() {
        let f = fixture();
        let user = UserId::new("u1");
        let generation = f.gate.begin(user.clone()).unwrap();
        f.sequencer.run(&user, generation).await;
        let reads = f.remote.read_count();

        assert!(matches!(f.sequencer.run(&user, generation).await, BootstrapOutcome::AlreadyDone));
        assert_eq!(f.remote.read_count(), reads);
    }

    #[tokio::test]
    async fn only_latest_generation_is_remembered() {
        let f = fixture();
        let user = UserId::new("u1");
        let first = f.gate.begin(user.clone()).unwrap();
        f.sequencer.run(&user, first).await;
        let second = f.gate.begin(UserId::new("u2")).unwrap();
        f.sequencer.run(&UserId::new("u2"), second).await;
        assert_eq!(f.sequencer.latest_generation(), Some(second));

        let reads = f.remote.read_count();
        assert!(matches!(f.sequencer.run(&user, first).await, BootstrapOutcome::AlreadyDone));
        assert_eq!(f.remote.read_count(), reads);
        assert_eq!(f.sequencer.latest_generation(), Some(second));
    }

    #[tokio::test]
    async fn failed_reads_still_open_gate() {
        let f = fixture();
        let user = UserId::new("u1");
        f.local.set(keys::BUDGET, r#"{"total": 5}"#.to_string());
        f.remote.fail_reads_for(&SliceKey::new(keys::BUDGET));
        let generation = f.gate.begin(user.clone()).unwrap();

        let outcome = f.sequencer.run(&user, generation).await;
        let report = outcome.report().unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(f.gate.is_ready());
        assert_eq!(f.local.get(keys::BUDGET).as_deref(), Some(r#"{"total": 5}"#));
    }

    #[tokio::test]
    async fn offline_store_still_opens_gate() {
        let f = fixture();
        let user = UserId::new("u1");
        f.remote.set_offline(true);
        let generation = f.gate.begin(user.clone()).unwrap();
        let outcome = f.sequencer.run(&user, generation).await;
        assert_eq!(outcome.report().unwrap().failed.len(), SliceCatalog::builtin().len());
        assert!(f.gate.is_ready());
    }

    #[tokio::test]
    async fn new_account_is_wiped() {
        let f = fixture();
        let user = UserId::new("fresh");
        let generation = f.gate.begin(user.clone()).unwrap();
        let outcome = f.sequencer.run(&user, generation).await;
        assert_eq!(outcome.report().unwrap().account, Some(AccountStatus::New));
        assert!(f.gate.wiped());
    }

    #[tokio::test]
    async fn deleted_account_clears_cache() {
        let f = fixture();
        let user = UserId::new("gone");
        f.local.set(OWNER_KEY, "gone".to_string());
        f.local.set(keys::ROSTER, "[1]".to_string());
        f.remote.mark_deleted(&user);
        let generation = f.gate.begin(user.clone()).unwrap();

        let outcome = f.sequencer.run(&user, generation).await;
        let report = outcome.report().unwrap();
        assert!(report.wiped);
        assert_eq!(report.cleared, 1);
        assert!(f.local.get(keys::ROSTER).is_none());
    }

    #[tokio::test]
    async fn other_users_cache_is_cleared() {
        let f = fixture();
        f.local.set(OWNER_KEY, "previous".to_string());
        f.local.set(keys::ROSTER, "[1]".to_string());
        let user = UserId::new("u2");
        let generation = f.gate.begin(user.clone()).unwrap();

        f.sequencer.run(&user, generation).await;
        assert!(f.local.get(keys::ROSTER).is_none());
        assert_eq!(f.local.get(OWNER_KEY).as_deref(), Some("u2"));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_bootstrap_opens_gate() {
        let f = fixture();
        f.remote.set_latency(Some(Duration::from_secs(10)));
        let user = UserId::new("u1");
        let generation = f.gate.begin(user.clone()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), f.sequencer.run(&user, generation)).await;
        assert!(result.is_err());
        assert!(f.gate.is_ready_for(generation));
    }
}
