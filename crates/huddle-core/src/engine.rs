//! Sync engine facade
//!
//! Owns the session's slices and reacts to the single external fact it needs,
//! the signed-in user:
//! - `none -> id`: bootstrap, then mount one controller per slice
//! - `id -> other`: tear down, then bootstrap for the new user
//! - `id -> none`: tear down
//!
//! Editors see each slice as `(current, set)` through [`SliceHandle`] and never
//! talk to the remote store.

use crate::admins::AdminList;
use crate::bootstrap::{BootstrapReport, BootstrapSequencer};
use crate::catalog::{keys, SliceCatalog};
use crate::cold_start::load_slices;
use crate::config::HuddleConfig;
use crate::error::{SyncError, ValidationError};
use crate::observer::{SyncObserver, SyncStats, TracingObserver};
use crate::registry::SyncRegistry;
use crate::session::{SessionGate, SessionPhase};
use crate::validate::{SliceValidator, SliceView, WristbandSlotValidator};
use dashmap::DashMap;
use futures::future::join_all;
use huddle_access::{normalize_role_matrices, resolve, Action, PermissionMatrix};
use huddle_scope::{
    assign_slot, backfill, instantiate, GlobalTemplates, ScopedEntity, TemplateField, WristbandSettings,
};
use huddle_store::{write_json, LocalCache, RemoteStore, SliceKey, StoreError, Subscription, UserId};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};

/// Builder for [`SyncEngine`]
#[derive(Debug)]
pub struct SyncEngineBuilder {
    config: HuddleConfig,
    catalog: SliceCatalog,
    local: Arc<dyn LocalCache>,
    remote: Arc<dyn RemoteStore>,
    observer: Arc<dyn SyncObserver>,
    validators: Vec<Arc<dyn SliceValidator>>,
}

impl SyncEngineBuilder {
    /// With configuration
    #[must_use]
    pub fn with_config(mut self, config: HuddleConfig) -> Self {
        self.config = config;
        self
    }

    /// With slice catalog
    #[must_use]
    pub fn with_catalog(mut self, catalog: SliceCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// With write observer
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// With an additional validator
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn SliceValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Build the engine and load slices from the local cache
    #[must_use]
    pub fn build(self) -> SyncEngine {
        let catalog = Arc::new(self.catalog);
        let gate = Arc::new(SessionGate::new());
        let sequencer = BootstrapSequencer::new(
            self.remote.clone(),
            self.local.clone(),
            catalog.clone(),
            gate.clone(),
        );
        let registry = SyncRegistry::new(gate.clone(), self.remote.clone(), self.observer.clone());

        let loaded = load_slices(self.local.as_ref(), &catalog);
        let slices: DashMap<SliceKey, Value> = loaded.values.into_iter().collect();
        tracing::info!(
            slices = slices.len(),
            recovered = loaded.recovered.len(),
            upgraded = loaded.upgraded.len(),
            "cold start loaded"
        );

        SyncEngine {
            inner: Arc::new(EngineInner {
                config: self.config,
                catalog,
                local: self.local,
                remote: self.remote,
                observer: self.observer,
                gate,
                sequencer,
                registry,
                admins: AdminList::new(),
                slices,
                validators: self.validators,
                live: Mutex::new(Vec::new()),
                session: Mutex::new(None),
                last_bootstrap: Mutex::new(None),
                transition: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

#[derive(Debug)]
struct EngineInner {
    config: HuddleConfig,
    catalog: Arc<SliceCatalog>,
    local: Arc<dyn LocalCache>,
    remote: Arc<dyn RemoteStore>,
    observer: Arc<dyn SyncObserver>,
    gate: Arc<SessionGate>,
    sequencer: BootstrapSequencer,
    registry: SyncRegistry,
    admins: AdminList,
    slices: DashMap<SliceKey, Value>,
    validators: Vec<Arc<dyn SliceValidator>>,
    live: Mutex<Vec<Subscription>>,
    /// User whose session finished setting up
    session: Mutex<Option<UserId>>,
    last_bootstrap: Mutex<Option<BootstrapReport>>,
    /// Serializes user transitions
    transition: tokio::sync::Mutex<()>,
}

impl EngineInner {
    fn store_local(&self, key: &SliceKey, value: &Value) -> Result<(), StoreError> {
        write_json(self.local.as_ref(), key, value)
    }

    fn teardown(&self) {
        self.registry.teardown();
        let live = std::mem::take(&mut *self.live.lock());
        for subscription in live {
            subscription.unsubscribe();
        }
        self.admins.detach();
        *self.session.lock() = None;
    }

    fn reload_slices(&self) {
        let loaded = load_slices(self.local.as_ref(), &self.catalog);
        for (key, value) in loaded.values {
            self.slices.insert(key, value);
        }
    }

    fn mount_controllers(&self) {
        for spec in self.catalog.iter() {
            let value = self
                .slices
                .get(&spec.key)
                .map_or_else(|| spec.default.clone(), |v| v.value().clone());
            let debounce = self.config.debounce_for(&spec.key, spec.debounce);
            self.registry.mount(spec.key.clone(), debounce, &value);
        }
    }

    fn subscribe_live(self: &Arc<Self>, user: &UserId, generation: u64) {
        let mut subscriptions = Vec::new();
        for spec in self.catalog.iter().filter(|s| s.live) {
            let weak: Weak<Self> = Arc::downgrade(self);
            let key = spec.key.clone();
            subscriptions.push(self.remote.subscribe(
                user,
                &spec.key,
                Arc::new(move |document: Option<Value>| {
                    if let Some(inner) = weak.upgrade() {
                        inner.apply_remote(&key, generation, document);
                    }
                }),
            ));
        }
        *self.live.lock() = subscriptions;
    }

    /// Apply a live push from another device
    fn apply_remote(&self, key: &SliceKey, generation: u64, document: Option<Value>) {
        if !self.gate.is_ready_for(generation) {
            return;
        }
        let Some(document) = document else {
            return;
        };
        if self.registry.last_written(key).as_ref() == Some(&document) {
            tracing::trace!(%key, "ignoring echo of own write");
            return;
        }
        let Some(spec) = self.catalog.get(key) else {
            return;
        };
        let value = spec.normalize(Some(document), &[]);
        if self.slices.get(key).is_some_and(|current| *current == value) {
            return;
        }
        if let Err(error) = self.store_local(key, &value) {
            tracing::warn!(%key, %error, "could not cache live update");
        }
        self.registry.acknowledge(key, &value);
        self.slices.insert(key.clone(), value);
        tracing::info!(%key, "applied live update");
    }
}

/// Slice synchronization engine
///
/// Cheap to clone; clones share the same session.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Start building an engine over the given stores
    #[must_use]
    pub fn builder(local: Arc<dyn LocalCache>, remote: Arc<dyn RemoteStore>) -> SyncEngineBuilder {
        SyncEngineBuilder {
            config: HuddleConfig::default(),
            catalog: SliceCatalog::builtin(),
            local,
            remote,
            observer: Arc::new(TracingObserver),
            validators: vec![Arc::new(WristbandSlotValidator)],
        }
    }

    /// React to the signed-in user changing
    ///
    /// Returns the bootstrap report when a bootstrap ran. Setting the user
    /// already in session is a no-op.
    ///
    /// # Errors
    /// `SyncError::InvalidTransition` if the session cannot move to the
    /// requested phase
    pub async fn set_user(&self, user: Option<UserId>) -> Result<Option<BootstrapReport>, SyncError> {
        let inner = &self.inner;
        let _transition = inner.transition.lock().await;
        let established = inner.session.lock().clone();

        let Some(user) = user else {
            if inner.gate.phase() != SessionPhase::SignedOut {
                inner.teardown();
                inner.gate.sign_out();
            }
            return Ok(None);
        };
        if established.as_ref() == Some(&user) {
            tracing::debug!(%user, "user already in session");
            return Ok(None);
        }

        inner.teardown();
        let generation = inner.gate.begin(user.clone())?;
        inner
            .admins
            .attach(inner.remote.as_ref(), &inner.config.admin_owner(), &inner.config.admin_key())
            .await;

        let outcome = inner.sequencer.run(&user, generation).await;
        let report = outcome.report().cloned();

        inner.reload_slices();
        inner.mount_controllers();
        inner.subscribe_live(&user, generation);
        *inner.session.lock() = Some(user);
        if let Some(report) = &report {
            *inner.last_bootstrap.lock() = Some(report.clone());
        }
        Ok(report)
    }

    /// Current value of a slice
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.slices.get(&SliceKey::new(key)).map(|v| v.value().clone())
    }

    /// Replace a slice value
    ///
    /// A value equal to the current one is a no-op. Validators run first; a
    /// rejected value changes nothing. Accepted values are cached locally at
    /// once and written remotely after the debounce.
    ///
    /// # Errors
    /// `UnknownSlice`, `Validation`, or `Store` if the local write fails
    pub fn set(&self, key: &str, value: Value) -> Result<(), SyncError> {
        let inner = &self.inner;
        let key = SliceKey::new(key);
        if !inner.catalog.contains(&key) {
            return Err(SyncError::UnknownSlice(key));
        }
        if inner.slices.get(&key).is_some_and(|current| *current == value) {
            tracing::trace!(%key, "unchanged value ignored");
            return Ok(());
        }
        let view = SliceView::new(&inner.slices);
        for validator in &inner.validators {
            validator.validate(&key, &value, &view)?;
        }
        inner.store_local(&key, &value)?;
        inner.slices.insert(key.clone(), value.clone());
        inner.registry.observe(&key, &value);
        Ok(())
    }

    /// `(current, set)` handle for one slice
    ///
    /// # Errors
    /// `UnknownSlice` if the key is not catalogued
    pub fn handle(&self, key: &str) -> Result<SliceHandle, SyncError> {
        let key = SliceKey::new(key);
        if !self.inner.catalog.contains(&key) {
            return Err(SyncError::UnknownSlice(key));
        }
        Ok(SliceHandle {
            engine: self.clone(),
            key,
        })
    }

    /// Write slices to the remote store immediately
    ///
    /// Pushes one slice, or every slice when `key` is `None`, cancelling any
    /// pending debounced write for them. Unlike automatic writes, failures are
    /// returned.
    ///
    /// # Errors
    /// `NoSession`/`NotReady` before bootstrap, `UnknownSlice`, or `PushFailed`
    /// listing every slice that could not be written
    pub async fn force_push(&self, key: Option<&str>) -> Result<usize, SyncError> {
        let inner = &self.inner;
        let gate = inner.gate.snapshot();
        let Some(user) = gate.user else {
            return Err(SyncError::NoSession);
        };
        if !gate.ready {
            return Err(SyncError::NotReady);
        }

        let keys = match key {
            Some(k) => {
                let k = SliceKey::new(k);
                if !inner.catalog.contains(&k) {
                    return Err(SyncError::UnknownSlice(k));
                }
                vec![k]
            }
            None => inner.catalog.keys(),
        };
        let batch: Vec<(SliceKey, Value)> = keys
            .into_iter()
            .filter_map(|k| {
                let value = inner.slices.get(&k).map(|v| v.value().clone())?;
                inner.registry.acknowledge(&k, &value);
                Some((k, value))
            })
            .collect();

        let writes = batch.iter().map(|(k, value)| {
            let user = &user;
            async move { (k, inner.remote.write(user, k, value).await) }
        });
        let mut written = 0;
        let mut failures = Vec::new();
        for (k, result) in join_all(writes).await {
            match result {
                Ok(()) => {
                    written += 1;
                    inner.observer.on_written(&user, k);
                }
                Err(error) => {
                    inner.observer.on_write_failed(&user, k, &error);
                    failures.push((k.clone(), error));
                }
            }
        }
        tracing::info!(written, failed = failures.len(), "force push finished");
        if failures.is_empty() {
            Ok(written)
        } else {
            Err(SyncError::PushFailed { written, failures })
        }
    }

    /// Effective permissions of the signed-in user
    ///
    /// Roles come from the user's `staff` entry, matrices from
    /// `rolePermissions`, and the super-admin flag from the live
    /// administrator list.
    #[must_use]
    pub fn permissions(&self) -> PermissionMatrix {
        let inner = &self.inner;
        let matrices = normalize_role_matrices(self.get(keys::ROLE_PERMISSIONS).as_ref());
        let Some(user) = inner.gate.user() else {
            return resolve(Vec::<String>::new(), &matrices, false);
        };
        let staff = self.get(keys::STAFF).unwrap_or(Value::Null);
        let roles: Vec<String> = staff
            .as_array()
            .into_iter()
            .flatten()
            .find(|member| member.get("userId").and_then(Value::as_str) == Some(user.as_str()))
            .and_then(|member| member.get("roles"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        resolve(roles, &matrices, inner.admins.contains(&user))
    }

    /// Guard an action for the signed-in user
    ///
    /// # Errors
    /// `SyncError::Access` when the effective matrix lacks the capability
    pub fn require(&self, feature: &str, action: Action) -> Result<(), SyncError> {
        Ok(self.permissions().require(feature, action)?)
    }

    /// Team-wide templates new weeks inherit from
    #[must_use]
    pub fn global_templates(&self) -> GlobalTemplates {
        let mut templates = GlobalTemplates::new();
        if let Some(v) = self.get(keys::WRISTBAND_SETTINGS) {
            templates = templates.with_wristbands(v);
        }
        if let Some(v) = self.get(keys::DEPTH_CHART) {
            templates = templates.with_depth_chart(v);
        }
        if let Some(v) = self.get(keys::ZONE_PHILOSOPHIES) {
            templates = templates.with_zone_philosophies(v);
        }
        templates
    }

    fn stored_weeks(&self) -> Result<Vec<ScopedEntity>, SyncError> {
        let key = SliceKey::new(keys::WEEKS);
        match self.get(keys::WEEKS) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| SyncError::malformed(&key, e.to_string())),
        }
    }

    fn store_weeks(&self, weeks: &[ScopedEntity]) -> Result<(), SyncError> {
        let value = serde_json::to_value(weeks)
            .map_err(|e| SyncError::malformed(&SliceKey::new(keys::WEEKS), e.to_string()))?;
        self.set(keys::WEEKS, value)
    }

    /// Weeks with missing template fields filled for display
    ///
    /// The stored slice is not changed.
    ///
    /// # Errors
    /// `Malformed` if the weeks slice is not a list of weeks
    pub fn weeks_view(&self) -> Result<Vec<ScopedEntity>, SyncError> {
        let mut weeks = self.stored_weeks()?;
        backfill(&mut weeks, &self.global_templates());
        Ok(weeks)
    }

    /// Append a week carrying forward the previous week's templates
    ///
    /// # Errors
    /// `Validation` if a week with the id exists, `Malformed` if the weeks
    /// slice cannot be read
    pub fn create_week(&self, week_id: &str) -> Result<ScopedEntity, SyncError> {
        let mut weeks = self.stored_weeks()?;
        if weeks.iter().any(|w| w.id == week_id) {
            return Err(ValidationError::rejected(
                &SliceKey::new(keys::WEEKS),
                format!("week '{week_id}' already exists"),
            )
            .into());
        }
        let week = instantiate(week_id, weeks.last(), &self.global_templates());
        weeks.push(week.clone());
        self.store_weeks(&weeks)?;
        tracing::info!(week = week_id, "created week");
        Ok(week)
    }

    /// Assign a play to a wristband slot
    ///
    /// `week` selects that week's own layout; `None` edits the global layout.
    /// Conflicts are rejected before anything changes.
    ///
    /// # Errors
    /// `Slot` on conflict or bad card/slot, `Malformed` on unreadable layouts
    pub fn assign_wristband_slot(
        &self,
        week: Option<&str>,
        card_id: &str,
        play_id: &str,
        slot: u32,
    ) -> Result<(), SyncError> {
        let Some(week_id) = week else {
            let key = SliceKey::new(keys::WRISTBAND_SETTINGS);
            let current = self.get(keys::WRISTBAND_SETTINGS).unwrap_or(Value::Null);
            let mut settings =
                WristbandSettings::from_value(&current).map_err(|e| SyncError::malformed(&key, e.to_string()))?;
            assign_slot(&mut settings, card_id, play_id, slot)?;
            return self.set(keys::WRISTBAND_SETTINGS, settings.to_value());
        };

        let key = SliceKey::new(keys::WEEKS);
        let mut weeks = self.stored_weeks()?;
        let Some(index) = weeks.iter().position(|w| w.id == week_id) else {
            return Err(ValidationError::rejected(&key, format!("no week '{week_id}'")).into());
        };
        // a week created before it had its own layout shows the inherited one
        let current = match weeks[index].field(TemplateField::Wristbands) {
            Some(own) => own.clone(),
            None => self.weeks_view()?[index].wristbands.clone().unwrap_or(Value::Null),
        };
        let mut settings =
            WristbandSettings::from_value(&current).map_err(|e| SyncError::malformed(&key, e.to_string()))?;
        assign_slot(&mut settings, card_id, play_id, slot)?;
        weeks[index].wristbands = Some(settings.to_value());
        self.store_weeks(&weeks)
    }

    /// Gate shared with controllers
    #[must_use]
    pub fn gate(&self) -> &SessionGate {
        &self.inner.gate
    }

    /// Current session phase
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.inner.gate.phase()
    }

    /// Whether writes are allowed
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.gate.is_ready()
    }

    /// Whether the last bootstrap found a new or deleted account
    #[must_use]
    pub fn is_wiped(&self) -> bool {
        self.inner.gate.wiped()
    }

    /// Report of the most recent bootstrap
    #[must_use]
    pub fn last_bootstrap(&self) -> Option<BootstrapReport> {
        self.inner.last_bootstrap.lock().clone()
    }

    /// Controller counters for the engine's lifetime
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.inner.registry.stats()
    }

    /// Number of debounced writes waiting to fire
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.inner.registry.pending_count()
    }

    /// Whether the administrator list subscription is held
    #[must_use]
    pub fn admin_list_attached(&self) -> bool {
        self.inner.admins.is_attached()
    }

    /// Slice catalog
    #[must_use]
    pub fn catalog(&self) -> &SliceCatalog {
        &self.inner.catalog
    }

    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> &HuddleConfig {
        &self.inner.config
    }
}

/// Editor-facing view of one slice
#[derive(Debug, Clone)]
pub struct SliceHandle {
    engine: SyncEngine,
    key: SliceKey,
}

impl SliceHandle {
    /// Slice key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &SliceKey {
        &self.key
    }

    /// Current value
    #[must_use]
    pub fn current(&self) -> Value {
        self.engine.get(self.key.as_str()).unwrap_or(Value::Null)
    }

    /// Replace the value
    ///
    /// # Errors
    /// Same as [`SyncEngine::set`]
    pub fn set(&self, value: Value) -> Result<(), SyncError> {
        self.engine.set(self.key.as_str(), value)
    }
}
