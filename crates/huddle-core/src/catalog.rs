//! Slice catalog
//!
//! One [`SliceSpec`] per synchronized domain: its default shape, debounce,
//! migration steps and the legacy cache keys it absorbs. The engine never
//! special-cases a domain outside this table.

use huddle_access::default_role_matrices;
use huddle_migrate::{
    default_feature_visibility, merge, staff_plan, visibility_plan, FieldMapping, FlatKey,
    LegacySource, MigrationPlan,
};
use huddle_store::SliceKey;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Built-in slice keys
pub mod keys {
    pub const ROSTER: &str = "roster";
    pub const STAFF: &str = "staff";
    pub const PLAYBOOK: &str = "playbook";
    pub const SCHEDULE: &str = "schedule";
    pub const PRACTICE_PLANS: &str = "practicePlans";
    pub const BUDGET: &str = "budget";
    pub const ROLE_PERMISSIONS: &str = "rolePermissions";
    pub const FEATURE_VISIBILITY: &str = "featureVisibility";
    pub const WRISTBAND_SETTINGS: &str = "wristbandSettings";
    pub const DEPTH_CHART: &str = "depthChart";
    pub const ZONE_PHILOSOPHIES: &str = "zonePhilosophies";
    pub const WEEKS: &str = "weeks";
    pub const OPPONENTS: &str = "opponents";
    pub const SETTINGS: &str = "settings";
}

/// Differently-shaped value stored under its own cache key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyKey {
    pub cache_key: String,
    pub mappings: Vec<FieldMapping>,
}

impl LegacyKey {
    /// Create with no mappings
    #[must_use]
    pub fn new(cache_key: impl Into<String>) -> Self {
        Self {
            cache_key: cache_key.into(),
            mappings: Vec::new(),
        }
    }

    /// Add a field mapping
    #[must_use]
    pub fn map(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.mappings.push(FieldMapping::new(from, to));
        self
    }

    /// Attach the value read from the cache
    #[must_use]
    pub fn source(&self, value: Value) -> LegacySource {
        LegacySource {
            name: self.cache_key.clone(),
            value,
            mappings: self.mappings.clone(),
        }
    }
}

/// Definition of one synchronized slice
#[derive(Debug, Clone)]
pub struct SliceSpec {
    pub key: SliceKey,
    pub default: Value,
    /// Own debounce; `None` uses the configured default
    pub debounce: Option<Duration>,
    /// Receives live pushes from the remote store
    pub live: bool,
    pub plan: MigrationPlan,
    pub flat_keys: Vec<FlatKey>,
    pub legacy_keys: Vec<LegacyKey>,
}

impl SliceSpec {
    /// Create spec with a default value
    #[must_use]
    pub fn new(key: impl Into<String>, default: Value) -> Self {
        Self {
            key: SliceKey::new(key),
            default,
            debounce: None,
            live: false,
            plan: MigrationPlan::new(),
            flat_keys: Vec::new(),
            legacy_keys: Vec::new(),
        }
    }

    /// With own debounce
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    /// With migration plan
    #[must_use]
    pub fn with_plan(mut self, plan: MigrationPlan) -> Self {
        self.plan = plan;
        self
    }

    /// With absorbed flat key
    #[must_use]
    pub fn with_flat_key(mut self, cache_key: &str, pointer: &str) -> Self {
        self.flat_keys.push(FlatKey::new(cache_key, pointer));
        self
    }

    /// With legacy source key
    #[must_use]
    pub fn with_legacy_key(mut self, legacy: LegacyKey) -> Self {
        self.legacy_keys.push(legacy);
        self
    }

    /// Mark as live
    #[must_use]
    pub fn live(mut self) -> Self {
        self.live = true;
        self
    }

    /// Migrate and complete a persisted value
    ///
    /// `None` yields the default.
    #[must_use]
    pub fn normalize(&self, persisted: Option<Value>, legacy: &[LegacySource]) -> Value {
        let migrated = persisted.map(|value| {
            let report = self.plan.run(value);
            if report.migrated() {
                tracing::debug!(key = %self.key, steps = ?report.applied, "migrated persisted shape");
            }
            report.value
        });
        merge(&self.default, migrated.as_ref(), legacy)
    }
}

/// Ordered slice table
#[derive(Debug, Clone, Default)]
pub struct SliceCatalog {
    specs: Vec<SliceSpec>,
    index: HashMap<SliceKey, usize>,
}

impl SliceCatalog {
    /// Create empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dashboard domains
    #[must_use]
    pub fn builtin() -> Self {
        let role_defaults = serde_json::to_value(default_role_matrices()).unwrap_or_else(|_| json!({}));
        Self::new()
            .with(SliceSpec::new(keys::ROSTER, json!([])).with_debounce(Duration::from_millis(1000)))
            .with(SliceSpec::new(keys::STAFF, json!([])).with_plan(staff_plan()))
            .with(SliceSpec::new(keys::PLAYBOOK, json!({"plays": [], "formations": []})))
            .with(SliceSpec::new(keys::SCHEDULE, json!({"games": [], "practices": []})))
            .with(SliceSpec::new(keys::PRACTICE_PLANS, json!([])))
            .with(
                SliceSpec::new(keys::BUDGET, json!({"total": 0, "ledger": []}))
                    .with_debounce(Duration::from_millis(2000))
                    .with_flat_key("budgetTotal", "/total"),
            )
            .with(SliceSpec::new(keys::ROLE_PERMISSIONS, role_defaults).live())
            .with(
                SliceSpec::new(keys::FEATURE_VISIBILITY, default_feature_visibility())
                    .with_plan(visibility_plan())
                    .with_legacy_key(
                        LegacyKey::new("scoutingSettings")
                            .map("/filmRoom", "/categories/opponents/items/film")
                            .map("/tendencyReports", "/categories/opponents/items/tendencies"),
                    ),
            )
            .with(SliceSpec::new(keys::WRISTBAND_SETTINGS, json!({"cards": []})))
            .with(SliceSpec::new(keys::DEPTH_CHART, json!({})))
            .with(SliceSpec::new(keys::ZONE_PHILOSOPHIES, json!({})))
            .with(SliceSpec::new(keys::WEEKS, json!([])))
            .with(SliceSpec::new(keys::OPPONENTS, json!([])))
            .with(
                SliceSpec::new(
                    keys::SETTINGS,
                    json!({"teamName": "", "seasonYear": null, "theme": "light"}),
                )
                .with_flat_key("teamName", "/teamName")
                .with_flat_key("seasonYear", "/seasonYear")
                .with_flat_key("theme", "/theme"),
            )
    }

    /// Add or replace a spec
    #[must_use]
    pub fn with(mut self, spec: SliceSpec) -> Self {
        if let Some(&i) = self.index.get(&spec.key) {
            self.specs[i] = spec;
        } else {
            self.index.insert(spec.key.clone(), self.specs.len());
            self.specs.push(spec);
        }
        self
    }

    /// Look up a spec
    #[must_use]
    pub fn get(&self, key: &SliceKey) -> Option<&SliceSpec> {
        self.index.get(key).map(|&i| &self.specs[i])
    }

    /// Whether the key is catalogued
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &SliceKey) -> bool {
        self.index.contains_key(key)
    }

    /// Specs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &SliceSpec> {
        self.specs.iter()
    }

    /// Keys in declaration order
    #[must_use]
    pub fn keys(&self) -> Vec<SliceKey> {
        self.specs.iter().map(|s| s.key.clone()).collect()
    }

    /// Number of slices
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if catalog is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_keys_are_unique_and_ordered() {
        let catalog = SliceCatalog::builtin();
        assert_eq!(catalog.len(), 14);
        assert_eq!(catalog.keys()[0], SliceKey::new(keys::ROSTER));
        assert!(catalog.contains(&SliceKey::new(keys::WEEKS)));
    }

    #[test]
    fn with_replaces_existing_spec() {
        let catalog = SliceCatalog::builtin().with(SliceSpec::new(keys::ROSTER, json!({"players": []})));
        assert_eq!(catalog.len(), 14);
        assert_eq!(catalog.get(&SliceKey::new(keys::ROSTER)).unwrap().default, json!({"players": []}));
    }

    #[test]
    fn normalize_runs_steps_then_merge() {
        let catalog = SliceCatalog::builtin();
        let staff = catalog.get(&SliceKey::new(keys::STAFF)).unwrap();
        let value = staff.normalize(Some(json!([{"name": "Lee", "role": "Asst. Coach"}])), &[]);
        assert_eq!(value, json!([{"name": "Lee", "roles": ["Position Coach"]}]));
    }

    #[test]
    fn normalize_without_value_is_default() {
        let catalog = SliceCatalog::builtin();
        let budget = catalog.get(&SliceKey::new(keys::BUDGET)).unwrap();
        assert_eq!(budget.normalize(None, &[]), json!({"total": 0, "ledger": []}));
    }

    #[test]
    fn role_permissions_default_round_trips() {
        let catalog = SliceCatalog::builtin();
        let spec = catalog.get(&SliceKey::new(keys::ROLE_PERMISSIONS)).unwrap();
        assert!(spec.live);
        let matrices = huddle_access::normalize_role_matrices(Some(&spec.default));
        assert_eq!(matrices, default_role_matrices());
    }
}
