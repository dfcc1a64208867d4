//! Cold-start loading from the local cache
//!
//! For each catalogued slice:
//! 1. read and parse the cached text; unparseable text counts as absent
//! 2. absorb legacy flat keys and legacy source keys
//! 3. run migration steps and the default merge
//!
//! Slices that absorbed legacy keys are written back in their current shape
//! and the legacy keys are removed.

use crate::catalog::SliceCatalog;
use huddle_migrate::absorb_flat_keys;
use huddle_store::{read_json, write_json, LocalCache, SliceKey};
use serde_json::Value;
use std::collections::BTreeMap;

/// Result of a cold-start load
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Complete value for every catalogued slice
    pub values: BTreeMap<SliceKey, Value>,
    /// Slices whose cached text was corrupt and replaced by the default
    pub recovered: Vec<SliceKey>,
    /// Slices rewritten after absorbing legacy keys
    pub upgraded: Vec<SliceKey>,
    /// Number of legacy fields absorbed
    pub absorbed: usize,
}

/// Parse a legacy cache entry, accepting bare strings that are not JSON
fn read_legacy(cache: &dyn LocalCache, key: &str) -> Option<Value> {
    let text = cache.get(key)?;
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// Load every slice from the cache
#[must_use]
pub fn load_slices(cache: &dyn LocalCache, catalog: &SliceCatalog) -> LoadReport {
    let mut report = LoadReport::default();
    for spec in catalog.iter() {
        let persisted = match read_json(cache, &spec.key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key = %spec.key, error = %err, "cached slice unreadable, using default");
                report.recovered.push(spec.key.clone());
                None
            }
        };

        let flat: Vec<_> = spec
            .flat_keys
            .iter()
            .filter_map(|fk| read_legacy(cache, &fk.cache_key).map(|v| (fk.clone(), v)))
            .collect();
        let (persisted, absorbed) = absorb_flat_keys(persisted, &flat);

        let legacy: Vec<_> = spec
            .legacy_keys
            .iter()
            .filter_map(|lk| read_legacy(cache, &lk.cache_key).map(|v| lk.source(v)))
            .collect();

        let value = spec.normalize(persisted, &legacy);

        if !flat.is_empty() || !legacy.is_empty() {
            match write_json(cache, &spec.key, &value) {
                Ok(()) => {
                    for (fk, _) in &flat {
                        cache.remove(&fk.cache_key);
                    }
                    for source in &legacy {
                        cache.remove(&source.name);
                    }
                    report.upgraded.push(spec.key.clone());
                    tracing::info!(key = %spec.key, absorbed, "absorbed legacy cache keys");
                }
                // legacy keys stay so the next start can retry
                Err(err) => tracing::warn!(key = %spec.key, error = %err, "failed to persist upgraded slice"),
            }
        }
        report.absorbed += absorbed;
        report.values.insert(spec.key.clone(), value);
    }
    report
}
