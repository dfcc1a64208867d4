//! Local cache adapter
//!
//! The local cache is a single shared namespace of text values keyed by
//! domain name. Reads and writes are synchronous and atomic from the caller's
//! point of view.

use crate::error::StoreError;
use crate::types::SliceKey;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

/// Synchronous key → serialized value store
pub trait LocalCache: Send + Sync + std::fmt::Debug {
    /// Get raw text for key
    fn get(&self, key: &str) -> Option<String>;

    /// Store raw text under key
    fn set(&self, key: &str, value: String);

    /// Remove key (no-op when absent)
    fn remove(&self, key: &str);

    /// All keys currently stored
    fn keys(&self) -> Vec<String>;
}

/// Read and decode a JSON value
///
/// # Errors
/// `StoreError::Corrupt` when the stored text is not valid JSON
pub fn read_json(cache: &dyn LocalCache, key: &SliceKey) -> Result<Option<Value>, StoreError> {
    match cache.get(key.as_str()) {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::corrupt(key, e.to_string())),
    }
}

/// Encode and store a JSON value
///
/// # Errors
/// `StoreError::Serialization` if the value cannot be encoded
pub fn write_json(cache: &dyn LocalCache, key: &SliceKey, value: &Value) -> Result<(), StoreError> {
    let text = serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    cache.set(key.as_str(), text);
    Ok(())
}

/// In-process local cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryCache {
    /// Create empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create cache pre-seeded with raw entries
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(map),
        }
    }

    /// Number of stored entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if cache is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_cache_set_get_remove() {
        let cache = MemoryCache::new();
        assert!(cache.get("roster").is_none());

        cache.set("roster", "[]".to_string());
        assert_eq!(cache.get("roster").as_deref(), Some("[]"));

        cache.remove("roster");
        assert!(cache.is_empty());
    }

    #[test]
    fn json_round_trip_through_cache() {
        let cache = MemoryCache::new();
        let key = SliceKey::new("budget");
        write_json(&cache, &key, &json!({"total": 1200})).unwrap();

        let value = read_json(&cache, &key).unwrap();
        assert_eq!(value, Some(json!({"total": 1200})));
    }

    #[test]
    fn corrupt_text_is_reported() {
        let cache = MemoryCache::with_entries([("schedule", "{not json")]);
        let err = read_json(&cache, &SliceKey::new("schedule")).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn absent_key_reads_as_none() {
        let cache = MemoryCache::new();
        assert_eq!(read_json(&cache, &SliceKey::new("missing")).unwrap(), None);
    }
}
