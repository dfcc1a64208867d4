//! Default merge
//!
//! Overlays a persisted value on the current default shape. Objects merge
//! key by key; arrays and scalars are replaced wholesale by the persisted
//! value. A persisted node whose JSON type disagrees with the default is a
//! shape mismatch: it is dropped in favour of the default and reported.
//! `null` reads as "absent".

use crate::pointer::{has_value, set_pointer};
use serde_json::Value;
use std::fmt;

/// Copy rule from a legacy location to its current equivalent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// JSON pointer into the legacy source
    pub from: String,
    /// JSON pointer into the merged value
    pub to: String,
}

impl FieldMapping {
    /// Create mapping
    #[inline]
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// An older, differently-shaped persisted value
///
/// Values are copied only through the explicit mapping table, and only where
/// the current persisted value has nothing of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacySource {
    /// Name used in diagnostics
    pub name: String,
    /// Legacy persisted value
    pub value: Value,
    /// Field-by-field mapping table
    pub mappings: Vec<FieldMapping>,
}

impl LegacySource {
    /// Create legacy source with no mappings
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            mappings: Vec::new(),
        }
    }

    /// Add a mapping
    #[must_use]
    pub fn map(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.mappings.push(FieldMapping::new(from, to));
        self
    }
}

/// Persisted node discarded because its type disagreed with the default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    /// JSON pointer of the node
    pub path: String,
    /// Type found in the defaults
    pub expected: &'static str,
    /// Type found in the persisted value
    pub found: &'static str,
}

impl fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{path}: expected {}, found {}", self.expected, self.found)
    }
}

/// Merge result with diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    /// Complete merged value
    pub value: Value,
    /// Discarded persisted nodes
    pub mismatches: Vec<ShapeMismatch>,
    /// Number of legacy fields copied in
    pub legacy_fields_applied: usize,
}

/// Overlay `persisted` on `defaults`
///
/// `merge_defaults(d, None)` and `merge_defaults(d, Some(&json!({})))` both
/// return a value equal to `d`.
#[must_use]
pub fn merge_defaults(defaults: &Value, persisted: Option<&Value>) -> Value {
    merge(defaults, persisted, &[])
}

/// Overlay `persisted` on `defaults`, then apply legacy sources
///
/// Mismatches are logged as warnings.
#[must_use]
pub fn merge(defaults: &Value, persisted: Option<&Value>, legacy: &[LegacySource]) -> Value {
    let report = merge_report(defaults, persisted, legacy);
    for mismatch in &report.mismatches {
        tracing::warn!(%mismatch, "persisted value has unexpected shape, using default");
    }
    report.value
}

/// Same as [`merge`] but returns diagnostics instead of logging
#[must_use]
pub fn merge_report(defaults: &Value, persisted: Option<&Value>, legacy: &[LegacySource]) -> MergeReport {
    let mut mismatches = Vec::new();
    let mut value = match persisted {
        Some(p) => overlay(defaults, p, "", &mut mismatches),
        None => defaults.clone(),
    };

    let own = persisted.cloned().unwrap_or(Value::Null);
    let mut legacy_fields_applied = 0;
    for source in legacy {
        for mapping in &source.mappings {
            if has_value(&own, &mapping.to) {
                continue;
            }
            let Some(old) = source.value.pointer(&mapping.from).filter(|v| !v.is_null()) else {
                continue;
            };
            let replacement = match value.pointer(&mapping.to) {
                Some(current) => overlay(current, old, &mapping.to, &mut mismatches),
                None => old.clone(),
            };
            if set_pointer(&mut value, &mapping.to, replacement) {
                legacy_fields_applied += 1;
                tracing::debug!(source = %source.name, from = %mapping.from, to = %mapping.to, "legacy field absorbed");
            }
        }
    }

    MergeReport {
        value,
        mismatches,
        legacy_fields_applied,
    }
}

fn overlay(default: &Value, persisted: &Value, path: &str, mismatches: &mut Vec<ShapeMismatch>) -> Value {
    match (default, persisted) {
        (_, Value::Null) => default.clone(),
        (Value::Null, p) => p.clone(),
        (Value::Object(d_map), Value::Object(p_map)) => {
            let mut result = d_map.clone();
            for (key, p_val) in p_map {
                let merged = match d_map.get(key) {
                    Some(d_val) => {
                        let child = format!("{path}/{}", key.replace('~', "~0").replace('/', "~1"));
                        overlay(d_val, p_val, &child, mismatches)
                    }
                    // Keys unknown to the defaults are user data; keep them.
                    None => p_val.clone(),
                };
                result.insert(key.clone(), merged);
            }
            Value::Object(result)
        }
        (d, p) if type_name(d) == type_name(p) => p.clone(),
        (d, p) => {
            mismatches.push(ShapeMismatch {
                path: path.to_string(),
                expected: type_name(d),
                found: type_name(p),
            });
            d.clone()
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
