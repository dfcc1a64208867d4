//! Built-in legacy migrations
//!
//! - staff members stored a single `role` string before multi-role support
//! - feature visibility was once a flat `{category: bool}` object
//! - the `scouting` visibility category was folded into `opponents`
//! - a few settings lived under their own top-level cache keys

use crate::pointer::{has_value, set_pointer};
use crate::steps::{MigrationPlan, MigrationStep};
use serde_json::{Map, Value};

/// Current name for a role string written by older versions
#[must_use]
pub fn map_legacy_role(name: &str) -> &str {
    match name {
        "Assistant Coach" | "Asst. Coach" | "Coach" => "Position Coach",
        "Admin" | "Administrator" => "Head Coach",
        "Volunteer" | "Helper" => "Assistant",
        other => other,
    }
}

fn members(value: &Value) -> Vec<&Map<String, Value>> {
    match value {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    }
}

fn for_each_member(value: &mut Value, mut f: impl FnMut(&mut Map<String, Value>)) {
    match value {
        Value::Array(items) => items.iter_mut().filter_map(Value::as_object_mut).for_each(&mut f),
        Value::Object(map) => f(map),
        _ => {}
    }
}

fn has_single_role(value: &Value) -> bool {
    members(value).iter().any(|m| m.contains_key("role"))
}

fn lift_single_role(mut value: Value) -> Value {
    for_each_member(&mut value, |member| {
        let Some(role) = member.remove("role") else {
            return;
        };
        let roles = member
            .entry("roles")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !roles.is_array() {
            *roles = Value::Array(Vec::new());
        }
        let name = role.as_str().map(str::trim).filter(|s| !s.is_empty());
        if let (Some(name), Some(list)) = (name, roles.as_array_mut()) {
            let mapped = map_legacy_role(name);
            if !list.iter().any(|r| r.as_str() == Some(mapped)) {
                list.push(Value::String(mapped.to_string()));
            }
        }
    });
    value
}

fn has_legacy_role_names(value: &Value) -> bool {
    members(value).iter().any(|m| {
        m.get("roles")
            .and_then(Value::as_array)
            .is_some_and(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|r| map_legacy_role(r) != r)
            })
    })
}

fn rename_legacy_roles(mut value: Value) -> Value {
    for_each_member(&mut value, |member| {
        let Some(roles) = member.get_mut("roles").and_then(Value::as_array_mut) else {
            return;
        };
        let mut renamed: Vec<Value> = Vec::with_capacity(roles.len());
        for role in roles.drain(..) {
            let role = match role.as_str() {
                Some(name) => Value::String(map_legacy_role(name).to_string()),
                None => role,
            };
            if !renamed.contains(&role) {
                renamed.push(role);
            }
        }
        *roles = renamed;
    });
    value
}

/// Migration plan for the `staff` slice
#[must_use]
pub fn staff_plan() -> MigrationPlan {
    MigrationPlan::new()
        .with_step(MigrationStep::new(1, "staff-single-role", has_single_role, lift_single_role))
        .with_step(MigrationStep::new(
            2,
            "staff-legacy-role-names",
            has_legacy_role_names,
            rename_legacy_roles,
        ))
}

fn is_flat_visibility(value: &Value) -> bool {
    value.as_object().is_some_and(|map| {
        !map.contains_key("categories") && map.values().any(Value::is_boolean)
    })
}

fn nest_flat_visibility(value: Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };
    let mut categories = Map::new();
    let mut rest = Map::new();
    for (key, val) in map {
        match val {
            Value::Bool(enabled) => {
                let mut category = Map::new();
                category.insert("enabled".to_string(), Value::Bool(enabled));
                categories.insert(key, Value::Object(category));
            }
            other => {
                rest.insert(key, other);
            }
        }
    }
    rest.insert("categories".to_string(), Value::Object(categories));
    Value::Object(rest)
}

/// `scouting` → `opponents` field table
const SCOUTING_TO_OPPONENTS: &[(&str, &str)] = &[
    ("/enabled", "/enabled"),
    ("/items/filmRoom", "/items/film"),
    ("/items/tendencyReports", "/items/tendencies"),
    ("/items/scoutingReports", "/items/reports"),
];

fn has_scouting_category(value: &Value) -> bool {
    value.pointer("/categories/scouting").is_some()
}

fn fold_scouting_category(mut value: Value) -> Value {
    let Some(categories) = value.get_mut("categories").and_then(Value::as_object_mut) else {
        return value;
    };
    let Some(scouting) = categories.remove("scouting") else {
        return value;
    };
    let opponents = categories
        .entry("opponents")
        .or_insert_with(|| Value::Object(Map::new()));
    for (from, to) in SCOUTING_TO_OPPONENTS {
        if has_value(opponents, to) {
            continue;
        }
        if let Some(old) = scouting.pointer(from).filter(|v| !v.is_null()) {
            set_pointer(opponents, to, old.clone());
        }
    }
    value
}

/// Migration plan for the `featureVisibility` slice
#[must_use]
pub fn visibility_plan() -> MigrationPlan {
    MigrationPlan::new()
        .with_step(MigrationStep::new(
            1,
            "visibility-flat-categories",
            is_flat_visibility,
            nest_flat_visibility,
        ))
        .with_step(MigrationStep::new(
            2,
            "visibility-scouting-to-opponents",
            has_scouting_category,
            fold_scouting_category,
        ))
}

/// Top-level cache key whose value now lives inside a slice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatKey {
    /// Old top-level cache key
    pub cache_key: String,
    /// JSON pointer inside the slice
    pub pointer: String,
}

impl FlatKey {
    /// Create flat key mapping
    #[must_use]
    pub fn new(cache_key: impl Into<String>, pointer: impl Into<String>) -> Self {
        Self {
            cache_key: cache_key.into(),
            pointer: pointer.into(),
        }
    }
}

/// Fold flat-key values into an object slice
///
/// A value is absorbed only where the slice has none of its own. Returns the
/// updated value and the number of fields absorbed. A non-object slice is
/// replaced by an object holding just the absorbed fields; the default merge
/// that follows fills in the rest.
#[must_use]
pub fn absorb_flat_keys(value: Option<Value>, absorbed: &[(FlatKey, Value)]) -> (Option<Value>, usize) {
    if absorbed.is_empty() {
        return (value, 0);
    }
    let mut target = match value {
        Some(v @ Value::Object(_)) => v,
        _ => Value::Object(Map::new()),
    };
    let mut count = 0;
    for (flat, old) in absorbed {
        if old.is_null() || has_value(&target, &flat.pointer) {
            continue;
        }
        if set_pointer(&mut target, &flat.pointer, old.clone()) {
            count += 1;
        }
    }
    (Some(target), count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn single_role_becomes_roles_list() {
        let report = staff_plan().run(json!({"role": "Assistant Coach"}));
        assert_eq!(report.value, json!({"roles": ["Position Coach"]}));
        assert!(report.value.get("role").is_none());
    }

    #[test]
    fn staff_list_migrates_every_member() {
        let staff = json!([
            {"name": "Dana", "role": "Admin"},
            {"name": "Lee", "roles": ["Coordinator"]},
            {"name": "Sam", "role": "Coordinator", "roles": ["Coach"]}
        ]);
        let report = staff_plan().run(staff);
        assert_eq!(
            report.value,
            json!([
                {"name": "Dana", "roles": ["Head Coach"]},
                {"name": "Lee", "roles": ["Coordinator"]},
                {"name": "Sam", "roles": ["Position Coach", "Coordinator"]}
            ])
        );
        assert_eq!(report.applied, vec!["staff-single-role", "staff-legacy-role-names"]);
    }

    #[test]
    fn empty_role_string_yields_empty_roles() {
        let report = staff_plan().run(json!({"role": "  "}));
        assert_eq!(report.value, json!({"roles": []}));
    }

    #[test]
    fn current_staff_shape_is_untouched() {
        let staff = json!([{"name": "Lee", "roles": ["Head Coach"]}]);
        let report = staff_plan().run(staff.clone());
        assert!(!report.migrated());
        assert_eq!(report.value, staff);
    }

    #[test]
    fn flat_visibility_is_nested() {
        let report = visibility_plan().run(json!({"roster": true, "budget": false}));
        assert_eq!(
            report.value,
            json!({"categories": {"roster": {"enabled": true}, "budget": {"enabled": false}}})
        );
    }

    #[test]
    fn scouting_folds_into_opponents_without_overwriting() {
        let persisted = json!({
            "categories": {
                "scouting": {"enabled": false, "items": {"filmRoom": false, "tendencyReports": true, "legacyOnly": true}},
                "opponents": {"items": {"tendencies": false}}
            }
        });
        let report = visibility_plan().run(persisted);
        assert_eq!(
            report.value,
            json!({
                "categories": {
                    "opponents": {"enabled": false, "items": {"tendencies": false, "film": false}}
                }
            })
        );
    }

    #[test]
    fn flat_scouting_flag_reaches_opponents() {
        let report = visibility_plan().run(json!({"scouting": false}));
        assert_eq!(report.value, json!({"categories": {"opponents": {"enabled": false}}}));
        assert_eq!(
            report.applied,
            vec!["visibility-flat-categories", "visibility-scouting-to-opponents"]
        );
    }

    #[test]
    fn flat_keys_absorbed_only_when_missing() {
        let absorbed = vec![
            (FlatKey::new("teamName", "/teamName"), json!("Eagles")),
            (FlatKey::new("primaryColor", "/colors/primary"), json!("#002244")),
        ];
        let (value, count) = absorb_flat_keys(Some(json!({"teamName": "Hawks"})), &absorbed);
        assert_eq!(count, 1);
        assert_eq!(value, Some(json!({"teamName": "Hawks", "colors": {"primary": "#002244"}})));
    }

    #[test]
    fn flat_keys_create_missing_slice() {
        let absorbed = vec![(FlatKey::new("seasonYear", "/seasonYear"), json!(2024))];
        let (value, count) = absorb_flat_keys(None, &absorbed);
        assert_eq!(count, 1);
        assert_eq!(value, Some(json!({"seasonYear": 2024})));
    }
}
