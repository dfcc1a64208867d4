//! Feature-visibility tree
//!
//! Shape: `{"categories": {<name>: {"enabled": bool, "items": {<item>: bool}}}}`.
//! New categories and items appear with their default state; anything the
//! user configured, including a deliberately disabled category, is kept.

use crate::legacy::visibility_plan;
use crate::merge::{merge, LegacySource};
use serde_json::{json, Value};

/// Current default visibility tree
#[must_use]
pub fn default_feature_visibility() -> Value {
    json!({
        "categories": {
            "dashboard": {"enabled": true, "items": {"announcements": true, "calendar": true}},
            "roster": {"enabled": true, "items": {"depthChart": true, "attendance": true, "injuries": true}},
            "playbook": {"enabled": true, "items": {"plays": true, "formations": true, "wristbands": true}},
            "practice": {"enabled": true, "items": {"plans": true, "drills": true}},
            "gameday": {"enabled": true, "items": {"callSheet": true, "scoreboard": true}},
            "opponents": {"enabled": true, "items": {"film": true, "tendencies": true, "reports": true}},
            "budget": {"enabled": true, "items": {"ledger": true, "reports": true}},
            "analytics": {"enabled": false, "items": {"trends": true}}
        }
    })
}

/// Migrate and complete a persisted visibility tree
#[must_use]
pub fn merge_feature_visibility(persisted: Option<&Value>, legacy: &[LegacySource]) -> Value {
    let migrated = persisted.map(|p| visibility_plan().run(p.clone()).value);
    merge(&default_feature_visibility(), migrated.as_ref(), legacy)
}

/// Whether an item is visible
///
/// A disabled category hides every item. An item missing from an enabled
/// category is visible.
#[must_use]
pub fn is_feature_visible(tree: &Value, category: &str, item: Option<&str>) -> bool {
    let Some(cat) = tree.get("categories").and_then(|c| c.get(category)) else {
        return false;
    };
    if !cat.get("enabled").and_then(Value::as_bool).unwrap_or(false) {
        return false;
    }
    match item {
        None => true,
        Some(item) => cat
            .get("items")
            .and_then(|items| items.get(item))
            .and_then(Value::as_bool)
            .unwrap_or(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_persisted_tree_yields_defaults() {
        assert_eq!(merge_feature_visibility(None, &[]), default_feature_visibility());
    }

    #[test]
    fn legacy_flat_tree_is_upgraded_and_completed() {
        let merged = merge_feature_visibility(Some(&json!({"budget": false, "scouting": false})), &[]);
        assert!(!is_feature_visible(&merged, "budget", None));
        assert!(!is_feature_visible(&merged, "opponents", Some("film")));
        assert!(is_feature_visible(&merged, "roster", Some("depthChart")));
        assert!(merged.pointer("/categories/scouting").is_none());
    }

    #[test]
    fn new_category_defaults_apply_when_absent() {
        let merged = merge_feature_visibility(Some(&json!({"categories": {}})), &[]);
        assert!(!is_feature_visible(&merged, "analytics", None));
        assert!(is_feature_visible(&merged, "practice", Some("drills")));
    }

    #[test]
    fn unknown_category_is_hidden() {
        assert!(!is_feature_visible(&default_feature_visibility(), "nope", None));
    }
}
