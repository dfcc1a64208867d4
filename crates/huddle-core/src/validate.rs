//! Cross-slice validation
//!
//! Validators run before a proposed value replaces a slice. They may read any
//! other slice through [`SliceView`] but cannot change one.

use crate::catalog::keys;
use crate::error::ValidationError;
use dashmap::DashMap;
use huddle_scope::{find_conflicts, occupants, ScopedEntity, TemplateField, WristbandSettings};
use huddle_store::SliceKey;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Read-only access to the session's slices
pub struct SliceView<'a> {
    slices: &'a DashMap<SliceKey, Value>,
}

impl<'a> SliceView<'a> {
    pub(crate) fn new(slices: &'a DashMap<SliceKey, Value>) -> Self {
        Self { slices }
    }

    /// Owned copy of a slice value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.slices.get(&SliceKey::new(key)).map(|v| v.value().clone())
    }
}

/// Pre-mutation check for one or more slices
pub trait SliceValidator: Send + Sync + fmt::Debug {
    /// Check a proposed value
    ///
    /// # Errors
    /// The rejection to hand back to the caller
    fn validate(&self, key: &SliceKey, proposed: &Value, view: &SliceView<'_>) -> Result<(), ValidationError>;
}

fn parse_layout(key: &SliceKey, value: &Value, scope: &str) -> Result<WristbandSettings, ValidationError> {
    WristbandSettings::from_value(value).map_err(|error| {
        tracing::warn!(%key, scope, %error, "unreadable wristband layout rejected");
        ValidationError::rejected(key, format!("unreadable wristband layout in {scope}: {error}"))
    })
}

/// Every wristband layout carried by a proposed value
///
/// A layout that cannot be read is rejected rather than skipped, so a
/// conflicting slot can never slip past the check.
fn wristband_sets(key: &SliceKey, proposed: &Value) -> Result<Vec<WristbandSettings>, ValidationError> {
    match key.as_str() {
        keys::WRISTBAND_SETTINGS => Ok(vec![parse_layout(key, proposed, "settings")?]),
        keys::WEEKS => {
            let weeks = serde_json::from_value::<Vec<ScopedEntity>>(proposed.clone()).map_err(|error| {
                tracing::warn!(%key, %error, "unreadable weeks rejected");
                ValidationError::rejected(key, format!("unreadable weeks: {error}"))
            })?;
            weeks
                .iter()
                .filter_map(|week| week.field(TemplateField::Wristbands).map(|w| (week, w)))
                .map(|(week, w)| parse_layout(key, w, &format!("week '{}'", week.id)))
                .collect()
        }
        _ => Ok(Vec::new()),
    }
}

/// Rejects wristband layouts where two plays share a slot in one namespace
#[derive(Debug, Clone, Copy, Default)]
pub struct WristbandSlotValidator;

impl SliceValidator for WristbandSlotValidator {
    fn validate(&self, key: &SliceKey, proposed: &Value, _view: &SliceView<'_>) -> Result<(), ValidationError> {
        for settings in wristband_sets(key, proposed)? {
            if let Some(conflict) = find_conflicts(&settings).into_iter().next() {
                return Err(conflict.into());
            }
        }
        Ok(())
    }
}

/// Rejects wristband rows naming plays absent from the playbook
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybookReferenceValidator;

impl SliceValidator for PlaybookReferenceValidator {
    fn validate(&self, key: &SliceKey, proposed: &Value, view: &SliceView<'_>) -> Result<(), ValidationError> {
        let sets = wristband_sets(key, proposed)?;
        if sets.is_empty() {
            return Ok(());
        }
        let playbook = view.get(keys::PLAYBOOK).unwrap_or(Value::Null);
        let known: HashSet<&str> = playbook
            .get("plays")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|play| play.get("id").and_then(Value::as_str))
            .collect();
        for settings in &sets {
            if let Some(unknown) = occupants(settings)
                .into_iter()
                .find(|o| !known.contains(o.play_id.as_str()))
            {
                return Err(ValidationError::rejected(
                    key,
                    format!("play '{}' is not in the playbook", unknown.play_id),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layout(rows: Value) -> Value {
        json!({"cards": [{
            "id": "card1",
            "namespace": "offense",
            "numbering": {"mode": "sequential", "start": 101},
            "rows": rows
        }, {
            "id": "card2",
            "namespace": "offense",
            "numbering": {"mode": "explicit"},
            "rows": [{"playId": "9", "slot": 102}]
        }]})
    }

    #[test]
    fn duplicate_slot_is_rejected() {
        let slices = DashMap::new();
        let proposed = layout(json!([{"header": true}, {"playId": "7"}, {"playId": "42"}]));
        let err = WristbandSlotValidator
            .validate(&SliceKey::new(keys::WRISTBAND_SETTINGS), &proposed, &SliceView::new(&slices))
            .unwrap_err();
        assert!(matches!(err, ValidationError::SlotConflict(c) if c.slot == 102));
    }

    #[test]
    fn week_layouts_are_checked() {
        let slices = DashMap::new();
        let weeks = json!([{"id": "w1", "wristbands": layout(json!([{"playId": "7"}, {"playId": "8"}]))}]);
        let result = WristbandSlotValidator.validate(&SliceKey::new(keys::WEEKS), &weeks, &SliceView::new(&slices));
        assert!(result.is_err());
    }

    #[test]
    fn unreadable_layouts_are_rejected() {
        let slices = DashMap::new();
        let view = SliceView::new(&slices);
        let weeks = SliceKey::new(keys::WEEKS);

        // week w2 carries a duplicate slot behind a malformed card list
        let malformed_week = json!([
            {"id": "w1"},
            {"id": "w2", "wristbands": {"cards": {"card1": layout(json!([{"playId": "7"}, {"playId": "8"}]))}}}
        ]);
        let err = WristbandSlotValidator.validate(&weeks, &malformed_week, &view).unwrap_err();
        assert!(matches!(&err, ValidationError::Rejected { .. }));
        assert!(err.to_string().contains("week 'w2'"));

        let not_weeks = json!({"w1": {"wristbands": layout(json!([]))}});
        assert!(WristbandSlotValidator.validate(&weeks, &not_weeks, &view).is_err());

        let settings = SliceKey::new(keys::WRISTBAND_SETTINGS);
        assert!(WristbandSlotValidator.validate(&settings, &json!({"cards": 3}), &view).is_err());
        assert!(PlaybookReferenceValidator.validate(&settings, &json!("cards"), &view).is_err());
    }

    #[test]
    fn weeks_without_layouts_pass() {
        let slices = DashMap::new();
        let weeks = json!([{"id": "w1", "wristbands": null}, {"id": "w2", "opponent": "Eagles"}]);
        assert!(WristbandSlotValidator
            .validate(&SliceKey::new(keys::WEEKS), &weeks, &SliceView::new(&slices))
            .is_ok());
    }

    #[test]
    fn other_slices_pass() {
        let slices = DashMap::new();
        assert!(WristbandSlotValidator
            .validate(&SliceKey::new(keys::ROSTER), &json!([1, 1]), &SliceView::new(&slices))
            .is_ok());
    }

    #[test]
    fn playbook_reference_reads_other_slice() {
        let slices = DashMap::new();
        slices.insert(SliceKey::new(keys::PLAYBOOK), json!({"plays": [{"id": "7"}, {"id": "9"}]}));
        let view = SliceView::new(&slices);
        let key = SliceKey::new(keys::WRISTBAND_SETTINGS);

        let ok = layout(json!([{"playId": "7"}]));
        assert!(PlaybookReferenceValidator.validate(&key, &ok, &view).is_ok());

        let bad = layout(json!([{"playId": "13"}]));
        let err = PlaybookReferenceValidator.validate(&key, &bad, &view).unwrap_err();
        assert!(err.to_string().contains("'13'"));
    }
}
