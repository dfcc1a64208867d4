//! Clone-on-handoff inheritance
//!
//! Every value handed to a scope is an owned copy: previous scope first, global
//! template second. Nothing returned here aliases its source.

use crate::entity::{ScopedEntity, TemplateField};
use crate::templates::GlobalTemplates;

fn inherited(field: TemplateField, previous: Option<&ScopedEntity>, global: &GlobalTemplates) -> serde_json::Value {
    previous
        .and_then(|p| p.field(field))
        .cloned()
        .unwrap_or_else(|| global.snapshot(field))
}

/// Create a new scope carrying forward every template field
#[must_use]
pub fn instantiate(
    scope_id: impl Into<String>,
    previous: Option<&ScopedEntity>,
    global: &GlobalTemplates,
) -> ScopedEntity {
    let mut entity = ScopedEntity::new(scope_id);
    for field in TemplateField::ALL {
        *entity.field_mut(field) = Some(inherited(field, previous, global));
    }
    tracing::debug!(
        scope = %entity.id,
        from = previous.map_or("global", |p| p.id.as_str()),
        "instantiated scope"
    );
    entity
}

/// Fill template fields missing from older scopes
///
/// Scopes are visited in order, so a scope inherits from its predecessor even
/// when that predecessor was itself just back-filled. Existing values are never
/// replaced. Returns the number of fields filled.
pub fn backfill(entities: &mut [ScopedEntity], global: &GlobalTemplates) -> usize {
    let mut filled = 0;
    for index in 0..entities.len() {
        let (before, rest) = entities.split_at_mut(index);
        let previous = before.last();
        let Some(current) = rest.first_mut() else {
            break;
        };
        for field in TemplateField::ALL {
            if current.has(field) {
                continue;
            }
            *current.field_mut(field) = Some(inherited(field, previous, global));
            filled += 1;
        }
    }
    if filled > 0 {
        tracing::debug!(filled, "back-filled scoped template fields");
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn global() -> GlobalTemplates {
        GlobalTemplates::new()
            .with_depth_chart(json!({"QB": ["1"]}))
            .with_zone_philosophies(json!({"cover3": "deep thirds"}))
    }

    #[test]
    fn first_scope_copies_global() {
        let week = instantiate("w1", None, &global());
        assert_eq!(week.depth_chart, Some(json!({"QB": ["1"]})));
        assert_eq!(week.wristbands, Some(json!({"cards": []})));
    }

    #[test]
    fn later_scope_carries_previous_forward() {
        let mut w1 = instantiate("w1", None, &global());
        w1.depth_chart = Some(json!({"QB": ["12"]}));
        let w2 = instantiate("w2", Some(&w1), &global());
        assert_eq!(w2.depth_chart, Some(json!({"QB": ["12"]})));
    }

    #[test]
    fn previous_without_field_falls_back_to_global() {
        let w1 = ScopedEntity::new("w1");
        let w2 = instantiate("w2", Some(&w1), &global());
        assert_eq!(w2.zone_philosophies, Some(json!({"cover3": "deep thirds"})));
    }

    #[test]
    fn backfill_cascades_and_keeps_existing() {
        let mut w1 = ScopedEntity::new("w1");
        w1.depth_chart = Some(json!({"QB": ["9"]}));
        let mut w3 = ScopedEntity::new("w3");
        w3.depth_chart = Some(json!({"QB": ["3"]}));
        let mut weeks = vec![w1, ScopedEntity::new("w2"), w3];

        let filled = backfill(&mut weeks, &global());

        // w1: wristbands + zones, w2: all three, w3: wristbands + zones
        assert_eq!(filled, 7);
        assert_eq!(weeks[0].depth_chart, Some(json!({"QB": ["9"]})));
        assert_eq!(weeks[1].depth_chart, Some(json!({"QB": ["9"]})));
        assert_eq!(weeks[2].depth_chart, Some(json!({"QB": ["3"]})));
        assert_eq!(backfill(&mut weeks, &global()), 0);
    }
}
