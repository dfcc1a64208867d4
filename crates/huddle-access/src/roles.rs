//! Built-in roles and their compiled-in matrices

use crate::matrix::{Capability, PermissionMatrix, RoleMatrices};
use huddle_migrate::merge_defaults;
use serde_json::Value;

pub const HEAD_COACH: &str = "Head Coach";
pub const COORDINATOR: &str = "Coordinator";
pub const POSITION_COACH: &str = "Position Coach";
pub const ASSISTANT: &str = "Assistant";

/// Built-in roles, highest privilege first
pub const ROLE_NAMES: [&str; 4] = [HEAD_COACH, COORDINATOR, POSITION_COACH, ASSISTANT];

/// Role whose matrix is returned without merging
pub const HIGHEST_ROLE: &str = HEAD_COACH;

/// Role every effective matrix starts from
pub const LOWEST_ROLE: &str = ASSISTANT;

/// Every guarded feature
pub const FEATURES: &[&str] = &[
    "dashboard",
    "roster",
    "depthChart",
    "playbook",
    "wristbands",
    "schedule",
    "practice",
    "gameday",
    "opponents",
    "budget",
    "staff",
    "permissions",
    "settings",
];

fn matrix_from(view: &[&str], edit: &[&str]) -> PermissionMatrix {
    let mut matrix = PermissionMatrix::new();
    for feature in FEATURES {
        matrix.set(
            *feature,
            Capability {
                view: view.contains(feature),
                edit: edit.contains(feature),
            },
        );
    }
    matrix
}

/// Matrix granting every feature
#[must_use]
pub fn full_access() -> PermissionMatrix {
    matrix_from(FEATURES, FEATURES)
}

/// Compiled-in matrix for a built-in role name
#[must_use]
pub fn default_matrix_for(role: &str) -> Option<PermissionMatrix> {
    let on_field = [
        "dashboard",
        "roster",
        "depthChart",
        "playbook",
        "wristbands",
        "schedule",
        "practice",
        "gameday",
        "opponents",
    ];
    match role {
        HEAD_COACH => Some(full_access()),
        COORDINATOR => {
            let view: Vec<&str> = FEATURES.iter().copied().filter(|f| *f != "permissions").collect();
            Some(matrix_from(&view, &on_field))
        }
        POSITION_COACH => Some(matrix_from(&on_field, &["depthChart", "practice"])),
        ASSISTANT => Some(matrix_from(&["dashboard", "roster", "schedule", "practice"], &[])),
        _ => None,
    }
}

/// Compiled-in matrices for every built-in role
#[must_use]
pub fn default_role_matrices() -> RoleMatrices {
    ROLE_NAMES
        .iter()
        .filter_map(|role| default_matrix_for(role).map(|m| ((*role).to_string(), m)))
        .collect()
}

/// Complete a persisted role-matrix table against the defaults
///
/// Features introduced after the table was saved appear with their default
/// capability; every persisted customization, and every custom role, is kept.
#[must_use]
pub fn normalize_role_matrices(persisted: Option<&Value>) -> RoleMatrices {
    let defaults = match serde_json::to_value(default_role_matrices()) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "could not encode default role matrices");
            return default_role_matrices();
        }
    };
    let merged = merge_defaults(&defaults, persisted);
    match serde_json::from_value::<RoleMatrices>(merged) {
        Ok(matrices) => matrices,
        Err(e) => {
            tracing::warn!(error = %e, "role matrices have unexpected shape, using defaults");
            default_role_matrices()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Action;
    use serde_json::json;

    #[test]
    fn assistant_can_view_but_not_edit_dashboard() {
        let assistant = default_matrix_for(ASSISTANT).unwrap();
        assert!(assistant.can("dashboard", Action::View));
        assert!(!assistant.can("dashboard", Action::Edit));
    }

    #[test]
    fn head_coach_covers_every_role() {
        let head = default_matrix_for(HEAD_COACH).unwrap();
        for role in ROLE_NAMES {
            assert!(head.covers(&default_matrix_for(role).unwrap()), "{role}");
        }
    }

    #[test]
    fn unknown_role_has_no_default() {
        assert!(default_matrix_for("Team Mom").is_none());
    }

    #[test]
    fn normalize_keeps_customization_and_adds_new_features() {
        let persisted = json!({
            "Assistant": {"dashboard": {"view": false, "edit": false}},
            "Trainer": {"roster": {"view": true, "edit": true}}
        });
        let matrices = normalize_role_matrices(Some(&persisted));

        let assistant = &matrices[ASSISTANT];
        assert!(!assistant.can("dashboard", Action::View));
        assert!(assistant.can("schedule", Action::View));
        assert!(matrices["Trainer"].can("roster", Action::Edit));
        assert_eq!(matrices[HEAD_COACH], full_access());
    }

    #[test]
    fn normalize_tolerates_garbage() {
        let matrices = normalize_role_matrices(Some(&json!("not a table")));
        assert_eq!(matrices, default_role_matrices());
    }
}
