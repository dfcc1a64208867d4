//! Effective matrix resolution

use crate::matrix::{PermissionMatrix, RoleMatrices};
use crate::roles::{default_matrix_for, HIGHEST_ROLE, LOWEST_ROLE};

fn matrix_for(role: &str, matrices: &RoleMatrices) -> Option<PermissionMatrix> {
    matrices.get(role).cloned().or_else(|| default_matrix_for(role))
}

/// Compute the effective matrix for a set of held roles
///
/// Deterministic and side-effect free; callers recompute whenever the active
/// user or the role-matrix table changes. Roles with neither a table entry nor
/// a compiled-in default are skipped.
#[must_use]
pub fn resolve<I, S>(user_roles: I, matrices: &RoleMatrices, is_super_admin: bool) -> PermissionMatrix
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let roles: Vec<S> = user_roles.into_iter().collect();

    if is_super_admin || roles.iter().any(|r| r.as_ref() == HIGHEST_ROLE) {
        return matrix_for(HIGHEST_ROLE, matrices).unwrap_or_default();
    }

    let mut effective = matrix_for(LOWEST_ROLE, matrices).unwrap_or_default();
    for role in &roles {
        match matrix_for(role.as_ref(), matrices) {
            Some(matrix) => effective.absorb(&matrix),
            None => tracing::debug!(role = role.as_ref(), "no matrix for role, skipping"),
        }
    }
    effective
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{Action, Capability};
    use crate::roles::{default_role_matrices, full_access, ASSISTANT, COORDINATOR, POSITION_COACH};

    #[test]
    fn no_roles_yields_lowest_matrix() {
        let matrices = default_role_matrices();
        let effective = resolve(Vec::<String>::new(), &matrices, false);
        assert_eq!(effective, matrices[ASSISTANT]);
    }

    #[test]
    fn super_admin_short_circuits() {
        let matrices = default_role_matrices();
        assert_eq!(resolve([ASSISTANT], &matrices, true), full_access());
    }

    #[test]
    fn highest_role_is_returned_unmerged() {
        let mut matrices = default_role_matrices();
        let custom = PermissionMatrix::new().with("dashboard", Capability::VIEW);
        matrices.insert(HIGHEST_ROLE.to_string(), custom.clone());

        assert_eq!(resolve([POSITION_COACH, HIGHEST_ROLE], &matrices, false), custom);
    }

    #[test]
    fn position_coach_cannot_edit_dashboard() {
        let effective = resolve([POSITION_COACH], &default_role_matrices(), false);
        assert!(effective.can("dashboard", Action::View));
        assert!(effective.require("dashboard", Action::Edit).is_err());
        assert!(effective.can("depthChart", Action::Edit));
    }

    #[test]
    fn roles_are_or_merged() {
        let effective = resolve([POSITION_COACH, COORDINATOR], &default_role_matrices(), false);
        assert!(effective.can("playbook", Action::Edit));
        assert!(effective.can("budget", Action::View));
        assert!(!effective.can("budget", Action::Edit));
    }

    #[test]
    fn missing_table_entry_falls_back_to_compiled_default() {
        let effective = resolve([COORDINATOR], &RoleMatrices::new(), false);
        assert!(effective.can("playbook", Action::Edit));
    }

    #[test]
    fn unknown_role_is_skipped() {
        let matrices = default_role_matrices();
        assert_eq!(resolve(["Team Mom"], &matrices, false), matrices[ASSISTANT]);
    }

    #[test]
    fn custom_role_from_table_is_merged() {
        let mut matrices = default_role_matrices();
        matrices.insert(
            "Trainer".to_string(),
            PermissionMatrix::new().with("roster", Capability::FULL),
        );
        let effective = resolve(["Trainer"], &matrices, false);
        assert!(effective.can("roster", Action::Edit));
        assert!(effective.can("dashboard", Action::View));
    }
}
