use huddle_access::{
    default_role_matrices, full_access, resolve, Action, Capability, PermissionMatrix,
    RoleMatrices, ASSISTANT, COORDINATOR, FEATURES, HEAD_COACH, POSITION_COACH,
};
use proptest::prelude::*;

const NON_HIGHEST: [&str; 4] = [COORDINATOR, POSITION_COACH, ASSISTANT, "Trainer"];

fn capability() -> impl Strategy<Value = Capability> {
    (any::<bool>(), any::<bool>()).prop_map(|(view, edit)| Capability { view, edit })
}

fn matrix() -> impl Strategy<Value = PermissionMatrix> {
    prop::collection::vec(capability(), FEATURES.len()).prop_map(|caps| {
        FEATURES
            .iter()
            .zip(caps)
            .fold(PermissionMatrix::new(), |m, (feature, cap)| m.with(*feature, cap))
    })
}

fn role_table() -> impl Strategy<Value = RoleMatrices> {
    prop::collection::vec(matrix(), NON_HIGHEST.len()).prop_map(|matrices| {
        let mut table = default_role_matrices();
        for (role, matrix) in NON_HIGHEST.iter().zip(matrices) {
            table.insert((*role).to_string(), matrix);
        }
        table
    })
}

fn role_subset() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(NON_HIGHEST.to_vec(), 0..=NON_HIGHEST.len())
}

proptest! {
    #[test]
    fn prop_adding_a_role_never_removes_capability(
        table in role_table(),
        roles in role_subset(),
        extra in prop::sample::select(NON_HIGHEST.to_vec()),
    ) {
        let before = resolve(roles.iter().copied(), &table, false);
        let mut more = roles.clone();
        more.push(extra);
        let after = resolve(more, &table, false);
        prop_assert!(after.covers(&before));
    }

    #[test]
    fn prop_super_admin_equals_highest_role(table in role_table(), roles in role_subset()) {
        let admin = resolve(roles, &table, true);
        prop_assert_eq!(admin, table[HEAD_COACH].clone());
    }

    #[test]
    fn prop_lowest_role_is_floor(table in role_table(), roles in role_subset()) {
        let effective = resolve(roles, &table, false);
        prop_assert!(effective.covers(&table[ASSISTANT]));
    }
}

#[test]
fn position_coach_edit_dashboard_is_denied() {
    let effective = resolve([POSITION_COACH], &default_role_matrices(), false);
    let err = effective.require("dashboard", Action::Edit).unwrap_err();
    assert_eq!(err.to_string(), "edit access to 'dashboard' denied");
}

#[test]
fn default_super_admin_has_full_access() {
    assert_eq!(resolve(Vec::<&str>::new(), &default_role_matrices(), true), full_access());
}
