//! Huddle Access - permission resolution
//!
//! Each role owns a [`PermissionMatrix`] (feature → `{view, edit}`). A user's
//! effective matrix is computed, never stored, by [`resolve`]:
//!
//! 1. super-admins and holders of the highest role get that role's matrix as-is
//! 2. a user with no roles gets the lowest-privilege matrix
//! 3. otherwise the lowest-privilege matrix is OR-merged with every held role,
//!    so holding more roles can only add capability
//!
//! # Example
//!
//! ```
//! use huddle_access::{default_role_matrices, resolve, Action, POSITION_COACH};
//!
//! let matrices = default_role_matrices();
//! let effective = resolve([POSITION_COACH], &matrices, false);
//! assert!(effective.can("dashboard", Action::View));
//! assert!(!effective.can("dashboard", Action::Edit));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod matrix;
pub mod resolve;
pub mod roles;

pub use error::AccessError;
pub use matrix::{Action, Capability, PermissionMatrix, RoleMatrices};
pub use resolve::resolve;
pub use roles::{
    default_matrix_for, default_role_matrices, full_access, normalize_role_matrices, ASSISTANT,
    COORDINATOR, FEATURES, HEAD_COACH, HIGHEST_ROLE, LOWEST_ROLE, POSITION_COACH, ROLE_NAMES,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
