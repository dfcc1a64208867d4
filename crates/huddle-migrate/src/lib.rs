//! Huddle Migrate - default merge and legacy shape migration
//!
//! Every persisted slice passes through this crate before the rest of the
//! system sees it:
//!
//! 1. A [`MigrationPlan`] runs named, versioned steps (`old shape -> new shape`),
//!    each skipped when its shape check does not match.
//! 2. [`merge`] overlays the migrated value on the current defaults so any
//!    field added since the value was written appears with its default.
//! 3. [`LegacySource`]s copy values from older, differently-named locations
//!    through an explicit [`FieldMapping`] table.
//!
//! All functions are pure and total: malformed input degrades to defaults.
//!
//! # Example
//!
//! ```
//! use huddle_migrate::merge_defaults;
//! use serde_json::json;
//!
//! let defaults = json!({"enabled": true, "limit": 10});
//! let merged = merge_defaults(&defaults, Some(&json!({"enabled": false})));
//! assert_eq!(merged, json!({"enabled": false, "limit": 10}));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod legacy;
pub mod merge;
pub mod pointer;
pub mod steps;
pub mod visibility;

pub use legacy::{absorb_flat_keys, map_legacy_role, staff_plan, visibility_plan, FlatKey};
pub use merge::{merge, merge_defaults, merge_report, FieldMapping, LegacySource, MergeReport, ShapeMismatch};
pub use steps::{MigrationPlan, MigrationReport, MigrationStep};
pub use visibility::{default_feature_visibility, is_feature_visible, merge_feature_visibility};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
