//! Huddle Scope - time-scoped template inheritance
//!
//! A season week owns its own copy of the wristband layout, depth chart and
//! zone philosophies. Copies are taken at creation time from the previous week
//! when it carries the field, otherwise from the global template, and are never
//! shared afterwards.
//!
//! The wristband module also carries the slot-conflict rule used to validate
//! slot assignments before they touch a slice.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod entity;
pub mod inherit;
pub mod templates;
pub mod wristband;

pub use entity::{ScopedEntity, TemplateField};
pub use inherit::{backfill, instantiate};
pub use templates::GlobalTemplates;
pub use wristband::{
    assign_slot, check_slot, find_conflicts, occupants, Numbering, MAX_SLOT_GROWTH, SlotConflict, SlotError,
    SlotOccupant, WristbandCard, WristbandRow, WristbandSettings,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
