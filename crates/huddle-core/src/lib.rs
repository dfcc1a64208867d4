//! Huddle Core - slice synchronization engine
//!
//! Keeps each dashboard slice consistent between the fast local cache and the
//! authoritative remote store:
//! - cold start reads every slice from the local cache, upgrading old shapes
//! - sign-in runs one bootstrap pull, then opens the session gate
//! - after the gate opens, one debounced controller per slice writes changes
//! - sign-out and user switches cancel outstanding writes
//!
//! # Example
//!
//! ```no_run
//! use huddle_core::SyncEngine;
//! use huddle_store::{InMemoryRemote, MemoryCache, UserId};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), huddle_core::SyncError> {
//! let engine = SyncEngine::builder(Arc::new(MemoryCache::new()), Arc::new(InMemoryRemote::new())).build();
//! engine.set_user(Some(UserId::new("coach-1"))).await?;
//! engine.set("roster", json!([{"name": "Kai", "number": 7}]))?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod admins;
pub mod bootstrap;
pub mod catalog;
pub mod cold_start;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod observer;
pub mod registry;
pub mod session;
pub mod validate;

pub use admins::{parse_admins, AdminList};
pub use bootstrap::{BootstrapOutcome, BootstrapReport, BootstrapSequencer, OWNER_KEY};
pub use catalog::{keys, LegacyKey, SliceCatalog, SliceSpec};
pub use cold_start::{load_slices, LoadReport};
pub use config::{HuddleConfig, SessionConfig, SyncConfig};
pub use controller::DebouncedController;
pub use engine::{SliceHandle, SyncEngine, SyncEngineBuilder};
pub use error::{ConfigError, SyncError, ValidationError};
pub use observer::{SyncObserver, SyncStats, TracingObserver};
pub use registry::SyncRegistry;
pub use session::{validate_transition, GateState, SessionGate, SessionPhase};
pub use validate::{PlaybookReferenceValidator, SliceValidator, SliceView, WristbandSlotValidator};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
