//! Huddle Store - cache and document store adapters
//!
//! Two layers back every synchronized slice:
//! - [`LocalCache`]: synchronous key → serialized text store, the fastest layer
//!   and the source of truth at cold start
//! - [`RemoteStore`]: asynchronous per-user document store, authoritative once
//!   it has been pulled
//!
//! [`MemoryCache`] and [`InMemoryRemote`] are the in-process implementations used
//! by the engine's tests and by the `huddle` CLI simulator.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod local;
pub mod memory;
pub mod remote;
pub mod subscription;
pub mod types;

pub use error::StoreError;
pub use local::{read_json, write_json, LocalCache, MemoryCache};
pub use memory::{InMemoryRemote, WriteRecord};
pub use remote::{AccountStatus, ChangeCallback, RemoteStore};
pub use subscription::{Subscription, SubscriptionId};
pub use types::{SliceKey, UserId};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
