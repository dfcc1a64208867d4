//! Permission matrix types

use crate::error::AccessError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Guarded action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Read access
    View,
    /// Write access
    Edit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::View => f.write_str("view"),
            Self::Edit => f.write_str("edit"),
        }
    }
}

/// Capability pair for one feature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    #[serde(default)]
    pub view: bool,
    #[serde(default)]
    pub edit: bool,
}

impl Capability {
    /// No access
    pub const NONE: Self = Self { view: false, edit: false };
    /// Read-only
    pub const VIEW: Self = Self { view: true, edit: false };
    /// Read and write
    pub const FULL: Self = Self { view: true, edit: true };

    /// OR of both capability bits
    #[inline]
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            view: self.view || other.view,
            edit: self.edit || other.edit,
        }
    }

    /// Whether the action is granted
    #[inline]
    #[must_use]
    pub fn allows(self, action: Action) -> bool {
        match action {
            Action::View => self.view,
            Action::Edit => self.edit,
        }
    }

    /// Whether every bit granted by `other` is granted here
    #[inline]
    #[must_use]
    pub fn covers(self, other: Self) -> bool {
        (self.view || !other.view) && (self.edit || !other.edit)
    }
}

/// Feature name → capability
///
/// Features absent from the matrix grant nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMatrix(BTreeMap<String, Capability>);

/// Role name → matrix
pub type RoleMatrices = BTreeMap<String, PermissionMatrix>;

impl PermissionMatrix {
    /// Create empty matrix
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style set
    #[must_use]
    pub fn with(mut self, feature: impl Into<String>, capability: Capability) -> Self {
        self.set(feature, capability);
        self
    }

    /// Set capability for a feature
    pub fn set(&mut self, feature: impl Into<String>, capability: Capability) {
        self.0.insert(feature.into(), capability);
    }

    /// Capability for a feature
    #[inline]
    #[must_use]
    pub fn get(&self, feature: &str) -> Capability {
        self.0.get(feature).copied().unwrap_or_default()
    }

    /// Whether the action is granted on a feature
    #[inline]
    #[must_use]
    pub fn can(&self, feature: &str, action: Action) -> bool {
        self.get(feature).allows(action)
    }

    /// Guard an action
    ///
    /// # Errors
    /// `AccessError::Denied` when the capability is missing
    pub fn require(&self, feature: &str, action: Action) -> Result<(), AccessError> {
        if self.can(feature, action) {
            Ok(())
        } else {
            Err(AccessError::denied(feature, action))
        }
    }

    /// OR-merge another matrix into this one
    pub fn absorb(&mut self, other: &Self) {
        for (feature, capability) in &other.0 {
            let entry = self.0.entry(feature.clone()).or_default();
            *entry = entry.union(*capability);
        }
    }

    /// Whether every capability granted by `other` is granted here
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        other
            .0
            .iter()
            .all(|(feature, capability)| self.get(feature).covers(*capability))
    }

    /// Iterate features
    pub fn iter(&self) -> impl Iterator<Item = (&str, Capability)> {
        self.0.iter().map(|(f, c)| (f.as_str(), *c))
    }

    /// Number of features listed
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if matrix is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
