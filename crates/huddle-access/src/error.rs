//! Access errors

use crate::matrix::Action;

/// Guarded action rejected by the effective matrix
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Capability not granted
    #[error("{action} access to '{feature}' denied")]
    Denied { feature: String, action: Action },
}

impl AccessError {
    /// Create denied error
    #[must_use]
    pub fn denied(feature: impl Into<String>, action: Action) -> Self {
        Self::Denied {
            feature: feature.into(),
            action,
        }
    }
}
