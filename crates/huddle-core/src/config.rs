//! Engine configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! [sync]
//! default_debounce_ms = 1500
//!
//! [sync.overrides]
//! roster = 500
//!
//! [session]
//! admin_owner = "system"
//! admin_key = "admins"
//! ```

use crate::error::ConfigError;
use huddle_store::{SliceKey, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Debounce applied to slices without their own interval
pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;

/// Environment variable overriding `sync.default_debounce_ms`
pub const ENV_DEBOUNCE_MS: &str = "HUDDLE_DEBOUNCE_MS";

/// Environment variable overriding `session.admin_owner`
pub const ENV_ADMIN_OWNER: &str = "HUDDLE_ADMIN_OWNER";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    pub sync: SyncConfig,
    pub session: SessionConfig,
}

/// Remote write scheduling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Debounce for slices that do not set one
    pub default_debounce_ms: u64,
    /// Per-slice debounce, winning over the slice's own interval
    pub overrides: BTreeMap<String, u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_debounce_ms: DEFAULT_DEBOUNCE_MS,
            overrides: BTreeMap::new(),
        }
    }
}

/// Session-scoped remote documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Owner of the shared administrator list document
    pub admin_owner: String,
    /// Key of the administrator list document
    pub admin_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            admin_owner: "system".to_string(),
            admin_key: "admins".to_string(),
        }
    }
}

impl HuddleConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file and apply environment overrides
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, `ConfigError::Parse` if it
    /// is not valid TOML
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env_overrides();
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Apply `HUDDLE_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable source
    ///
    /// Invalid values are ignored with a warning.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_DEBOUNCE_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.sync.default_debounce_ms = ms,
                Err(err) => tracing::warn!("invalid {ENV_DEBOUNCE_MS}, ignoring: {err}"),
            }
        }
        if let Some(raw) = lookup(ENV_ADMIN_OWNER) {
            let owner = raw.trim();
            if owner.is_empty() {
                tracing::warn!("empty {ENV_ADMIN_OWNER}, ignoring");
            } else {
                self.session.admin_owner = owner.to_string();
            }
        }
    }

    /// With default debounce
    #[inline]
    #[must_use]
    pub fn with_default_debounce(mut self, debounce: Duration) -> Self {
        self.sync.default_debounce_ms = duration_ms(debounce);
        self
    }

    /// With a per-slice debounce override
    #[must_use]
    pub fn with_debounce_override(mut self, key: impl Into<String>, debounce: Duration) -> Self {
        self.sync.overrides.insert(key.into(), duration_ms(debounce));
        self
    }

    /// With administrator list location
    #[must_use]
    pub fn with_admin_list(mut self, owner: impl Into<String>, key: impl Into<String>) -> Self {
        self.session.admin_owner = owner.into();
        self.session.admin_key = key.into();
        self
    }

    /// Effective debounce for a slice
    ///
    /// Override table first, then the slice's own interval, then the default.
    #[must_use]
    pub fn debounce_for(&self, key: &SliceKey, own: Option<Duration>) -> Duration {
        self.sync
            .overrides
            .get(key.as_str())
            .map(|ms| Duration::from_millis(*ms))
            .or(own)
            .unwrap_or_else(|| Duration::from_millis(self.sync.default_debounce_ms))
    }

    /// Owner of the administrator list document
    #[must_use]
    pub fn admin_owner(&self) -> UserId {
        UserId::new(self.session.admin_owner.clone())
    }

    /// Key of the administrator list document
    #[must_use]
    pub fn admin_key(&self) -> SliceKey {
        SliceKey::new(self.session.admin_key.clone())
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
