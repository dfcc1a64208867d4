//! Versioned migration steps
//!
//! Each step is a pure `old shape -> new shape` function guarded by a shape
//! check. A [`MigrationPlan`] runs its steps in version order and skips every
//! step whose check does not match, so running a plan twice is a no-op.

use serde_json::Value;

/// One named shape upgrade
#[derive(Debug, Clone, Copy)]
pub struct MigrationStep {
    /// Ordering key; lower versions run first
    pub version: u32,
    /// Stable name used in logs and reports
    pub name: &'static str,
    applies: fn(&Value) -> bool,
    migrate: fn(Value) -> Value,
}

impl MigrationStep {
    /// Create step
    #[inline]
    #[must_use]
    pub const fn new(
        version: u32,
        name: &'static str,
        applies: fn(&Value) -> bool,
        migrate: fn(Value) -> Value,
    ) -> Self {
        Self {
            version,
            name,
            applies,
            migrate,
        }
    }

    /// Whether the value still has the shape this step upgrades
    #[inline]
    #[must_use]
    pub fn applies(&self, value: &Value) -> bool {
        (self.applies)(value)
    }

    /// Run the upgrade
    #[inline]
    #[must_use]
    pub fn apply(&self, value: Value) -> Value {
        (self.migrate)(value)
    }
}

/// Result of running a plan
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    /// Migrated value
    pub value: Value,
    /// Names of the steps that ran, in order
    pub applied: Vec<&'static str>,
}

impl MigrationReport {
    /// Whether any step changed the shape
    #[inline]
    #[must_use]
    pub fn migrated(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Ordered list of migration steps
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    /// Create empty plan
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add step, keeping version order
    #[must_use]
    pub fn with_step(mut self, step: MigrationStep) -> Self {
        self.steps.push(step);
        self.steps.sort_by_key(|s| s.version);
        self
    }

    /// Run every applicable step in order
    #[must_use]
    pub fn run(&self, value: Value) -> MigrationReport {
        let mut value = value;
        let mut applied = Vec::new();
        for step in &self.steps {
            if step.applies(&value) {
                value = step.apply(value);
                applied.push(step.name);
                tracing::debug!(step = step.name, version = step.version, "migration step applied");
            }
        }
        MigrationReport { value, applied }
    }

    /// Step names in run order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name).collect()
    }

    /// Number of steps
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if plan is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
