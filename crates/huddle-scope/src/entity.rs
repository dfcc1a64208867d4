//! Scoped entity model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Template-backed field owned by every scoped entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateField {
    Wristbands,
    DepthChart,
    ZonePhilosophies,
}

impl TemplateField {
    /// All template fields, in backfill order
    pub const ALL: [Self; 3] = [Self::Wristbands, Self::DepthChart, Self::ZonePhilosophies];

    /// Persisted field name
    #[inline]
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Wristbands => "wristbands",
            Self::DepthChart => "depthChart",
            Self::ZonePhilosophies => "zonePhilosophies",
        }
    }
}

impl fmt::Display for TemplateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A time-scoped entity such as a season week
///
/// Fields this crate does not know about round-trip through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedEntity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wristbands: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_chart: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_philosophies: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScopedEntity {
    /// Create an entity with no template fields
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            wristbands: None,
            depth_chart: None,
            zone_philosophies: None,
            extra: Map::new(),
        }
    }

    /// Template field value, treating `null` as absent
    #[must_use]
    pub fn field(&self, field: TemplateField) -> Option<&Value> {
        let slot = match field {
            TemplateField::Wristbands => &self.wristbands,
            TemplateField::DepthChart => &self.depth_chart,
            TemplateField::ZonePhilosophies => &self.zone_philosophies,
        };
        slot.as_ref().filter(|v| !v.is_null())
    }

    /// Mutable template field slot
    pub fn field_mut(&mut self, field: TemplateField) -> &mut Option<Value> {
        match field {
            TemplateField::Wristbands => &mut self.wristbands,
            TemplateField::DepthChart => &mut self.depth_chart,
            TemplateField::ZonePhilosophies => &mut self.zone_philosophies,
        }
    }

    /// Whether the entity carries its own copy of the field
    #[inline]
    #[must_use]
    pub fn has(&self, field: TemplateField) -> bool {
        self.field(field).is_some()
    }
}
