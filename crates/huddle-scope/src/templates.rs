//! Global templates

use crate::entity::TemplateField;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Team-wide templates new scopes inherit from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalTemplates {
    #[serde(default = "empty_wristbands")]
    pub wristbands: Value,
    #[serde(default = "empty_object")]
    pub depth_chart: Value,
    #[serde(default = "empty_object")]
    pub zone_philosophies: Value,
}

fn empty_wristbands() -> Value {
    json!({"cards": []})
}

fn empty_object() -> Value {
    json!({})
}

impl Default for GlobalTemplates {
    fn default() -> Self {
        Self {
            wristbands: empty_wristbands(),
            depth_chart: empty_object(),
            zone_philosophies: empty_object(),
        }
    }
}

impl GlobalTemplates {
    /// Create default templates
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With wristband template
    #[must_use]
    pub fn with_wristbands(mut self, value: Value) -> Self {
        self.wristbands = value;
        self
    }

    /// With depth chart template
    #[must_use]
    pub fn with_depth_chart(mut self, value: Value) -> Self {
        self.depth_chart = value;
        self
    }

    /// With zone philosophy template
    #[must_use]
    pub fn with_zone_philosophies(mut self, value: Value) -> Self {
        self.zone_philosophies = value;
        self
    }

    /// Borrow a template
    #[must_use]
    pub fn get(&self, field: TemplateField) -> &Value {
        match field {
            TemplateField::Wristbands => &self.wristbands,
            TemplateField::DepthChart => &self.depth_chart,
            TemplateField::ZonePhilosophies => &self.zone_philosophies,
        }
    }

    /// Owned copy of a template for handing to a new scope
    #[must_use]
    pub fn snapshot(&self, field: TemplateField) -> Value {
        self.get(field).clone()
    }
}
