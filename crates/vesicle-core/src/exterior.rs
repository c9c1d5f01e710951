//! The exterior bath surrounding the vesicle.

use serde::{Deserialize, Serialize};

use crate::history::{EntityKind, Trackable};

/// Configuration for the exterior medium.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ExteriorConfig {
    #[serde(rename = "pH")]
    pub ph: f64,
}

impl Default for ExteriorConfig {
    fn default() -> Self {
        Self { ph: 7.2 }
    }
}

/// The bath on the far side of the membrane.
///
/// Treated as an infinite reservoir: its pH never changes during a run, and
/// species exterior concentrations are stored on the species themselves.
#[derive(Debug, Clone)]
pub struct Exterior {
    display_name: String,
    pub ph: f64,
}

impl Exterior {
    pub fn new(display_name: impl Into<String>, config: ExteriorConfig) -> Self {
        Self {
            display_name: display_name.into(),
            ph: config.ph,
        }
    }
}

impl Trackable for Exterior {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Exterior
    }

    fn tracked_fields(&self) -> &'static [&'static str] {
        &["pH"]
    }

    fn snapshot_values(&self) -> Vec<f64> {
        vec![self.ph]
    }
}
