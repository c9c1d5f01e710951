//! The vesicle compartment: a well-mixed sphere with a capacitive membrane.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::history::{EntityKind, Trackable};
use crate::{Result, SimulationError};

/// Configuration for the vesicle compartment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct VesicleConfig {
    /// Initial radius (m)
    pub init_radius: f64,
    /// Initial membrane voltage (V)
    pub init_voltage: f64,
    /// Initial luminal pH
    #[serde(rename = "init_pH")]
    pub init_ph: f64,
    /// Specific membrane capacitance (F/m²)
    pub specific_capacitance: f64,
}

impl Default for VesicleConfig {
    fn default() -> Self {
        Self {
            init_radius: 1.3e-6,
            init_voltage: 0.04,
            init_ph: 7.4,
            specific_capacitance: 0.01,
        }
    }
}

/// The vesicle compartment.
///
/// Initial geometry is derived once from the configured radius; the mutable
/// fields are rewritten by the simulation on every step. Volume is stored in
/// m³; amount bookkeeping multiplies by 1000 to convert to litres where
/// concentrations (mol/L) are involved.
#[derive(Debug, Clone)]
pub struct Vesicle {
    display_name: String,
    pub config: VesicleConfig,

    /// Initial volume (m³)
    pub init_volume: f64,
    /// Initial surface area (m²)
    pub init_area: f64,
    /// Initial membrane capacitance (F)
    pub init_capacitance: f64,
    /// Initial membrane charge (C)
    pub init_charge: f64,

    /// Volume (m³)
    pub volume: f64,
    /// Surface area (m²)
    pub area: f64,
    /// Membrane capacitance (F)
    pub capacitance: f64,
    /// Membrane charge (C)
    pub charge: f64,
    /// Membrane voltage (V)
    pub voltage: f64,
    /// Luminal pH
    pub ph: f64,
}

impl Vesicle {
    pub fn new(display_name: impl Into<String>, config: VesicleConfig) -> Result<Self> {
        if config.init_radius <= 0.0 {
            return Err(SimulationError::ConfigValidation(format!(
                "vesicle init_radius must be positive, got {}",
                config.init_radius
            )));
        }
        if config.specific_capacitance <= 0.0 {
            return Err(SimulationError::ConfigValidation(format!(
                "vesicle specific_capacitance must be positive, got {}",
                config.specific_capacitance
            )));
        }

        let init_volume = 4.0 / 3.0 * PI * config.init_radius.powi(3);
        let init_area = 4.0 * PI * config.init_radius.powi(2);
        let init_capacitance = init_area * config.specific_capacitance;
        let init_charge = config.init_voltage * init_capacitance;

        Ok(Self {
            display_name: display_name.into(),
            config,
            init_volume,
            init_area,
            init_capacitance,
            init_charge,
            volume: init_volume,
            area: init_area,
            capacitance: init_capacitance,
            charge: init_charge,
            voltage: config.init_voltage,
            ph: config.init_ph,
        })
    }
}

impl Trackable for Vesicle {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Vesicle
    }

    fn tracked_fields(&self) -> &'static [&'static str] {
        &["volume", "area", "capacitance", "charge", "voltage", "pH"]
    }

    fn snapshot_values(&self) -> Vec<f64> {
        vec![
            self.volume,
            self.area,
            self.capacitance,
            self.charge,
            self.voltage,
            self.ph,
        ]
    }
}
