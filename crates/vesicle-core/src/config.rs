//! Typed simulation configuration and its validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::channel::IonChannelConfig;
use crate::constants::BODY_TEMPERATURE;
use crate::exterior::ExteriorConfig;
use crate::link::IonChannelsLink;
use crate::species::IonSpeciesConfig;
use crate::vesicle::VesicleConfig;
use crate::{Result, SimulationError};

/// Scalar parameters of the integrator itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub display_name: String,
    /// Integrator step (s)
    pub time_step: f64,
    /// Simulated duration (s)
    pub total_time: f64,
    /// Temperature (K)
    pub temperature: f64,
    /// Initial buffer capacity β₀ (dimensionless)
    pub init_buffer_capacity: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            display_name: "simulation".to_string(),
            time_step: 1e-3,
            total_time: 100.0,
            temperature: BODY_TEMPERATURE,
            init_buffer_capacity: 5e-4,
        }
    }
}

/// Complete configuration for one simulation run.
///
/// Every block is optional: an absent block falls back to the built-in
/// defaults (the reference vesicle model, see [`crate::defaults`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Config format version; bumped on breaking schema changes.
    pub version: u32,
    pub simulation: SimulationParams,
    pub vesicle_params: Option<VesicleConfig>,
    pub exterior_params: Option<ExteriorConfig>,
    pub species: Option<BTreeMap<String, IonSpeciesConfig>>,
    pub channels: Option<BTreeMap<String, IonChannelConfig>>,
    pub ion_channel_links: Option<IonChannelsLink>,
}

impl SimulationConfig {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|err| {
            SimulationError::ConfigValidation(format!("failed to parse configuration: {err}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| {
            SimulationError::ConfigValidation(format!("failed to serialise configuration: {err}"))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != Self::CURRENT_VERSION {
            return Err(SimulationError::ConfigValidation(format!(
                "unsupported config version {} (expected {})",
                self.version,
                Self::CURRENT_VERSION
            )));
        }
        let params = &self.simulation;
        if params.time_step <= 0.0 {
            return Err(SimulationError::ConfigValidation(format!(
                "time_step must be positive, got {}",
                params.time_step
            )));
        }
        if params.total_time < 0.0 {
            return Err(SimulationError::ConfigValidation(format!(
                "total_time cannot be negative, got {}",
                params.total_time
            )));
        }
        if params.temperature <= 0.0 {
            return Err(SimulationError::ConfigValidation(format!(
                "temperature must be positive, got {}",
                params.temperature
            )));
        }
        if params.init_buffer_capacity <= 0.0 {
            return Err(SimulationError::ConfigValidation(format!(
                "init_buffer_capacity must be positive, got {}",
                params.init_buffer_capacity
            )));
        }
        if let Some(species) = &self.species {
            for (name, config) in species {
                if name.is_empty() {
                    return Err(SimulationError::ConfigValidation(
                        "species names must be non-empty".into(),
                    ));
                }
                if config.exterior_conc < 0.0 {
                    return Err(SimulationError::ConfigValidation(format!(
                        "species \"{name}\": exterior_conc cannot be negative, got {}",
                        config.exterior_conc
                    )));
                }
                if config.init_vesicle_conc < 0.0 {
                    return Err(SimulationError::ConfigValidation(format!(
                        "species \"{name}\": init_vesicle_conc cannot be negative, got {}",
                        config.init_vesicle_conc
                    )));
                }
            }
        }
        if let Some(channels) = &self.channels {
            for name in channels.keys() {
                if name.is_empty() {
                    return Err(SimulationError::ConfigValidation(
                        "channel names must be non-empty".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            simulation: SimulationParams::default(),
            vesicle_params: None,
            exterior_params: None,
            species: None,
            channels: None,
            ion_channel_links: None,
        }
    }
}
