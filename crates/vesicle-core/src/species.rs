//! Ionic species tracked inside the vesicle.

use serde::{Deserialize, Serialize};

use crate::history::{EntityKind, Trackable};

/// Display name that marks a species as hydrogen.
///
/// The hydrogen species feeds the pH update, the buffer scaling and the
/// free-proton concentrations handed to channels that opt in.
pub const HYDROGEN_SPECIES: &str = "h";

/// Configuration for one ionic species.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IonSpeciesConfig {
    /// Initial concentration inside the vesicle (mol/L)
    pub init_vesicle_conc: f64,
    /// Concentration in the exterior bath (mol/L), constant over a run
    pub exterior_conc: f64,
    /// Signed charge number (e.g. +1 for Na⁺, −1 for Cl⁻)
    pub elementary_charge: i32,
}

/// Runtime state of an ionic species.
#[derive(Debug, Clone)]
pub struct IonSpecies {
    display_name: String,
    pub elementary_charge: i32,
    pub exterior_conc: f64,
    pub init_vesicle_conc: f64,
    /// Concentration inside the vesicle (mol/L)
    pub vesicle_conc: f64,
    /// Amount inside the vesicle (mol); set when a run starts
    pub vesicle_amount: f64,

    /// Channel arena indices bound to this species, in link-resolution order.
    pub(crate) channels: Vec<usize>,
    /// One negative-amount warning per species per run.
    pub(crate) amount_clamp_warned: bool,
}

impl IonSpecies {
    pub fn new(display_name: impl Into<String>, config: &IonSpeciesConfig) -> Self {
        Self {
            display_name: display_name.into(),
            elementary_charge: config.elementary_charge,
            exterior_conc: config.exterior_conc,
            init_vesicle_conc: config.init_vesicle_conc,
            vesicle_conc: config.init_vesicle_conc,
            vesicle_amount: 0.0,
            channels: Vec::new(),
            amount_clamp_warned: false,
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        self.display_name == HYDROGEN_SPECIES
    }

    /// Arena indices of the channels bound to this species.
    pub fn channel_indices(&self) -> &[usize] {
        &self.channels
    }
}

impl Trackable for IonSpecies {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn kind(&self) -> EntityKind {
        EntityKind::IonSpecies
    }

    fn tracked_fields(&self) -> &'static [&'static str] {
        &["vesicle_conc", "vesicle_amount"]
    }

    fn snapshot_values(&self) -> Vec<f64> {
        vec![self.vesicle_conc, self.vesicle_amount]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hydrogen_is_recognised_by_name() {
        let config = IonSpeciesConfig {
            init_vesicle_conc: 1e-7,
            exterior_conc: 1e-7,
            elementary_charge: 1,
        };
        assert!(IonSpecies::new("h", &config).is_hydrogen());
        assert!(!IonSpecies::new("na", &config).is_hydrogen());
    }
}
