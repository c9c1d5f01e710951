//! Built-in species, channel and link tables for the reference vesicle model.
//!
//! A configuration that omits its species, channels or links block runs
//! against these tables: four ionic species (Cl⁻, H⁺, Na⁺, K⁺) coupled by
//! the usual late-endosome transport set — ASOR and CLC on the chloride
//! side, TPC and NHE on the sodium side, the V-ATPase and a proton leak on
//! the hydrogen side, and a potassium channel. Exchangers appear twice
//! (e.g. `clc` and `clc_h`), once per transported species, with the
//! stoichiometry carried by the flux multipliers.

use std::collections::BTreeMap;

use crate::channel::{ChannelType, DependenceType, IonChannelConfig};
use crate::link::IonChannelsLink;
use crate::species::IonSpeciesConfig;

/// Default ionic species of the reference model.
pub fn default_species() -> BTreeMap<String, IonSpeciesConfig> {
    BTreeMap::from([
        (
            "cl".to_string(),
            IonSpeciesConfig {
                init_vesicle_conc: 0.159,
                exterior_conc: 0.02,
                elementary_charge: -1,
            },
        ),
        (
            // Bulk (buffered) proton pool; the free concentration is the
            // bulk value scaled by the buffer capacity.
            "h".to_string(),
            IonSpeciesConfig {
                init_vesicle_conc: 7.962143e-5,
                exterior_conc: 1.261915e-4,
                elementary_charge: 1,
            },
        ),
        (
            "na".to_string(),
            IonSpeciesConfig {
                init_vesicle_conc: 0.15,
                exterior_conc: 0.01,
                elementary_charge: 1,
            },
        ),
        (
            "k".to_string(),
            IonSpeciesConfig {
                init_vesicle_conc: 0.005,
                exterior_conc: 0.145,
                elementary_charge: 1,
            },
        ),
    ])
}

/// Default channel set of the reference model.
pub fn default_channels() -> BTreeMap<String, IonChannelConfig> {
    let mut channels = BTreeMap::new();

    // Acid-sensitive outwardly rectifying Cl⁻ channel.
    channels.insert(
        "asor".to_string(),
        IonChannelConfig {
            conductance: 8e-5,
            channel_type: ChannelType::Wt,
            dependence_type: DependenceType::VoltageAndPh,
            allowed_primary_ion: Some("cl".to_string()),
            ..IonChannelConfig::default()
        },
    );

    // 2Cl⁻/1H⁺ antiporter, chloride leg.
    channels.insert(
        "clc".to_string(),
        IonChannelConfig {
            conductance: 1e-7,
            channel_type: ChannelType::Clc,
            dependence_type: DependenceType::VoltageAndPh,
            flux_multiplier: 2.0,
            allowed_primary_ion: Some("cl".to_string()),
            allowed_secondary_ion: Some("h".to_string()),
            primary_exponent: 2,
            secondary_exponent: 1,
            use_free_hydrogen: true,
            ..IonChannelConfig::default()
        },
    );

    // 2Cl⁻/1H⁺ antiporter, hydrogen leg: same driving force seen from the
    // proton side, opposite transport direction.
    channels.insert(
        "clc_h".to_string(),
        IonChannelConfig {
            conductance: 1e-7,
            channel_type: ChannelType::Clc,
            dependence_type: DependenceType::VoltageAndPh,
            flux_multiplier: -1.0,
            allowed_primary_ion: Some("h".to_string()),
            allowed_secondary_ion: Some("cl".to_string()),
            primary_exponent: 1,
            secondary_exponent: 2,
            use_free_hydrogen: true,
            invert_primary_log_term: true,
            invert_secondary_log_term: true,
            ..IonChannelConfig::default()
        },
    );

    // Two-pore Na⁺ channel.
    channels.insert(
        "tpc".to_string(),
        IonChannelConfig {
            conductance: 2e-6,
            dependence_type: DependenceType::Voltage,
            allowed_primary_ion: Some("na".to_string()),
            ..IonChannelConfig::default()
        },
    );

    // Na⁺/H⁺ exchanger, sodium leg.
    channels.insert(
        "nhe".to_string(),
        IonChannelConfig {
            conductance: 1e-7,
            voltage_multiplier: 0.0,
            allowed_primary_ion: Some("na".to_string()),
            allowed_secondary_ion: Some("h".to_string()),
            use_free_hydrogen: true,
            ..IonChannelConfig::default()
        },
    );

    // Na⁺/H⁺ exchanger, hydrogen leg.
    channels.insert(
        "nhe_h".to_string(),
        IonChannelConfig {
            conductance: 1e-7,
            voltage_multiplier: 0.0,
            flux_multiplier: -1.0,
            allowed_primary_ion: Some("h".to_string()),
            allowed_secondary_ion: Some("na".to_string()),
            use_free_hydrogen: true,
            invert_primary_log_term: true,
            invert_secondary_log_term: true,
            ..IonChannelConfig::default()
        },
    );

    // V-ATPase proton pump; the voltage shift is the proton-motive force
    // the pump can work against, and the time gate models its activation.
    channels.insert(
        "vatpase".to_string(),
        IonChannelConfig {
            conductance: 8e-9,
            dependence_type: DependenceType::Time,
            flux_multiplier: -1.0,
            voltage_shift: 0.27,
            allowed_primary_ion: Some("h".to_string()),
            use_free_hydrogen: true,
            ..IonChannelConfig::default()
        },
    );

    // Passive proton leak.
    channels.insert(
        "hleak".to_string(),
        IonChannelConfig {
            conductance: 1.6e-8,
            allowed_primary_ion: Some("h".to_string()),
            use_free_hydrogen: true,
            ..IonChannelConfig::default()
        },
    );

    // Potassium channel.
    channels.insert(
        "k_channel".to_string(),
        IonChannelConfig {
            conductance: 6e-7,
            dependence_type: DependenceType::Voltage,
            channel_type: ChannelType::Mt,
            allowed_primary_ion: Some("k".to_string()),
            ..IonChannelConfig::default()
        },
    );

    channels
}

/// Default binding topology of the reference model.
pub fn default_links() -> IonChannelsLink {
    let mut links = IonChannelsLink::new();
    links.add_link("cl", "asor", None);
    links.add_link("cl", "clc", Some("h"));
    links.add_link("na", "tpc", None);
    links.add_link("na", "nhe", Some("h"));
    links.add_link("h", "vatpase", None);
    links.add_link("h", "nhe_h", Some("na"));
    links.add_link("h", "hleak", None);
    links.add_link("h", "clc_h", Some("cl"));
    links.add_link("k", "k_channel", None);
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_linked_channel_exists() {
        let channels = default_channels();
        let species = default_species();
        for (species_name, entries) in default_links().iter() {
            assert!(species.contains_key(species_name));
            for (channel_name, secondary) in entries {
                assert!(channels.contains_key(channel_name), "missing {channel_name}");
                if let Some(secondary) = secondary {
                    assert!(species.contains_key(secondary));
                }
            }
        }
    }

    #[test]
    fn default_hydrogen_matches_initial_ph() {
        // Bulk H⁺ scaled by β₀ must reproduce the configured pH values.
        let species = default_species();
        let beta0 = 5e-4;
        let vesicle_free = species["h"].init_vesicle_conc * beta0;
        let exterior_free = species["h"].exterior_conc * beta0;
        assert!((-vesicle_free.log10() - 7.4).abs() < 1e-6);
        assert!((-exterior_free.log10() - 7.2).abs() < 1e-6);
    }
}
