//! End-to-end scenarios for the simulation engine.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use approx::assert_relative_eq;
use vesicle_core::constants::{FARADAY, VOLUME_TO_AREA};
use vesicle_core::{
    defaults, DependenceType, IonChannelConfig, IonChannelsLink, IonSpeciesConfig, Simulation,
    SimulationConfig, SimulationError, Trackable, VesicleConfig,
};

/// The reference species set with no channels at all.
fn species_only_config(total_time: f64, time_step: f64) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.simulation.total_time = total_time;
    config.simulation.time_step = time_step;
    config.species = Some(defaults::default_species());
    config.channels = Some(BTreeMap::new());
    config.ion_channel_links = Some(IonChannelsLink::new());
    config
}

fn single_species(
    name: &str,
    init_vesicle_conc: f64,
    exterior_conc: f64,
    elementary_charge: i32,
) -> BTreeMap<String, IonSpeciesConfig> {
    BTreeMap::from([(
        name.to_string(),
        IonSpeciesConfig {
            init_vesicle_conc,
            exterior_conc,
            elementary_charge,
        },
    )])
}

#[test]
fn unaccounted_charge_matches_hand_calculation() {
    let mut simulation = Simulation::new(species_only_config(0.0, 1e-3)).unwrap();
    simulation.run().unwrap();
    let n_u = simulation.unaccounted_ion_amount().unwrap();

    // Independent arithmetic from the configured geometry and species.
    let radius: f64 = 1.3e-6;
    let init_area = 4.0 * PI * radius.powi(2);
    let init_charge = 0.04 * init_area * 0.01;
    let init_volume = 4.0 / 3.0 * PI * radius.powi(3);
    let charge_concentration = -0.159 + 7.962143e-5 + 0.15 + 0.005;
    let expected = init_charge / FARADAY - charge_concentration * 1000.0 * init_volume;

    assert_relative_eq!(n_u, expected, max_relative = 1e-6);
    assert_relative_eq!(n_u, 3.6166e-17, max_relative = 1e-3);
}

#[test]
fn initial_ph_reproduces_configured_value() {
    let mut simulation = Simulation::new(species_only_config(1e-3, 1e-3)).unwrap();
    simulation.run().unwrap();
    let ph = simulation.histories().get("Vesicle_pH").unwrap();
    assert_eq!(ph.len(), 1);
    assert!((ph[0] - 7.4).abs() < 1e-6, "pH = {}", ph[0]);
}

#[test]
fn zero_conductance_leaves_state_constant() {
    let channels: BTreeMap<_, _> = defaults::default_channels()
        .into_iter()
        .map(|(name, mut channel)| {
            channel.conductance = 0.0;
            (name, channel)
        })
        .collect();
    let mut config = SimulationConfig::default();
    config.simulation.total_time = 1.0;
    config.simulation.time_step = 1e-3;
    config.channels = Some(channels);

    let mut simulation = Simulation::new(config).unwrap();
    simulation.run().unwrap();

    let voltage = simulation.histories().get("Vesicle_voltage").unwrap();
    assert_eq!(voltage.len(), 1000);
    assert_relative_eq!(voltage[0], 0.04, max_relative = 1e-9);
    let max_voltage_drift = voltage
        .iter()
        .map(|v| (v - voltage[0]).abs())
        .fold(0.0, f64::max);
    assert!(max_voltage_drift < 1e-9, "drift {max_voltage_drift}");

    let volume = simulation.histories().get("Vesicle_volume").unwrap();
    let max_volume_drift = volume
        .iter()
        .map(|v| (v - volume[0]).abs() / volume[0])
        .fold(0.0, f64::max);
    assert!(max_volume_drift < 1e-9, "drift {max_volume_drift}");

    // Fluxes are identically zero with g = 0.
    let flux = simulation.histories().get("asor_flux").unwrap();
    assert!(flux.iter().all(|f| *f == 0.0));
}

#[test]
fn voltage_gate_is_half_open_at_half_activation() {
    let channels = BTreeMap::from([(
        "tpc".to_string(),
        IonChannelConfig {
            dependence_type: DependenceType::Voltage,
            allowed_primary_ion: Some("na".to_string()),
            ..IonChannelConfig::default()
        },
    )]);
    let mut links = IonChannelsLink::new();
    links.add_link("na", "tpc", None);

    let mut config = SimulationConfig::default();
    config.simulation.total_time = 1e-3;
    config.simulation.time_step = 1e-3;
    config.vesicle_params = Some(VesicleConfig {
        init_voltage: -0.04,
        ..VesicleConfig::default()
    });
    config.species = Some(single_species("na", 0.15, 0.01, 1));
    config.channels = Some(channels);
    config.ion_channel_links = Some(links);

    let mut simulation = Simulation::new(config).unwrap();
    simulation.run().unwrap();
    let gate = simulation.histories().get("tpc_voltage_dependence").unwrap();
    assert_eq!(gate.len(), 1);
    assert_relative_eq!(gate[0], 0.5, max_relative = 1e-9);
}

#[test]
fn species_channel_name_collision_fails_construction() {
    let mut config = SimulationConfig::default();
    let mut channels = defaults::default_channels();
    channels.insert(
        "cl".to_string(),
        IonChannelConfig {
            allowed_primary_ion: Some("cl".to_string()),
            ..IonChannelConfig::default()
        },
    );
    config.channels = Some(channels);

    match Simulation::new(config).unwrap_err() {
        SimulationError::NameConflict { name, existing, requested } => {
            assert_eq!(name, "cl");
            assert_eq!(existing, "ion species");
            assert_eq!(requested, "ion channel");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn charge_and_voltage_satisfy_their_definitions() {
    let mut config = SimulationConfig::default();
    config.simulation.total_time = 0.1;
    config.simulation.time_step = 1e-3;
    let mut simulation = Simulation::new(config).unwrap();
    simulation.run().unwrap();

    let n_u = simulation.unaccounted_ion_amount().unwrap();
    let histories = simulation.histories();
    let charge = histories.get("Vesicle_charge").unwrap();
    let voltage = histories.get("Vesicle_voltage").unwrap();
    let capacitance = histories.get("Vesicle_capacitance").unwrap();
    assert_eq!(charge.len(), 100);

    let species_names = ["cl", "h", "k", "na"];
    let charges = [-1.0, 1.0, 1.0, 1.0];
    let amounts: Vec<&[f64]> = species_names
        .iter()
        .map(|name| histories.get(&format!("{name}_vesicle_amount")).unwrap())
        .collect();

    for step in 0..charge.len() {
        let total: f64 = amounts
            .iter()
            .zip(charges)
            .map(|(series, z)| z * series[step])
            .sum();
        assert_relative_eq!(charge[step], (total + n_u) * FARADAY, max_relative = 1e-12);
        assert_relative_eq!(voltage[step], charge[step] / capacitance[step], max_relative = 1e-12);
    }
}

#[test]
fn area_tracks_volume_to_the_two_thirds() {
    let mut config = SimulationConfig::default();
    config.simulation.total_time = 0.05;
    config.simulation.time_step = 1e-3;
    let mut simulation = Simulation::new(config).unwrap();
    simulation.run().unwrap();

    let area = simulation.histories().get("Vesicle_area").unwrap();
    let volume = simulation.histories().get("Vesicle_volume").unwrap();
    for (a, v) in area.iter().zip(volume) {
        let relative = (a - VOLUME_TO_AREA * v.powf(2.0 / 3.0)).abs() / a;
        assert!(relative <= 1e-10, "relative error {relative}");
    }
}

#[test]
fn amounts_and_concentrations_respect_their_floors() {
    // A channel strong enough to empty the species in a single step.
    let channels = BTreeMap::from([(
        "drain".to_string(),
        IonChannelConfig {
            conductance: 1.0,
            flux_multiplier: -1e6,
            allowed_primary_ion: Some("x".to_string()),
            ..IonChannelConfig::default()
        },
    )]);
    let mut links = IonChannelsLink::new();
    links.add_link("x", "drain", None);

    let mut config = SimulationConfig::default();
    config.simulation.total_time = 0.01;
    config.simulation.time_step = 1e-3;
    config.species = Some(single_species("x", 1e-9, 0.1, 1));
    config.channels = Some(channels);
    config.ion_channel_links = Some(links);

    let mut simulation = Simulation::new(config).unwrap();
    simulation.run().unwrap();

    let amount = simulation.histories().get("x_vesicle_amount").unwrap();
    let conc = simulation.histories().get("x_vesicle_conc").unwrap();
    assert_eq!(amount.len(), 10);
    assert!(amount.iter().all(|n| *n >= 0.0));
    // The floor is 1e-9 up to round-off in the amount/volume round trip.
    assert!(conc.iter().all(|c| *c >= 1e-9 * (1.0 - 1e-12)));
    // The drain actually fired: the amount hit the floor.
    assert_eq!(*amount.last().unwrap(), 0.0);
}

#[test]
fn every_series_has_one_sample_per_step() {
    let mut config = SimulationConfig::default();
    config.simulation.total_time = 0.02;
    config.simulation.time_step = 1e-3;
    let mut simulation = Simulation::new(config).unwrap();
    simulation.run().unwrap();

    assert_eq!(simulation.histories().snapshot_count(), 20);
    for (key, series) in simulation.histories().series() {
        assert_eq!(series.len(), 20, "series {key}");
    }
}

#[test]
fn time_series_advances_by_exactly_one_step() {
    // A binary time step makes the accumulated sum exact.
    let time_step = 1.0 / 1024.0;
    let mut config = SimulationConfig::default();
    config.simulation.time_step = time_step;
    config.simulation.total_time = 32.0 * time_step;
    let mut simulation = Simulation::new(config).unwrap();
    simulation.run().unwrap();

    let time = simulation.histories().get("simulation_time").unwrap();
    assert_eq!(time.len(), 32);
    for (step, value) in time.iter().enumerate() {
        assert_eq!(*value, step as f64 * time_step);
    }
}

#[test]
fn neutral_dependence_leaves_all_gates_at_one() {
    let channels = BTreeMap::from([(
        "leak".to_string(),
        IonChannelConfig {
            allowed_primary_ion: Some("na".to_string()),
            ..IonChannelConfig::default()
        },
    )]);
    let mut links = IonChannelsLink::new();
    links.add_link("na", "leak", None);

    let mut config = SimulationConfig::default();
    config.simulation.total_time = 0.01;
    config.simulation.time_step = 1e-3;
    config.species = Some(single_species("na", 0.15, 0.01, 1));
    config.channels = Some(channels);
    config.ion_channel_links = Some(links);

    let mut simulation = Simulation::new(config).unwrap();
    simulation.run().unwrap();

    // Gating values stay neutral and are not recorded for this channel.
    let channel = simulation.channel_named("leak").unwrap();
    assert_eq!(channel.voltage_dependence, 1.0);
    assert_eq!(channel.ph_dependence, 1.0);
    assert_eq!(channel.time_dependence, 1.0);
    assert!(simulation.histories().get("leak_voltage_dependence").is_none());
    assert!(simulation.histories().get("leak_flux").is_some());
}

#[test]
fn identical_configurations_run_bit_identically() {
    let mut config = SimulationConfig::default();
    config.simulation.total_time = 0.05;
    config.simulation.time_step = 1e-3;

    let mut first = Simulation::new(config.clone()).unwrap();
    first.run().unwrap();
    let mut second = Simulation::new(config).unwrap();
    second.run().unwrap();

    for (key, series) in first.histories().series() {
        assert_eq!(Some(series.as_slice()), second.histories().get(key), "series {key}");
    }
}

#[test]
fn flush_allows_a_clean_re_run() {
    let mut config = SimulationConfig::default();
    config.simulation.total_time = 0.01;
    config.simulation.time_step = 1e-3;
    let mut simulation = Simulation::new(config).unwrap();
    simulation.run().unwrap();
    assert_eq!(simulation.histories().snapshot_count(), 10);

    simulation.flush_histories();
    assert_eq!(simulation.histories().snapshot_count(), 0);
    assert!(simulation.histories().get("Vesicle_voltage").is_some());

    simulation.run().unwrap();
    assert_eq!(simulation.histories().snapshot_count(), 10);
}

#[test]
fn zero_total_time_records_nothing() {
    let mut simulation = Simulation::new(species_only_config(0.0, 1e-3)).unwrap();
    let mut calls = 0;
    simulation.run_with_progress(|_| calls += 1).unwrap();
    assert_eq!(calls, 0);
    assert_eq!(simulation.histories().snapshot_count(), 0);
    assert!(simulation.histories().get("Vesicle_voltage").unwrap().is_empty());
}

#[test]
fn zero_exterior_concentration_aborts_the_first_step() {
    let channels = BTreeMap::from([(
        "leak".to_string(),
        IonChannelConfig {
            allowed_primary_ion: Some("na".to_string()),
            ..IonChannelConfig::default()
        },
    )]);
    let mut links = IonChannelsLink::new();
    links.add_link("na", "leak", None);

    let mut config = SimulationConfig::default();
    config.simulation.total_time = 0.01;
    config.simulation.time_step = 1e-3;
    config.species = Some(single_species("na", 0.15, 0.0, 1));
    config.channels = Some(channels);
    config.ion_channel_links = Some(links);

    let mut simulation = Simulation::new(config).unwrap();
    match simulation.run() {
        Err(SimulationError::NumericDomain { entity, time, .. }) => {
            assert_eq!(entity, "na");
            assert_eq!(time, 0.0);
        }
        other => panic!("expected a numeric domain error, got {other:?}"),
    }
    // The failing step recorded no snapshot.
    assert_eq!(simulation.histories().snapshot_count(), 0);
}

#[test]
fn progress_is_monotonic_and_complete() {
    let mut config = SimulationConfig::default();
    config.simulation.total_time = 0.025;
    config.simulation.time_step = 1e-3;
    let mut simulation = Simulation::new(config).unwrap();

    let mut reports = Vec::new();
    simulation.run_with_progress(|percent| reports.push(percent)).unwrap();
    assert_eq!(reports.len(), 25);
    assert!(reports.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(*reports.last().unwrap(), 100.0);
}

#[test]
fn cancellation_stops_at_an_iteration_boundary() {
    let mut config = SimulationConfig::default();
    config.simulation.total_time = 0.1;
    config.simulation.time_step = 1e-3;
    let mut simulation = Simulation::new(config).unwrap();

    let handle = simulation.cancel_handle();
    simulation
        .run_with_progress(|percent| {
            if percent >= 50.0 {
                handle.cancel();
            }
        })
        .unwrap();
    assert_eq!(simulation.histories().snapshot_count(), 50);
}

#[test]
fn binding_against_the_wrong_primary_fails_construction() {
    let mut species = single_species("na", 0.15, 0.01, 1);
    species.extend(single_species("cl", 0.159, 0.02, -1));
    let channels = BTreeMap::from([(
        "tpc".to_string(),
        IonChannelConfig {
            allowed_primary_ion: Some("na".to_string()),
            ..IonChannelConfig::default()
        },
    )]);
    let mut links = IonChannelsLink::new();
    links.add_link("cl", "tpc", None);

    let config = SimulationConfig {
        species: Some(species),
        channels: Some(channels),
        ion_channel_links: Some(links),
        ..SimulationConfig::default()
    };
    assert!(matches!(
        Simulation::new(config).unwrap_err(),
        SimulationError::Binding { .. }
    ));
}

#[test]
fn unaccounted_offset_is_fixed_for_the_whole_run() {
    let mut config = SimulationConfig::default();
    config.simulation.total_time = 0.05;
    config.simulation.time_step = 1e-3;
    let mut simulation = Simulation::new(config).unwrap();
    simulation.run().unwrap();

    // Recompute from the initial configuration; the cached value must
    // still match after 50 integration steps.
    let species = defaults::default_species();
    let charge_concentration: f64 = species
        .values()
        .map(|sp| f64::from(sp.elementary_charge) * sp.init_vesicle_conc)
        .sum();
    let vesicle = simulation.vesicle();
    let expected = vesicle.init_charge / FARADAY
        - charge_concentration * 1000.0 * vesicle.init_volume;
    assert_eq!(simulation.unaccounted_ion_amount().unwrap(), expected);
}

#[test]
fn hydrogen_is_excluded_from_the_volume_update() {
    // A proton-only channel moves hydrogen; the volume must not follow.
    let mut species = single_species("na", 0.15, 0.01, 1);
    species.extend(single_species("h", 7.962143e-5, 1.261915e-4, 1));
    let channels = BTreeMap::from([(
        "hleak".to_string(),
        IonChannelConfig {
            conductance: 1e-6,
            flux_multiplier: -1.0,
            allowed_primary_ion: Some("h".to_string()),
            use_free_hydrogen: true,
            ..IonChannelConfig::default()
        },
    )]);
    let mut links = IonChannelsLink::new();
    links.add_link("h", "hleak", None);

    let mut config = SimulationConfig::default();
    config.simulation.total_time = 0.02;
    config.simulation.time_step = 1e-3;
    config.species = Some(species);
    config.channels = Some(channels);
    config.ion_channel_links = Some(links);

    let mut simulation = Simulation::new(config).unwrap();
    simulation.run().unwrap();

    let hydrogen_amount = simulation.histories().get("h_vesicle_amount").unwrap();
    assert!(hydrogen_amount[0] != *hydrogen_amount.last().unwrap());

    let volume = simulation.histories().get("Vesicle_volume").unwrap();
    for v in volume {
        assert_relative_eq!(*v, volume[0], max_relative = 1e-12);
    }
}

#[test]
fn linked_channel_order_is_preserved_per_species() {
    let mut simulation = Simulation::new(SimulationConfig::default()).unwrap();
    simulation.run().unwrap();

    // The hydrogen species binds its channels in link-map order.
    let hydrogen = simulation.species_named("h").unwrap();
    let names: Vec<&str> = hydrogen
        .channel_indices()
        .iter()
        .map(|&idx| simulation.channels()[idx].display_name())
        .collect();
    assert_eq!(names, ["vatpase", "nhe_h", "hleak", "clc_h"]);
}
