//! The simulation orchestrator: owns every entity and runs the update loop.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::channel::IonChannel;
use crate::config::SimulationConfig;
use crate::constants::{FARADAY, GAS_CONSTANT, MIN_CONCENTRATION, VOLUME_TO_AREA};
use crate::defaults;
use crate::exterior::Exterior;
use crate::flux::{FluxContext, HydrogenFree};
use crate::history::{EntityKind, HistoryStore, Trackable};
use crate::species::IonSpecies;
use crate::vesicle::Vesicle;
use crate::{Result, SimulationError};

const SIMULATION_TRACKED_FIELDS: &[&str] = &["buffer_capacity", "time"];

/// Cooperative cancellation flag for a running simulation.
///
/// Cloneable and cheap; hand a clone to whatever owns the run. The engine
/// checks it at iteration boundaries only, so no partial iteration is ever
/// recorded.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A single-vesicle simulation.
///
/// Owns the vesicle, the exterior, the species and channel arenas and the
/// history store. Construction resolves the link map into arena indices and
/// registers every entity; [`Simulation::run`] then advances the state with
/// a fixed time step, recording one snapshot per iteration.
#[derive(Debug)]
pub struct Simulation {
    display_name: String,
    time_step: f64,
    total_time: f64,
    temperature: f64,
    init_buffer_capacity: f64,
    iter_num: usize,

    time: f64,
    buffer_capacity: f64,
    nernst_coefficient: f64,

    vesicle: Vesicle,
    exterior: Exterior,
    species: Vec<IonSpecies>,
    channels: Vec<IonChannel>,
    /// Channel arena indices in registration (link-resolution) order.
    registered_channels: Vec<usize>,
    /// Arena index of the hydrogen species, when present.
    hydrogen: Option<usize>,

    /// Charge (mol) not represented by the modelled species; fixed at run
    /// start from the initial voltage and geometry.
    unaccounted_ion_amount: Option<f64>,

    histories: HistoryStore,
    cancel: CancelHandle,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let params = config.simulation;
        let iter_num = (params.total_time / params.time_step).floor() as usize;

        let vesicle = Vesicle::new("Vesicle", config.vesicle_params.unwrap_or_default())?;
        let exterior = Exterior::new("Exterior", config.exterior_params.unwrap_or_default());

        let species_configs = config.species.unwrap_or_else(defaults::default_species);
        let channel_configs = config.channels.unwrap_or_else(defaults::default_channels);
        let links = config.ion_channel_links.unwrap_or_else(defaults::default_links);

        // Species/channel collisions are rejected up front, even for
        // channels the link map never binds.
        for name in channel_configs.keys() {
            if species_configs.contains_key(name) {
                return Err(SimulationError::NameConflict {
                    name: name.clone(),
                    existing: EntityKind::IonSpecies.label(),
                    requested: EntityKind::IonChannel.label(),
                });
            }
        }

        let mut histories = HistoryStore::new();
        histories.register_fields(
            &params.display_name,
            EntityKind::Simulation,
            SIMULATION_TRACKED_FIELDS,
        )?;
        histories.register(&vesicle)?;
        histories.register(&exterior)?;

        // Species are registered before channels so that a species/channel
        // name collision is reported as a cross-kind conflict.
        let mut species: Vec<IonSpecies> = Vec::with_capacity(species_configs.len());
        let mut species_index: BTreeMap<String, usize> = BTreeMap::new();
        for (name, species_config) in &species_configs {
            let sp = IonSpecies::new(name.clone(), species_config);
            histories.register(&sp)?;
            species_index.insert(name.clone(), species.len());
            species.push(sp);
        }

        let mut channels: Vec<IonChannel> = Vec::with_capacity(channel_configs.len());
        let mut channel_index: BTreeMap<String, usize> = BTreeMap::new();
        for (name, channel_config) in &channel_configs {
            channel_index.insert(name.clone(), channels.len());
            channels.push(IonChannel::new(name.clone(), channel_config.clone()));
        }

        // Resolve the link map into arena indices. Unknown primary species
        // or channel names skip the link; everything else must bind.
        let mut registered_channels = Vec::new();
        for (species_name, entries) in links.iter() {
            let Some(&primary_idx) = species_index.get(species_name) else {
                warn!(species = %species_name, "link references an unknown species, skipping");
                continue;
            };
            for (channel_name, secondary_name) in entries {
                let Some(&channel_idx) = channel_index.get(channel_name) else {
                    warn!(channel = %channel_name, "link references an unknown channel, skipping");
                    continue;
                };
                let secondary_idx = match secondary_name {
                    Some(name) => Some(*species_index.get(name).ok_or_else(|| {
                        SimulationError::Binding {
                            channel: channel_name.clone(),
                            message: format!("secondary species \"{name}\" not found"),
                        }
                    })?),
                    None => None,
                };
                channels[channel_idx].connect_species(
                    (primary_idx, &species[primary_idx]),
                    secondary_idx.map(|idx| (idx, &species[idx])),
                )?;
                species[primary_idx].channels.push(channel_idx);
                histories.register(&channels[channel_idx])?;
                registered_channels.push(channel_idx);
            }
        }

        let hydrogen = species.iter().position(IonSpecies::is_hydrogen);
        if hydrogen.is_none() {
            let needs_hydrogen = registered_channels
                .iter()
                .find(|&&idx| channels[idx].config.use_free_hydrogen)
                .map(|&idx| channels[idx].display_name().to_string());
            if let Some(channel) = needs_hydrogen {
                return Err(SimulationError::MissingDependency(format!(
                    "channel \"{channel}\" requires free hydrogen, \
                     but the simulation has no hydrogen species"
                )));
            }
        }

        let nernst_coefficient = params.temperature * GAS_CONSTANT / FARADAY;
        debug!(
            species = species.len(),
            channels = registered_channels.len(),
            iterations = iter_num,
            "simulation constructed"
        );

        Ok(Self {
            display_name: params.display_name,
            time_step: params.time_step,
            total_time: params.total_time,
            temperature: params.temperature,
            init_buffer_capacity: params.init_buffer_capacity,
            iter_num,
            time: 0.0,
            buffer_capacity: params.init_buffer_capacity,
            nernst_coefficient,
            vesicle,
            exterior,
            species,
            channels,
            registered_channels,
            hydrogen,
            unaccounted_ion_amount: None,
            histories,
            cancel: CancelHandle::default(),
        })
    }

    /// Run the configured number of iterations.
    pub fn run(&mut self) -> Result<&HistoryStore> {
        self.run_with_progress(|_| {})
    }

    /// Run, reporting progress in percent after each iteration.
    ///
    /// The reported value is monotonically non-decreasing and reaches 100
    /// unless the run is cancelled or fails.
    pub fn run_with_progress<F>(&mut self, mut progress: F) -> Result<&HistoryStore>
    where
        F: FnMut(f64),
    {
        self.set_ion_amounts();
        self.compute_unaccounted_ion_amount();
        debug!(iterations = self.iter_num, "starting run");

        for iteration in 0..self.iter_num {
            if self.cancel.is_cancelled() {
                info!(iteration, "cancellation requested, stopping early");
                break;
            }
            self.one_step()?;
            progress(100.0 * (iteration + 1) as f64 / self.iter_num as f64);
        }
        Ok(&self.histories)
    }

    /// One full iteration: state update, fluxes, snapshot, integration.
    ///
    /// The snapshot is taken after the fluxes are computed and before the
    /// amounts are integrated, so each recorded flux belongs to the state
    /// recorded alongside it.
    fn one_step(&mut self) -> Result<()> {
        debug_assert!(self.unaccounted_ion_amount.is_some());
        self.update_simulation_state()?;
        let ctx = self.flux_context();
        let fluxes = self.compute_fluxes(&ctx)?;
        self.record_snapshot();
        self.update_ion_amounts(&fluxes);
        self.time += self.time_step;
        Ok(())
    }

    /// The fixed update pipeline; each step depends on the previous one.
    fn update_simulation_state(&mut self) -> Result<()> {
        self.update_volume()?;
        self.update_vesicle_concentrations();
        self.update_buffer();
        self.update_area();
        self.update_capacitance();
        self.update_charge();
        self.update_voltage();
        self.update_ph();
        Ok(())
    }

    fn set_ion_amounts(&mut self) {
        for sp in &mut self.species {
            sp.vesicle_amount = sp.vesicle_conc * 1000.0 * self.vesicle.volume;
            sp.amount_clamp_warned = false;
        }
    }

    fn compute_unaccounted_ion_amount(&mut self) {
        let charge_concentration: f64 = self
            .species
            .iter()
            .map(|sp| f64::from(sp.elementary_charge) * sp.init_vesicle_conc)
            .sum();
        self.unaccounted_ion_amount = Some(
            self.vesicle.init_charge / FARADAY
                - charge_concentration * 1000.0 * self.vesicle.init_volume,
        );
    }

    fn update_volume(&mut self) -> Result<()> {
        // Hydrogen is excluded from both sums: the buffered proton pool is
        // microscopic next to the other species and would only add noise.
        let unaccounted = self.unaccounted_ion_amount.unwrap_or(0.0).abs();
        let current: f64 = self
            .species
            .iter()
            .filter(|sp| !sp.is_hydrogen())
            .map(|sp| sp.vesicle_conc)
            .sum();
        let initial: f64 = self
            .species
            .iter()
            .filter(|sp| !sp.is_hydrogen())
            .map(|sp| sp.init_vesicle_conc)
            .sum();

        let volume = self.vesicle.init_volume * (current + unaccounted) / (initial + unaccounted);
        if !(volume > 0.0 && volume.is_finite()) {
            return Err(SimulationError::NumericDomain {
                entity: self.vesicle.display_name().to_string(),
                time: self.time,
                message: format!("volume became non-positive or non-finite: {volume}"),
            });
        }
        self.vesicle.volume = volume;
        Ok(())
    }

    fn update_vesicle_concentrations(&mut self) {
        let volume = self.vesicle.volume;
        for sp in &mut self.species {
            sp.vesicle_conc = sp.vesicle_amount / (1000.0 * volume);
            if sp.vesicle_conc <= 0.0 {
                warn!(
                    species = %sp.display_name(),
                    field = "vesicle_conc",
                    "non-positive concentration, clamping to the minimum threshold"
                );
                sp.vesicle_conc = MIN_CONCENTRATION;
            }
        }
    }

    fn update_buffer(&mut self) {
        self.buffer_capacity =
            self.init_buffer_capacity * self.vesicle.volume / self.vesicle.init_volume;
    }

    fn update_area(&mut self) {
        self.vesicle.area = VOLUME_TO_AREA * self.vesicle.volume.powf(2.0 / 3.0);
    }

    fn update_capacitance(&mut self) {
        self.vesicle.capacitance = self.vesicle.area * self.vesicle.config.specific_capacitance;
    }

    fn update_charge(&mut self) {
        let amount: f64 = self
            .species
            .iter()
            .map(|sp| f64::from(sp.elementary_charge) * sp.vesicle_amount)
            .sum();
        self.vesicle.charge = (amount + self.unaccounted_ion_amount.unwrap_or(0.0)) * FARADAY;
    }

    fn update_voltage(&mut self) {
        self.vesicle.voltage = self.vesicle.charge / self.vesicle.capacitance;
    }

    fn update_ph(&mut self) {
        let Some(h_idx) = self.hydrogen else { return };
        let free_hydrogen = self.species[h_idx].vesicle_conc * self.buffer_capacity;
        if free_hydrogen <= 0.0 {
            warn!(
                field = "pH",
                "free hydrogen concentration is non-positive, falling back to pH 7.0"
            );
            self.vesicle.ph = 7.0;
        } else {
            self.vesicle.ph = -free_hydrogen.log10();
        }
    }

    fn flux_context(&self) -> FluxContext {
        let hydrogen_free = self.hydrogen.map(|idx| {
            let h = &self.species[idx];
            HydrogenFree {
                vesicle: h.vesicle_conc * self.buffer_capacity,
                exterior: h.exterior_conc * self.init_buffer_capacity,
            }
        });
        FluxContext {
            voltage: self.vesicle.voltage,
            ph: self.vesicle.ph,
            area: self.vesicle.area,
            time: self.time,
            nernst_coefficient: self.nernst_coefficient,
            hydrogen_free,
        }
    }

    /// Total flux per species, summed over its channels in link order.
    fn compute_fluxes(&mut self, ctx: &FluxContext) -> Result<Vec<f64>> {
        let Self { species, channels, .. } = self;
        let species: &[IonSpecies] = species;
        let mut fluxes = Vec::with_capacity(species.len());
        for sp in species {
            let mut total = 0.0;
            for &channel_idx in &sp.channels {
                total += channels[channel_idx].compute_flux(species, ctx)?;
            }
            fluxes.push(total);
        }
        Ok(fluxes)
    }

    fn record_snapshot(&mut self) {
        let Self {
            histories,
            display_name,
            buffer_capacity,
            time,
            vesicle,
            exterior,
            species,
            channels,
            registered_channels,
            ..
        } = self;
        histories.append(display_name, SIMULATION_TRACKED_FIELDS, &[*buffer_capacity, *time]);
        histories.append_entity(&*vesicle);
        histories.append_entity(&*exterior);
        for sp in species.iter() {
            histories.append_entity(sp);
        }
        for &channel_idx in registered_channels.iter() {
            histories.append_entity(&channels[channel_idx]);
        }
    }

    fn update_ion_amounts(&mut self, fluxes: &[f64]) {
        let time_step = self.time_step;
        for (sp, flux) in self.species.iter_mut().zip(fluxes) {
            sp.vesicle_amount += flux * time_step;
            if sp.vesicle_amount < 0.0 {
                sp.vesicle_amount = 0.0;
                if !sp.amount_clamp_warned {
                    warn!(
                        species = %sp.display_name(),
                        field = "vesicle_amount",
                        "ion amount fell below zero and was reset to zero"
                    );
                    sp.amount_clamp_warned = true;
                }
            }
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Current simulation time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Number of iterations a full run performs.
    pub fn iterations(&self) -> usize {
        self.iter_num
    }

    pub fn buffer_capacity(&self) -> f64 {
        self.buffer_capacity
    }

    /// RT/F for the configured temperature (V).
    pub fn nernst_coefficient(&self) -> f64 {
        self.nernst_coefficient
    }

    /// The unaccounted charge offset (mol); `None` before the first run.
    pub fn unaccounted_ion_amount(&self) -> Option<f64> {
        self.unaccounted_ion_amount
    }

    pub fn vesicle(&self) -> &Vesicle {
        &self.vesicle
    }

    pub fn exterior(&self) -> &Exterior {
        &self.exterior
    }

    pub fn species(&self) -> &[IonSpecies] {
        &self.species
    }

    pub fn species_named(&self, name: &str) -> Option<&IonSpecies> {
        self.species.iter().find(|sp| sp.display_name() == name)
    }

    pub fn channels(&self) -> &[IonChannel] {
        &self.channels
    }

    pub fn channel_named(&self, name: &str) -> Option<&IonChannel> {
        self.channels.iter().find(|ch| ch.display_name() == name)
    }

    pub fn histories(&self) -> &HistoryStore {
        &self.histories
    }

    /// Clear recorded series, keeping registrations; used before a re-run.
    pub fn flush_histories(&mut self) {
        self.histories.flush();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}
