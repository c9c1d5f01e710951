//! Ion channel flux laws and their voltage/pH/time gating.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::flux::FluxContext;
use crate::history::{EntityKind, Trackable};
use crate::species::IonSpecies;
use crate::{Result, SimulationError};

/// Channel family; selects the default pH-gating constants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    #[default]
    None,
    Wt,
    Mt,
    Clc,
}

/// Which gating terms apply to a channel's flux.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependenceType {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "voltage")]
    Voltage,
    #[serde(rename = "pH")]
    Ph,
    #[serde(rename = "voltage_and_pH")]
    VoltageAndPh,
    #[serde(rename = "time")]
    Time,
}

/// Configuration for one ion channel.
///
/// The gating parameters are optional; missing values are filled at
/// construction with the defaults of the channel's type (see [`Gate`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IonChannelConfig {
    /// Conductance (S)
    pub conductance: f64,
    pub channel_type: ChannelType,
    pub dependence_type: DependenceType,
    pub voltage_multiplier: f64,
    pub nernst_multiplier: f64,
    /// Offset subtracted from the Nernst term (V)
    pub voltage_shift: f64,
    pub flux_multiplier: f64,
    pub allowed_primary_ion: Option<String>,
    pub allowed_secondary_ion: Option<String>,
    pub primary_exponent: i32,
    pub secondary_exponent: i32,
    /// Overrides RT/F when set (V)
    pub custom_nernst_constant: Option<f64>,
    /// Scale hydrogen concentrations by the buffer capacity in the log term.
    pub use_free_hydrogen: bool,
    pub invert_primary_log_term: bool,
    pub invert_secondary_log_term: bool,
    pub voltage_exponent: Option<f64>,
    pub half_act_voltage: Option<f64>,
    #[serde(rename = "pH_exponent")]
    pub ph_exponent: Option<f64>,
    #[serde(rename = "half_act_pH")]
    pub half_act_ph: Option<f64>,
    pub time_exponent: Option<f64>,
    pub half_act_time: Option<f64>,
}

impl Default for IonChannelConfig {
    fn default() -> Self {
        Self {
            conductance: 1e-7,
            channel_type: ChannelType::None,
            dependence_type: DependenceType::None,
            voltage_multiplier: 1.0,
            nernst_multiplier: 1.0,
            voltage_shift: 0.0,
            flux_multiplier: 1.0,
            allowed_primary_ion: None,
            allowed_secondary_ion: None,
            primary_exponent: 1,
            secondary_exponent: 1,
            custom_nernst_constant: None,
            use_free_hydrogen: false,
            invert_primary_log_term: false,
            invert_secondary_log_term: false,
            voltage_exponent: None,
            half_act_voltage: None,
            ph_exponent: None,
            half_act_ph: None,
            time_exponent: None,
            half_act_time: None,
        }
    }
}

/// A resolved sigmoid gate: 1 / (1 + exp(exponent * (x - half_act))).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gate {
    pub exponent: f64,
    pub half_act: f64,
}

impl Gate {
    /// Default pH gate for a channel type.
    fn ph_default(channel_type: ChannelType) -> Self {
        match channel_type {
            ChannelType::Wt => Gate { exponent: 3.0, half_act: 5.4 },
            ChannelType::Mt => Gate { exponent: 1.0, half_act: 7.4 },
            ChannelType::Clc => Gate { exponent: -1.5, half_act: 5.5 },
            ChannelType::None => Gate { exponent: 3.0, half_act: 5.4 },
        }
    }

    fn voltage_default() -> Self {
        Gate { exponent: 80.0, half_act: -0.04 }
    }

    fn time_default() -> Self {
        Gate { exponent: 0.0, half_act: 0.0 }
    }
}

/// Dependence resolved at construction: each variant carries exactly the
/// gates it needs, so the flux path never consults unset parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dependence {
    None,
    Voltage(Gate),
    Ph(Gate),
    VoltageAndPh { voltage: Gate, ph: Gate },
    Time(Gate),
}

impl Dependence {
    fn resolve(config: &IonChannelConfig) -> Self {
        let ph_gate = || Gate {
            exponent: config
                .ph_exponent
                .unwrap_or_else(|| Gate::ph_default(config.channel_type).exponent),
            half_act: config
                .half_act_ph
                .unwrap_or_else(|| Gate::ph_default(config.channel_type).half_act),
        };
        let voltage_gate = || Gate {
            exponent: config.voltage_exponent.unwrap_or_else(|| Gate::voltage_default().exponent),
            half_act: config.half_act_voltage.unwrap_or_else(|| Gate::voltage_default().half_act),
        };
        let time_gate = || Gate {
            exponent: config.time_exponent.unwrap_or_else(|| Gate::time_default().exponent),
            half_act: config.half_act_time.unwrap_or_else(|| Gate::time_default().half_act),
        };

        match config.dependence_type {
            DependenceType::None => Dependence::None,
            DependenceType::Voltage => Dependence::Voltage(voltage_gate()),
            DependenceType::Ph => Dependence::Ph(ph_gate()),
            DependenceType::VoltageAndPh => Dependence::VoltageAndPh {
                voltage: voltage_gate(),
                ph: ph_gate(),
            },
            DependenceType::Time => Dependence::Time(time_gate()),
        }
    }
}

/// An ion channel bound to one or two species.
///
/// The `primary`/`secondary` fields are indices into the species arena owned
/// by the simulation; they are filled once when the link map is resolved and
/// never change afterwards.
#[derive(Debug, Clone)]
pub struct IonChannel {
    display_name: String,
    pub config: IonChannelConfig,
    dependence: Dependence,

    pub(crate) primary: Option<usize>,
    pub(crate) secondary: Option<usize>,

    /// Last computed flux (mol/s, positive into the vesicle)
    pub flux: f64,
    /// Last computed Nernst-like driving term (V)
    pub nernst_potential: f64,
    pub ph_dependence: f64,
    pub voltage_dependence: f64,
    pub time_dependence: f64,
}

impl IonChannel {
    pub fn new(display_name: impl Into<String>, config: IonChannelConfig) -> Self {
        let dependence = Dependence::resolve(&config);
        Self {
            display_name: display_name.into(),
            config,
            dependence,
            primary: None,
            secondary: None,
            flux: 0.0,
            nernst_potential: 0.0,
            ph_dependence: 1.0,
            voltage_dependence: 1.0,
            time_dependence: 1.0,
        }
    }

    pub fn dependence(&self) -> Dependence {
        self.dependence
    }

    /// Arena index of the bound primary species, once linked.
    pub fn primary_index(&self) -> Option<usize> {
        self.primary
    }

    pub fn secondary_index(&self) -> Option<usize> {
        self.secondary
    }

    /// Bind the channel to its species, order-insensitively.
    ///
    /// With no secondary, the single species must match
    /// `allowed_primary_ion`. With a secondary, the pair must match
    /// {allowed_primary, allowed_secondary} in either order; the channel
    /// stores them sorted so `primary` always names `allowed_primary_ion`.
    pub(crate) fn connect_species(
        &mut self,
        primary: (usize, &IonSpecies),
        secondary: Option<(usize, &IonSpecies)>,
    ) -> Result<()> {
        let allowed_primary = self.config.allowed_primary_ion.as_deref().ok_or_else(|| {
            SimulationError::Binding {
                channel: self.display_name.clone(),
                message: "channel has no allowed primary ion".into(),
            }
        })?;

        match (secondary, self.config.allowed_secondary_ion.as_deref()) {
            (None, None) => {
                if primary.1.display_name() != allowed_primary {
                    return Err(SimulationError::Binding {
                        channel: self.display_name.clone(),
                        message: format!(
                            "only works with primary ion \"{allowed_primary}\", got \"{}\"",
                            primary.1.display_name()
                        ),
                    });
                }
                self.primary = Some(primary.0);
                self.secondary = None;
            }
            (None, Some(allowed_secondary)) => {
                return Err(SimulationError::Binding {
                    channel: self.display_name.clone(),
                    message: format!(
                        "requires a secondary ion species \"{allowed_secondary}\""
                    ),
                });
            }
            (Some(_), None) => {
                return Err(SimulationError::Binding {
                    channel: self.display_name.clone(),
                    message: "does not accept a secondary ion species".into(),
                });
            }
            (Some(sec), Some(allowed_secondary)) => {
                let (p_name, s_name) = (primary.1.display_name(), sec.1.display_name());
                if p_name == allowed_primary && s_name == allowed_secondary {
                    self.primary = Some(primary.0);
                    self.secondary = Some(sec.0);
                } else if p_name == allowed_secondary && s_name == allowed_primary {
                    self.primary = Some(sec.0);
                    self.secondary = Some(primary.0);
                } else {
                    return Err(SimulationError::Binding {
                        channel: self.display_name.clone(),
                        message: format!(
                            "requires ions \"{allowed_primary}\" and \"{allowed_secondary}\", \
                             got \"{p_name}\" and \"{s_name}\""
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Exterior/vesicle concentrations of one bound ion, raised to its
    /// exponent, substituting free [H⁺] when the channel opts in.
    fn raised_concentrations(
        &self,
        species: &IonSpecies,
        exponent: i32,
        ctx: &FluxContext,
    ) -> Result<(f64, f64)> {
        let (exterior, vesicle) = if self.config.use_free_hydrogen && species.is_hydrogen() {
            let free = ctx.hydrogen_free.ok_or_else(|| {
                SimulationError::MissingDependency(format!(
                    "channel \"{}\" requires free hydrogen concentrations, \
                     but the simulation has no hydrogen species",
                    self.display_name
                ))
            })?;
            (free.exterior, free.vesicle)
        } else {
            (species.exterior_conc, species.vesicle_conc)
        };

        let exterior_raised = exterior.powi(exponent);
        let vesicle_raised = vesicle.powi(exponent);
        if !(exterior_raised > 0.0 && exterior_raised.is_finite())
            || !(vesicle_raised > 0.0 && vesicle_raised.is_finite())
        {
            return Err(SimulationError::NumericDomain {
                entity: species.display_name().to_string(),
                time: ctx.time,
                message: format!(
                    "concentrations must be positive in the log term of channel \"{}\": \
                     exterior = {exterior}, vesicle = {vesicle}, exponent = {exponent}",
                    self.display_name
                ),
            });
        }
        Ok((exterior_raised, vesicle_raised))
    }

    /// Assemble the dimensionless log-term argument from the bound ions.
    fn compute_log_term(&self, species: &[IonSpecies], ctx: &FluxContext) -> Result<f64> {
        let primary = &species[self.primary.ok_or_else(|| SimulationError::Binding {
            channel: self.display_name.clone(),
            message: "flux requested before the channel was linked".into(),
        })?];

        let (exterior_primary, vesicle_primary) =
            self.raised_concentrations(primary, self.config.primary_exponent, ctx)?;
        let mut log_term = if self.config.invert_primary_log_term {
            vesicle_primary / exterior_primary
        } else {
            exterior_primary / vesicle_primary
        };

        if let Some(secondary_idx) = self.secondary {
            let secondary = &species[secondary_idx];
            let (exterior_secondary, vesicle_secondary) =
                self.raised_concentrations(secondary, self.config.secondary_exponent, ctx)?;
            log_term *= if self.config.invert_secondary_log_term {
                exterior_secondary / vesicle_secondary
            } else {
                vesicle_secondary / exterior_secondary
            };
        }

        if !(log_term > 0.0 && log_term.is_finite()) {
            return Err(SimulationError::NumericDomain {
                entity: self.display_name.clone(),
                time: ctx.time,
                message: format!("log term must be positive and finite, got {log_term}"),
            });
        }
        Ok(log_term.ln())
    }

    fn voltage_gate_value(&self, gate: Gate, voltage: f64) -> f64 {
        // exp overflows past ~709; clamp the argument's voltage range.
        let limit = 709.0 / gate.exponent + gate.half_act;
        let v = if voltage > limit {
            warn!(
                channel = %self.display_name,
                voltage,
                limit,
                "voltage exceeds the safe gating range, clamping"
            );
            limit
        } else if voltage < -limit {
            warn!(
                channel = %self.display_name,
                voltage,
                limit = -limit,
                "voltage below the safe gating range, clamping"
            );
            -limit
        } else {
            voltage
        };
        1.0 / (1.0 + (gate.exponent * (v - gate.half_act)).exp())
    }

    fn ph_gate_value(gate: Gate, ph: f64) -> f64 {
        1.0 / (1.0 + (gate.exponent * (ph - gate.half_act)).exp())
    }

    fn time_gate_value(gate: Gate, time: f64) -> f64 {
        // The time gate rises with time: the argument is (half_act - t).
        1.0 / (1.0 + (gate.exponent * (gate.half_act - time)).exp())
    }

    /// Compute the flux through this channel (mol/s, positive inward).
    ///
    /// Updates the recorded `flux`, `nernst_potential` and gating values.
    pub fn compute_flux(&mut self, species: &[IonSpecies], ctx: &FluxContext) -> Result<f64> {
        let log_term = self.compute_log_term(species, ctx)?;
        let nernst_coefficient = self
            .config
            .custom_nernst_constant
            .unwrap_or(ctx.nernst_coefficient);

        self.nernst_potential = self.config.voltage_multiplier * ctx.voltage
            + self.config.nernst_multiplier * nernst_coefficient * log_term
            - self.config.voltage_shift;

        let mut flux =
            self.config.flux_multiplier * self.nernst_potential * self.config.conductance * ctx.area;

        self.voltage_dependence = 1.0;
        self.ph_dependence = 1.0;
        self.time_dependence = 1.0;
        match self.dependence {
            Dependence::None => {}
            Dependence::Voltage(gate) => {
                self.voltage_dependence = self.voltage_gate_value(gate, ctx.voltage);
                flux *= self.voltage_dependence;
            }
            Dependence::Ph(gate) => {
                self.ph_dependence = Self::ph_gate_value(gate, ctx.ph);
                flux *= self.ph_dependence;
            }
            Dependence::VoltageAndPh { voltage, ph } => {
                self.voltage_dependence = self.voltage_gate_value(voltage, ctx.voltage);
                flux *= self.voltage_dependence;
                self.ph_dependence = Self::ph_gate_value(ph, ctx.ph);
                flux *= self.ph_dependence;
            }
            Dependence::Time(gate) => {
                self.time_dependence = Self::time_gate_value(gate, ctx.time);
                flux *= self.time_dependence;
            }
        }

        self.flux = flux;
        Ok(flux)
    }
}

impl Trackable for IonChannel {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn kind(&self) -> EntityKind {
        EntityKind::IonChannel
    }

    fn tracked_fields(&self) -> &'static [&'static str] {
        match self.dependence {
            Dependence::None => &["flux", "nernst_potential"],
            Dependence::Voltage(_) => &["flux", "nernst_potential", "voltage_dependence"],
            Dependence::Ph(_) => &["flux", "nernst_potential", "pH_dependence"],
            Dependence::VoltageAndPh { .. } => {
                &["flux", "nernst_potential", "pH_dependence", "voltage_dependence"]
            }
            Dependence::Time(_) => &["flux", "nernst_potential", "time_dependence"],
        }
    }

    fn snapshot_values(&self) -> Vec<f64> {
        let mut values = vec![self.flux, self.nernst_potential];
        match self.dependence {
            Dependence::None => {}
            Dependence::Voltage(_) => values.push(self.voltage_dependence),
            Dependence::Ph(_) => values.push(self.ph_dependence),
            Dependence::VoltageAndPh { .. } => {
                values.push(self.ph_dependence);
                values.push(self.voltage_dependence);
            }
            Dependence::Time(_) => values.push(self.time_dependence),
        }
        values
    }
}
