//! Electrochemical simulation of a single lipid vesicle.
//!
//! This crate models a well-mixed spherical vesicle coupled to an exterior
//! bath through a configurable network of ion channels. A fixed-time-step
//! integrator advances volume, membrane voltage, luminal pH and the amounts
//! of every ionic species, recording a time series of each tracked quantity.
//!
//! # Features
//!
//! - Nernst-like channel flux laws with per-ion exponents and inversions
//! - Sigmoidal voltage, pH and time gating with per-family defaults
//! - Buffered proton pool: pH and free [H⁺] derived from a buffer capacity
//!   that scales with vesicle volume
//! - Charge bookkeeping against a fixed "unaccounted ion" offset so the
//!   initial state is electrically consistent
//! - History store with one append-only series per tracked field
//!
//! The crate is a library: a [`SimulationConfig`] goes in, a
//! [`HistoryStore`] comes out.

pub mod channel;
pub mod config;
pub mod constants;
pub mod defaults;
pub mod exterior;
pub mod flux;
pub mod history;
pub mod link;
pub mod simulation;
pub mod species;
pub mod vesicle;

pub use channel::{ChannelType, DependenceType, IonChannel, IonChannelConfig};
pub use config::{SimulationConfig, SimulationParams};
pub use exterior::{Exterior, ExteriorConfig};
pub use flux::{FluxContext, HydrogenFree};
pub use history::{EntityKind, HistoryStore, Trackable};
pub use link::IonChannelsLink;
pub use simulation::{CancelHandle, Simulation};
pub use species::{IonSpecies, IonSpeciesConfig, HYDROGEN_SPECIES};
pub use vesicle::{Vesicle, VesicleConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    ConfigValidation(String),

    #[error(
        "name conflict: \"{name}\" is already registered as {existing}, \
         cannot register a {requested} under the same name"
    )]
    NameConflict {
        name: String,
        existing: &'static str,
        requested: &'static str,
    },

    #[error("binding error for channel \"{channel}\": {message}")]
    Binding { channel: String, message: String },

    #[error("missing dependency: {0}")]
    MissingDependency(String),

    #[error("numeric domain error at t = {time} s ({entity}): {message}")]
    NumericDomain {
        entity: String,
        time: f64,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, SimulationError>;
