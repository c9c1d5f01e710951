//! Physical constants used throughout the engine.

/// Faraday constant (C/mol)
pub const FARADAY: f64 = 96485.0;

/// Universal gas constant (J/(mol·K))
pub const GAS_CONSTANT: f64 = 8.314;

/// Geometric constant for a sphere, (36π)^(1/3).
///
/// Relates volume to surface area: A = VOLUME_TO_AREA * V^(2/3), which is
/// algebraically identical to A = 4πr² with V = (4/3)πr³.
pub const VOLUME_TO_AREA: f64 = 4.835975862049409;

/// Physiological temperature (K), the default for new simulations.
pub const BODY_TEMPERATURE: f64 = 310.15;

/// Floor applied to vesicle concentrations after recomputation (mol/L).
pub const MIN_CONCENTRATION: f64 = 1e-9;
