//! Heston stochastic volatility model.
//!
//! - [`HestonParams`]: (v₀, θ, κ, ξ, ρ) with validation and the Feller ratio
//! - [`HestonModel`]: characteristic-function pricer and finite-difference Greeks
//! - [`calibrate_heston`]: bounded Levenberg-Marquardt fit to option prices

pub mod calibration;
pub mod params;
pub mod pricer;

pub use calibration::{
    calibrate_heston, FellerStatus, HestonCalibrationConfig, HestonCalibrationResult, HestonQuote,
    DEFAULT_FELLER_PENALTY, HESTON_PARAMETER_COUNT,
};
pub use params::HestonParams;
pub use pricer::{
    characteristic_function, HestonIntegration, HestonModel, HestonSlice, VarianceSource,
};
