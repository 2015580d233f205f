//! Core financial types.
//!
//! This module provides:
//! - `option`: `OptionType` and `ExerciseStyle`
//! - `greeks`: the additive `GreeksSet`
//! - `inputs`: `PricingInputs` shared by every pricing model
//! - `time`: Actual/365 Fixed day counting
//! - `error`: Structured error types for pricing, interpolation, solver and calibration operations

pub mod error;
pub mod greeks;
pub mod inputs;
pub mod option;
pub mod time;

pub use error::{
    CalibrationError, CalibrationErrorKind, InterpolationError, PricingError, SolverError,
};
pub use greeks::GreeksSet;
pub use inputs::{PricingInputs, EXPIRY_EPSILON};
pub use option::{ExerciseStyle, OptionType};
pub use time::{time_to_expiry, year_fraction, DAYS_PER_YEAR, TRADING_DAYS_PER_YEAR};
