//! Option type and exercise style.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Call or put.
///
/// # Examples
/// ```
/// use pricer_core::types::OptionType;
///
/// assert_eq!(OptionType::Call.intrinsic(110.0, 100.0), 10.0);
/// assert_eq!(OptionType::Put.intrinsic(110.0, 100.0), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    /// Right to buy at the strike.
    Call,
    /// Right to sell at the strike.
    Put,
}

impl OptionType {
    /// +1 for calls, -1 for puts.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }

    /// Immediate exercise value `max(ω(S - K), 0)`.
    #[inline]
    pub fn intrinsic(self, spot: f64, strike: f64) -> f64 {
        (self.sign() * (spot - strike)).max(0.0)
    }

    /// The opposite option type.
    #[inline]
    pub fn flip(self) -> Self {
        match self {
            OptionType::Call => OptionType::Put,
            OptionType::Put => OptionType::Call,
        }
    }

    /// Returns true when the option is strictly in the money.
    #[inline]
    pub fn is_in_the_money(self, spot: f64, strike: f64) -> bool {
        self.sign() * (spot - strike) > 0.0
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

/// Exercise style of an option contract.
///
/// Only lattice models honour `American`; closed-form and simulation
/// models price the European equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseStyle {
    /// Exercise at expiry only.
    #[default]
    European,
    /// Exercise at any time up to expiry.
    American,
}

impl fmt::Display for ExerciseStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExerciseStyle::European => write!(f, "European"),
            ExerciseStyle::American => write!(f, "American"),
        }
    }
}
