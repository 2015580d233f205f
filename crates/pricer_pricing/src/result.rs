//! Pricing result type.
//!
//! Provides [`PricingResult`], the immutable output of one model
//! evaluation: price, model identifier, the full [`GreeksSet`], Monte Carlo
//! error statistics when simulation was used, and a flag marking values
//! produced by the Black-Scholes fallback.

use std::fmt;

use pricer_core::types::GreeksSet;
use serde::{Deserialize, Serialize};

/// Identifier of a pricing model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    /// Closed-form Black-Scholes-Merton.
    BlackScholes,
    /// Recombining binomial lattice.
    BinomialTree,
    /// Monte Carlo simulation.
    MonteCarlo,
    /// Heston characteristic-function pricer.
    Heston,
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelId::BlackScholes => "black_scholes",
            ModelId::BinomialTree => "binomial_tree",
            ModelId::MonteCarlo => "monte_carlo",
            ModelId::Heston => "heston",
        };
        f.write_str(name)
    }
}

/// Result of pricing one contract.
///
/// # Examples
///
/// ```rust
/// use pricer_core::types::GreeksSet;
/// use pricer_pricing::{ModelId, PricingResult};
///
/// let result = PricingResult {
///     price: 10.5,
///     model: ModelId::MonteCarlo,
///     greeks: GreeksSet::zero(),
///     std_error: Some(0.05),
///     confidence_interval: Some((10.402, 10.598)),
///     fallback: false,
/// };
///
/// assert!((result.confidence_95().unwrap() - 0.098).abs() < 1e-12);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    /// Present value of the contract.
    pub price: f64,
    /// Model that produced the value.
    pub model: ModelId,
    /// Sensitivities at the priced point.
    pub greeks: GreeksSet,
    /// Standard error of a simulated price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_error: Option<f64>,
    /// 95% confidence interval of a simulated price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_interval: Option<(f64, f64)>,
    /// True when the value came from the Black-Scholes fallback.
    #[serde(default)]
    pub fallback: bool,
}

impl PricingResult {
    /// Result of a deterministic model.
    pub fn exact(price: f64, model: ModelId, greeks: GreeksSet) -> Self {
        Self {
            price,
            model,
            greeks,
            std_error: None,
            confidence_interval: None,
            fallback: false,
        }
    }

    /// Returns the 95% confidence interval half-width, if simulated.
    #[inline]
    pub fn confidence_95(&self) -> Option<f64> {
        self.std_error.map(|se| crate::mc::Z_95 * se)
    }
}
