//! Black-Scholes implied volatility inversion.
//!
//! Solves BS(σ) = target with a Newton step on vega, safeguarded by a
//! volatility bracket. Targets outside the no-arbitrage band are rejected
//! before any iteration runs.

use pricer_core::math::solvers::{NewtonBisectionSolver, SolverConfig};
use pricer_core::types::{PricingError, PricingInputs, SolverError};
use serde::{Deserialize, Serialize};

use super::black_scholes::BlackScholes;

/// Settings for [`implied_volatility`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpliedVolConfig {
    /// Root finder tolerance and iteration budget.
    pub solver: SolverConfig,
    /// Lower end of the volatility bracket.
    pub min_vol: f64,
    /// Upper end of the volatility bracket.
    pub max_vol: f64,
}

impl Default for ImpliedVolConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            min_vol: 1e-4,
            max_vol: 5.0,
        }
    }
}

/// Lower and upper no-arbitrage bounds on a European option price.
///
/// Lower bound is the discounted payoff on the forward. Upper bound is the
/// discounted spot for a call and the discounted strike for a put.
pub fn price_bounds(inputs: &PricingInputs) -> (f64, f64) {
    let lower = inputs
        .option_type
        .intrinsic(inputs.forward(), inputs.strike)
        * inputs.discount_factor();
    let upper = if inputs.option_type.sign() > 0.0 {
        inputs.spot * (-inputs.dividend_yield * inputs.time_to_expiry).exp()
    } else {
        inputs.strike * inputs.discount_factor()
    };
    (lower, upper)
}

/// Brenner-Subrahmanyam starting point √(2π/T)·V/S.
fn initial_guess(target: f64, inputs: &PricingInputs) -> f64 {
    (2.0 * std::f64::consts::PI / inputs.time_to_expiry).sqrt() * target / inputs.spot
}

/// Black-Scholes volatility that reproduces `target`.
///
/// The `volatility` field of `inputs` is ignored.
///
/// # Arguments
///
/// * `target` - Observed option price
/// * `inputs` - Contract and market parameters
/// * `config` - Solver settings and volatility bracket
/// * `guess` - Optional starting volatility, clamped into the bracket
///
/// # Errors
///
/// * `PricingError::InvalidInput` - Expired contract, invalid inputs, or a
///   target outside the no-arbitrage band
/// * `PricingError::NotConverged` - The root finder failed within its budget
///
/// # Examples
///
/// ```
/// use pricer_core::types::{OptionType, PricingInputs};
/// use pricer_models::analytical::{implied_volatility, BlackScholes, ImpliedVolConfig};
///
/// let inputs = PricingInputs::new(100.0, 110.0, 0.5, 0.02, 0.0, 0.35, OptionType::Call);
/// let price = BlackScholes.price(&inputs).unwrap();
///
/// let vol = implied_volatility(price, &inputs, &ImpliedVolConfig::default(), None).unwrap();
/// assert!((vol - 0.35).abs() < 1e-8);
/// ```
pub fn implied_volatility(
    target: f64,
    inputs: &PricingInputs,
    config: &ImpliedVolConfig,
    guess: Option<f64>,
) -> Result<f64, PricingError> {
    let floor_inputs = inputs.with_volatility(config.min_vol);
    floor_inputs.validate()?;
    if !target.is_finite() {
        return Err(PricingError::InvalidInput(format!(
            "target price must be finite, got {}",
            target
        )));
    }
    if floor_inputs.is_expired() {
        return Err(PricingError::InvalidInput(
            "implied volatility is undefined at expiry".to_string(),
        ));
    }

    let (lower, upper) = price_bounds(&floor_inputs);
    if target < lower || target >= upper {
        return Err(PricingError::InvalidInput(format!(
            "target price {} outside no-arbitrage bounds [{}, {})",
            target, lower, upper
        )));
    }

    let x0 = guess
        .filter(|g| g.is_finite())
        .unwrap_or_else(|| initial_guess(target, &floor_inputs))
        .clamp(config.min_vol, config.max_vol);

    let objective = |vol: f64| {
        let bumped = floor_inputs.with_volatility(vol);
        (
            BlackScholes::price_unchecked(&bumped) - target,
            BlackScholes::vega_unchecked(&bumped),
        )
    };

    let solver = NewtonBisectionSolver::new(config.solver);
    solver
        .find_root(objective, config.min_vol, config.max_vol, x0)
        .map_err(|err| match err {
            SolverError::MaxIterationsExceeded { iterations } => PricingError::NotConverged {
                method: "implied volatility".to_string(),
                iterations,
                residual: f64::NAN,
            },
            SolverError::NoBracket { a, b } => PricingError::NotConverged {
                method: format!("implied volatility (no root in [{}, {}])", a, b),
                iterations: 0,
                residual: f64::NAN,
            },
            other => PricingError::from(other),
        })
}
