//! Recombining binomial lattice for European and American options.
//!
//! Two parameterisations are available:
//!
//! - **Cox-Ross-Rubinstein**: u = e^(σ√Δt), d = 1/u. Oscillates in N, so
//!   convergence is O(1/N).
//! - **Leisen-Reimer**: node probabilities from the Peizer-Pratt inversion
//!   of d₁ and d₂. Requires an odd step count and converges O(1/N²) for
//!   European payoffs, which is why it is the default.
//!
//! Node prices are formed in log space so deep lattices do not overflow.

use pricer_core::types::{ExerciseStyle, GreeksSet, PricingError, PricingInputs};
use serde::{Deserialize, Serialize};

use crate::analytical::{d1_d2, MIN_TOTAL_VOL};
use crate::greeks::{finite_difference_greeks, FiniteDifferenceBumps};

/// Default number of time steps.
pub const DEFAULT_STEPS: usize = 201;

/// Lattice parameterisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatticeScheme {
    /// Cox-Ross-Rubinstein (1979).
    CoxRossRubinstein,
    /// Leisen-Reimer (1996) with Peizer-Pratt method 2 inversion.
    #[default]
    LeisenReimer,
}

/// Binomial lattice pricer.
///
/// # Examples
///
/// ```
/// use pricer_core::types::{ExerciseStyle, OptionType, PricingInputs};
/// use pricer_models::lattice::BinomialTree;
///
/// let put = PricingInputs::new(100.0, 100.0, 1.0, 0.05, 0.0, 0.2, OptionType::Put);
/// let tree = BinomialTree::new(201);
///
/// let european = tree.price(&put).unwrap();
/// let american = tree.price(&put.with_exercise(ExerciseStyle::American)).unwrap();
/// assert!(american > european);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinomialTree {
    /// Number of time steps. Leisen-Reimer rounds even counts up by one.
    pub steps: usize,
    /// Lattice parameterisation.
    pub scheme: LatticeScheme,
    /// Bump widths for Greeks.
    pub bumps: FiniteDifferenceBumps,
}

impl Default for BinomialTree {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS)
    }
}

/// One-step lattice parameters.
#[derive(Debug, Clone, Copy)]
struct StepParams {
    ln_up: f64,
    ln_down: f64,
    p_up: f64,
    discount: f64,
}

impl BinomialTree {
    /// Leisen-Reimer lattice with `steps` time steps.
    pub fn new(steps: usize) -> Self {
        Self {
            steps,
            scheme: LatticeScheme::default(),
            bumps: FiniteDifferenceBumps::default(),
        }
    }

    /// Sets the lattice scheme.
    pub fn with_scheme(mut self, scheme: LatticeScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets the Greeks bump widths.
    pub fn with_bumps(mut self, bumps: FiniteDifferenceBumps) -> Self {
        self.bumps = bumps;
        self
    }

    /// Step count actually used by the lattice.
    pub fn effective_steps(&self) -> usize {
        match self.scheme {
            LatticeScheme::LeisenReimer if self.steps % 2 == 0 => self.steps + 1,
            _ => self.steps,
        }
    }

    /// Lattice price.
    ///
    /// Expired contracts return intrinsic value and zero volatility returns
    /// the deterministic forward payoff, both without building a lattice.
    ///
    /// # Errors
    ///
    /// * `PricingError::InvalidInput` - Invalid inputs or zero steps
    /// * `PricingError::NumericalInstability` - Non-finite lattice value
    pub fn price(&self, inputs: &PricingInputs) -> Result<f64, PricingError> {
        inputs.validate()?;
        if self.steps == 0 {
            return Err(PricingError::InvalidInput(
                "binomial tree needs at least one step".to_string(),
            ));
        }
        if inputs.is_expired() {
            return Ok(inputs.intrinsic());
        }
        if inputs.volatility * inputs.time_to_expiry.sqrt() < MIN_TOTAL_VOL {
            return Ok(inputs.deterministic_value());
        }

        let n = self.effective_steps();
        let params = self.step_params(inputs, n);
        PricingError::check_finite(roll_back(inputs, n, &params), "binomial price")
    }

    /// Greeks by centred finite differences on the lattice.
    pub fn greeks(&self, inputs: &PricingInputs) -> Result<GreeksSet, PricingError> {
        finite_difference_greeks(|bumped| self.price(bumped), inputs, &self.bumps)
    }

    fn step_params(&self, inputs: &PricingInputs, n: usize) -> StepParams {
        let dt = inputs.time_to_expiry / n as f64;
        let carry = inputs.rate - inputs.dividend_yield;
        let growth = (carry * dt).exp();
        let discount = (-inputs.rate * dt).exp();

        if self.scheme == LatticeScheme::LeisenReimer {
            let (d1, d2) = d1_d2(inputs);
            let p_prime = peizer_pratt(d1, n);
            let p = peizer_pratt(d2, n);
            if p > 0.0 && p < 1.0 && p_prime > 0.0 && p_prime < 1.0 {
                let up = growth * p_prime / p;
                let down = (growth - p * up) / (1.0 - p);
                if down > 0.0 && up > down {
                    return StepParams {
                        ln_up: up.ln(),
                        ln_down: down.ln(),
                        p_up: p,
                        discount,
                    };
                }
            }
        }

        let sigma_sqrt_dt = inputs.volatility * dt.sqrt();
        let up = sigma_sqrt_dt.exp();
        let down = 1.0 / up;
        let p = (growth - down) / (up - down);
        if (0.0..=1.0).contains(&p) {
            return StepParams {
                ln_up: sigma_sqrt_dt,
                ln_down: -sigma_sqrt_dt,
                p_up: p,
                discount,
            };
        }

        // Carry dominates volatility: centre the lattice on the drift.
        let drift = (carry - 0.5 * inputs.volatility * inputs.volatility) * dt;
        let ln_up = drift + sigma_sqrt_dt;
        let ln_down = drift - sigma_sqrt_dt;
        StepParams {
            ln_up,
            ln_down,
            p_up: (growth - ln_down.exp()) / (ln_up.exp() - ln_down.exp()),
            discount,
        }
    }
}

/// Peizer-Pratt method 2 inversion of the normal CDF on an `n`-step lattice.
fn peizer_pratt(z: f64, n: usize) -> f64 {
    let n = n as f64;
    let ratio = z / (n + 1.0 / 3.0 + 0.1 / (n + 1.0));
    let root = (1.0 - (-ratio * ratio * (n + 1.0 / 6.0)).exp()).sqrt();
    0.5 + 0.5 * z.signum() * root
}

fn roll_back(inputs: &PricingInputs, n: usize, params: &StepParams) -> f64 {
    let ln_spot = inputs.spot.ln();
    let node_spot = |step: usize, ups: usize| {
        (ln_spot + ups as f64 * params.ln_up + (step - ups) as f64 * params.ln_down).exp()
    };
    let payoff = |spot: f64| inputs.option_type.intrinsic(spot, inputs.strike);
    let american = inputs.exercise == ExerciseStyle::American;

    let mut values: Vec<f64> = (0..=n).map(|j| payoff(node_spot(n, j))).collect();
    let p_up = params.p_up;
    let p_down = 1.0 - p_up;

    for step in (0..n).rev() {
        for j in 0..=step {
            let continuation = params.discount * (p_up * values[j + 1] + p_down * values[j]);
            values[j] = if american {
                continuation.max(payoff(node_spot(step, j)))
            } else {
                continuation
            };
        }
    }
    values[0]
}
