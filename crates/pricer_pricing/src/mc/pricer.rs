//! Monte Carlo pricing engine.
//!
//! # Overview
//!
//! The [`MonteCarloPricer`] coordinates:
//! 1. Block partitioning of the requested paths
//! 2. Per-block random streams (via [`PricerRng::for_stream`])
//! 3. Terminal simulation (via [`GbmParams`] or [`HestonPathParams`])
//! 4. Antithetic pairing and the terminal-asset control variate
//! 5. Ordered reduction of block moments into one estimate
//!
//! # Reproducibility
//!
//! Paths are split into blocks of `block_size`. Block `k` always draws from
//! stream `(seed, k)` and block moments are merged in block order after the
//! parallel map, so a fixed seed gives bit-identical output on any number
//! of worker threads.

use pricer_core::types::{GreeksSet, PricingError, PricingInputs};
use pricer_models::analytical::MIN_TOTAL_VOL;
use pricer_models::greeks::finite_difference_greeks;
use pricer_models::heston::VarianceSource;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::config::{Dynamics, MonteCarloConfig};
use super::error::ConfigError;
use super::paths::{GbmParams, HestonPathParams};
use crate::rng::PricerRng;

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.96;

/// Monte Carlo price estimate.
///
/// # Examples
///
/// ```rust
/// use pricer_pricing::mc::McEstimate;
///
/// let estimate = McEstimate {
///     price: 10.5,
///     std_error: 0.05,
///     confidence_interval: (10.402, 10.598),
///     n_paths: 100_000,
/// };
/// assert!((estimate.half_width() - 0.098).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct McEstimate {
    /// Present value estimate.
    pub price: f64,
    /// Standard error of the estimate.
    pub std_error: f64,
    /// 95% confidence interval (lower, upper).
    pub confidence_interval: (f64, f64),
    /// Number of simulated paths, antithetic partners included.
    pub n_paths: usize,
}

impl McEstimate {
    /// An estimate known without simulation.
    fn exact(price: f64) -> Self {
        Self {
            price,
            std_error: 0.0,
            confidence_interval: (price, price),
            n_paths: 0,
        }
    }

    /// Returns the 95% confidence interval half-width.
    #[inline]
    pub fn half_width(&self) -> f64 {
        Z_95 * self.std_error
    }
}

/// Running bivariate moments of (payoff, control).
///
/// Merged with the pairwise update of Chan, Golub and LeVeque.
#[derive(Clone, Copy, Debug, Default)]
struct Moments {
    n: f64,
    mean_y: f64,
    mean_x: f64,
    m2_y: f64,
    m2_x: f64,
    c_xy: f64,
}

impl Moments {
    #[inline]
    fn push(&mut self, y: f64, x: f64) {
        self.n += 1.0;
        let dy = y - self.mean_y;
        let dx = x - self.mean_x;
        self.mean_y += dy / self.n;
        self.mean_x += dx / self.n;
        self.m2_y += dy * (y - self.mean_y);
        self.m2_x += dx * (x - self.mean_x);
        self.c_xy += dx * (y - self.mean_y);
    }

    fn merge(self, other: Self) -> Self {
        if self.n == 0.0 {
            return other;
        }
        if other.n == 0.0 {
            return self;
        }
        let n = self.n + other.n;
        let dy = other.mean_y - self.mean_y;
        let dx = other.mean_x - self.mean_x;
        let w = self.n * other.n / n;
        Self {
            n,
            mean_y: self.mean_y + dy * other.n / n,
            mean_x: self.mean_x + dx * other.n / n,
            m2_y: self.m2_y + other.m2_y + dy * dy * w,
            m2_x: self.m2_x + other.m2_x + dx * dx * w,
            c_xy: self.c_xy + other.c_xy + dx * dy * w,
        }
    }
}

/// Resolved per-contract dynamics.
#[derive(Clone, Copy, Debug)]
enum Simulation {
    Gbm(GbmParams),
    Heston(HestonPathParams),
}

impl Simulation {
    fn normals_per_path(&self, n_steps: usize) -> usize {
        match self {
            Simulation::Gbm(_) => GbmParams::normals_per_path(n_steps),
            Simulation::Heston(_) => HestonPathParams::normals_per_path(n_steps),
        }
    }

    #[inline]
    fn terminal(&self, normals: &[f64], sign: f64) -> f64 {
        match self {
            Simulation::Gbm(p) => p.terminal(normals, sign),
            Simulation::Heston(p) => p.terminal(normals, sign),
        }
    }
}

/// Monte Carlo pricing engine.
///
/// American contracts are priced as their European equivalent.
///
/// # Examples
///
/// ```rust
/// use pricer_core::types::{OptionType, PricingInputs};
/// use pricer_pricing::mc::{MonteCarloConfig, MonteCarloPricer};
///
/// let config = MonteCarloConfig::builder()
///     .n_paths(20_000)
///     .seed(42)
///     .build()
///     .unwrap();
/// let pricer = MonteCarloPricer::new(config).unwrap();
///
/// let inputs = PricingInputs::new(100.0, 100.0, 1.0, 0.05, 0.0, 0.2, OptionType::Call);
/// let estimate = pricer.estimate(&inputs).unwrap();
/// assert!((estimate.price - 10.4506).abs() < 4.0 * estimate.std_error + 1e-6);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MonteCarloPricer {
    config: MonteCarloConfig,
}

impl MonteCarloPricer {
    /// Creates a new pricer with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(config: MonteCarloConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns a reference to the configuration.
    #[inline]
    pub fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// Price estimate only.
    ///
    /// # Errors
    ///
    /// See [`estimate`](Self::estimate).
    pub fn price(&self, inputs: &PricingInputs) -> Result<f64, PricingError> {
        self.estimate(inputs).map(|estimate| estimate.price)
    }

    /// Prices a contract by simulation.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Contract and market state
    ///
    /// # Returns
    ///
    /// The estimate with its standard error and 95% confidence interval.
    /// Expired contracts return intrinsic value, and a vanishing total
    /// volatility under GBM returns the discounted forward payoff, both
    /// with zero standard error.
    ///
    /// # Errors
    ///
    /// * `PricingError::InvalidInput` - Invalid inputs
    /// * `PricingError::NotConverged` - The CI half-width relative to the
    ///   price exceeds the configured `max_relative_error`
    /// * `PricingError::NumericalInstability` - Non-finite estimate
    pub fn estimate(&self, inputs: &PricingInputs) -> Result<McEstimate, PricingError> {
        let estimate = self.estimate_ungated(inputs)?;
        if let Some(limit) = self.config.max_relative_error() {
            let half_width = estimate.half_width();
            let relative = if half_width == 0.0 {
                0.0
            } else if estimate.price > 0.0 {
                half_width / estimate.price
            } else {
                f64::INFINITY
            };
            if relative > limit {
                tracing::debug!(
                    price = estimate.price,
                    std_error = estimate.std_error,
                    relative,
                    limit,
                    "Monte Carlo confidence interval too wide"
                );
                return Err(PricingError::NotConverged {
                    method: "monte carlo".to_string(),
                    iterations: estimate.n_paths,
                    residual: relative,
                });
            }
        }
        Ok(estimate)
    }

    /// Finite-difference Greeks with common random numbers.
    ///
    /// Every bumped revaluation reuses the configured seed. The CI gate is
    /// not applied to the bumped prices. Under calibrated Heston dynamics
    /// the volatility is pinned to √v₀ so that vega measures sensitivity
    /// to the initial variance.
    ///
    /// # Errors
    ///
    /// Propagates input validation and numerical failures.
    pub fn greeks(&self, inputs: &PricingInputs) -> Result<GreeksSet, PricingError> {
        let (engine, base) = match self.config.dynamics() {
            Dynamics::Heston {
                params,
                variance_source: VarianceSource::Calibrated,
            } => (
                self.config.with_dynamics(Dynamics::Heston {
                    params: *params,
                    variance_source: VarianceSource::InputVolatility,
                }),
                inputs.with_volatility(params.v0.sqrt()),
            ),
            _ => (self.config, *inputs),
        };
        let engine = Self { config: engine };
        finite_difference_greeks(
            |bumped| engine.estimate_ungated(bumped).map(|e| e.price),
            &base,
            self.config.bumps(),
        )
    }

    fn estimate_ungated(&self, inputs: &PricingInputs) -> Result<McEstimate, PricingError> {
        inputs.validate()?;
        if inputs.is_expired() {
            return Ok(McEstimate::exact(inputs.intrinsic()));
        }
        let tiny_vol = inputs.volatility * inputs.time_to_expiry.sqrt() < MIN_TOTAL_VOL;

        let simulation = match self.config.dynamics() {
            Dynamics::Gbm => {
                if tiny_vol {
                    return Ok(McEstimate::exact(inputs.deterministic_value()));
                }
                Simulation::Gbm(GbmParams {
                    spot: inputs.spot,
                    rate: inputs.rate,
                    dividend_yield: inputs.dividend_yield,
                    volatility: inputs.volatility,
                    maturity: inputs.time_to_expiry,
                })
            }
            Dynamics::Heston {
                params,
                variance_source,
            } => {
                params.validate()?;
                let params = match variance_source {
                    VarianceSource::InputVolatility => {
                        if tiny_vol {
                            return Ok(McEstimate::exact(inputs.deterministic_value()));
                        }
                        params.with_v0(inputs.volatility * inputs.volatility)
                    }
                    VarianceSource::Calibrated => *params,
                };
                Simulation::Heston(HestonPathParams {
                    spot: inputs.spot,
                    rate: inputs.rate,
                    dividend_yield: inputs.dividend_yield,
                    maturity: inputs.time_to_expiry,
                    params,
                })
            }
        };

        let moments = self.simulate(&simulation, inputs);
        self.combine(&moments, inputs)
    }

    /// Runs all blocks and merges their moments in block order.
    fn simulate(&self, simulation: &Simulation, inputs: &PricingInputs) -> Moments {
        let antithetic = self.config.antithetic();
        let (n_samples, per_block) = self.sample_layout();
        let n_blocks = n_samples.div_ceil(per_block);
        let width = simulation.normals_per_path(self.config.n_steps());
        let seed = self.config.seed();
        let df = inputs.discount_factor();
        let strike = inputs.strike;
        let option_type = inputs.option_type;

        let sample = |normals: &[f64], sign: f64| {
            let s_t = simulation.terminal(normals, sign);
            (df * option_type.intrinsic(s_t, strike), df * s_t)
        };

        let blocks: Vec<Moments> = (0..n_blocks)
            .into_par_iter()
            .map(|block| {
                let count = per_block.min(n_samples - block * per_block);
                let mut rng = PricerRng::for_stream(seed, block as u64);
                let mut normals = vec![0.0; width];
                let mut moments = Moments::default();
                for _ in 0..count {
                    rng.fill_normal(&mut normals);
                    let (y, x) = if antithetic {
                        let (y_up, x_up) = sample(&normals, 1.0);
                        let (y_down, x_down) = sample(&normals, -1.0);
                        (0.5 * (y_up + y_down), 0.5 * (x_up + x_down))
                    } else {
                        sample(&normals, 1.0)
                    };
                    moments.push(y, x);
                }
                moments
            })
            .collect();

        blocks.into_iter().fold(Moments::default(), Moments::merge)
    }

    /// Independent samples and samples per block; an antithetic pair is one sample.
    fn sample_layout(&self) -> (usize, usize) {
        let n_paths = self.config.n_paths();
        let block_size = self.config.block_size();
        let (n_samples, per_block) = if self.config.antithetic() {
            (n_paths.div_ceil(2), (block_size / 2).max(1))
        } else {
            (n_paths, block_size)
        };
        // A variance needs two samples
        (n_samples.max(2), per_block)
    }

    fn combine(&self, m: &Moments, inputs: &PricingInputs) -> Result<McEstimate, PricingError> {
        let n = m.n;
        let var_y = m.m2_y / (n - 1.0);
        let var_x = m.m2_x / (n - 1.0);
        let cov = m.c_xy / (n - 1.0);

        let (raw, variance) = if self.config.control_variate()
            && var_x > 1e-14 * m.mean_x.abs().max(1.0).powi(2)
        {
            let expected_x = inputs.spot * (-inputs.dividend_yield * inputs.time_to_expiry).exp();
            let beta = cov / var_x;
            (
                m.mean_y - beta * (m.mean_x - expected_x),
                (var_y - beta * cov).max(0.0),
            )
        } else {
            (m.mean_y, var_y.max(0.0))
        };

        let std_error = PricingError::check_finite((variance / n).sqrt(), "Monte Carlo std error")?;
        let raw = PricingError::check_finite(raw, "Monte Carlo price")?;
        let half_width = Z_95 * std_error;
        let paths_per_sample = if self.config.antithetic() { 2 } else { 1 };

        Ok(McEstimate {
            price: raw.max(0.0),
            std_error,
            confidence_interval: ((raw - half_width).max(0.0), (raw + half_width).max(0.0)),
            n_paths: n as usize * paths_per_sample,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pricer_core::types::{ExerciseStyle, OptionType};
    use pricer_models::analytical::BlackScholes;
    use pricer_models::heston::{HestonModel, HestonParams};

    fn pricer(n_paths: usize) -> MonteCarloPricer {
        MonteCarloPricer::new(
            MonteCarloConfig::builder()
                .n_paths(n_paths)
                .seed(7)
                .build()
                .unwrap(),
        )
        .unwrap()
    }

    fn atm_call() -> PricingInputs {
        PricingInputs::new(100.0, 100.0, 1.0, 0.05, 0.0, 0.2, OptionType::Call)
    }

    // ========================================================================
    // Moments
    // ========================================================================

    #[test]
    fn test_moments_merge_matches_single_pass() {
        let data: Vec<(f64, f64)> = (0..50)
            .map(|i| {
                let t = i as f64;
                ((t * 0.37).sin() * 3.0 + 1.0, (t * 0.11).cos() * 2.0)
            })
            .collect();
        let mut whole = Moments::default();
        data.iter().for_each(|&(y, x)| whole.push(y, x));

        let mut left = Moments::default();
        let mut right = Moments::default();
        data[..17].iter().for_each(|&(y, x)| left.push(y, x));
        data[17..].iter().for_each(|&(y, x)| right.push(y, x));
        let merged = left.merge(right);

        assert_relative_eq!(merged.n, whole.n);
        assert_relative_eq!(merged.mean_y, whole.mean_y, epsilon = 1e-12);
        assert_relative_eq!(merged.m2_y, whole.m2_y, epsilon = 1e-9);
        assert_relative_eq!(merged.m2_x, whole.m2_x, epsilon = 1e-9);
        assert_relative_eq!(merged.c_xy, whole.c_xy, epsilon = 1e-9);
    }

    // ========================================================================
    // GBM Pricing
    // ========================================================================

    #[test]
    fn test_gbm_call_matches_black_scholes() {
        let inputs = atm_call();
        let estimate = pricer(200_000).estimate(&inputs).unwrap();
        let exact = BlackScholes.price(&inputs).unwrap();

        assert!((estimate.price - exact).abs() < 4.0 * estimate.std_error + 1e-6);
        assert!(estimate.confidence_interval.0 <= estimate.price);
        assert!(estimate.confidence_interval.1 >= estimate.price);
        assert_eq!(estimate.n_paths, 200_000);
    }

    #[test]
    fn test_gbm_put_with_dividend_matches_black_scholes() {
        let inputs = PricingInputs::new(100.0, 110.0, 0.5, 0.03, 0.02, 0.3, OptionType::Put);
        let config = MonteCarloConfig::builder()
            .n_paths(100_000)
            .n_steps(4)
            .seed(11)
            .build()
            .unwrap();
        let estimate = MonteCarloPricer::new(config).unwrap().estimate(&inputs).unwrap();
        let exact = BlackScholes.price(&inputs).unwrap();
        assert!((estimate.price - exact).abs() < 4.0 * estimate.std_error + 1e-6);
    }

    #[test]
    fn test_put_call_parity_holds_under_control_variate() {
        let call = PricingInputs::new(100.0, 95.0, 1.0, 0.05, 0.01, 0.2, OptionType::Call);
        let put = call.with_option_type(OptionType::Put);
        let pricer = pricer(20_000);

        let c = pricer.price(&call).unwrap();
        let p = pricer.price(&put).unwrap();
        let parity = call.spot * (-call.dividend_yield * call.time_to_expiry).exp()
            - call.strike * call.discount_factor();
        assert_relative_eq!(c - p, parity, epsilon = 1e-8);
    }

    #[test]
    fn test_control_variate_reduces_standard_error() {
        let base = MonteCarloConfig::builder()
            .n_paths(20_000)
            .antithetic(false)
            .seed(3);
        let plain = MonteCarloPricer::new(base.clone().control_variate(false).build().unwrap())
            .unwrap()
            .estimate(&atm_call())
            .unwrap();
        let controlled = MonteCarloPricer::new(base.control_variate(true).build().unwrap())
            .unwrap()
            .estimate(&atm_call())
            .unwrap();
        assert!(controlled.std_error < 0.6 * plain.std_error);
    }

    #[test]
    fn test_american_priced_as_european() {
        let pricer = pricer(10_000);
        let european = atm_call().with_option_type(OptionType::Put);
        let american = european.with_exercise(ExerciseStyle::American);
        assert_eq!(
            pricer.price(&european).unwrap(),
            pricer.price(&american).unwrap()
        );
    }

    // ========================================================================
    // Reproducibility
    // ========================================================================

    #[test]
    fn test_same_seed_bit_identical() {
        let pricer = pricer(30_000);
        let a = pricer.estimate(&atm_call()).unwrap();
        let b = pricer.estimate(&atm_call()).unwrap();
        assert_eq!(a.price.to_bits(), b.price.to_bits());
        assert_eq!(a.std_error.to_bits(), b.std_error.to_bits());
    }

    #[test]
    fn test_result_independent_of_thread_count() {
        let config = MonteCarloConfig::builder()
            .n_paths(50_000)
            .n_steps(3)
            .block_size(1000)
            .seed(99)
            .build()
            .unwrap();
        let pricer = MonteCarloPricer::new(config).unwrap();
        let inputs = atm_call();

        let run_on = |threads: usize| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| pricer.estimate(&inputs).unwrap())
        };
        let single = run_on(1);
        let many = run_on(4);
        assert_eq!(single.price.to_bits(), many.price.to_bits());
        assert_eq!(single.std_error.to_bits(), many.std_error.to_bits());
    }

    #[test]
    fn test_different_seeds_differ() {
        let config = MonteCarloConfig::builder().n_paths(5_000).build().unwrap();
        let a = MonteCarloPricer::new(config.with_seed(1)).unwrap();
        let b = MonteCarloPricer::new(config.with_seed(2)).unwrap();
        assert_ne!(a.price(&atm_call()).unwrap(), b.price(&atm_call()).unwrap());
    }

    // ========================================================================
    // Edge Cases
    // ========================================================================

    #[test]
    fn test_expired_returns_intrinsic() {
        let inputs = PricingInputs::new(110.0, 100.0, 0.0, 0.05, 0.0, 0.2, OptionType::Call);
        let estimate = pricer(1000).estimate(&inputs).unwrap();
        assert_eq!(estimate.price, 10.0);
        assert_eq!(estimate.std_error, 0.0);
    }

    #[test]
    fn test_zero_volatility_is_deterministic() {
        let inputs = PricingInputs::new(100.0, 90.0, 1.0, 0.05, 0.0, 0.0, OptionType::Call);
        let estimate = pricer(1000).estimate(&inputs).unwrap();
        assert_relative_eq!(estimate.price, inputs.deterministic_value(), epsilon = 1e-12);
        assert_eq!(estimate.std_error, 0.0);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let inputs = atm_call().with_volatility(-0.2);
        let err = pricer(1000).price(&inputs).unwrap_err();
        assert!(err.is_domain_error());
    }

    #[test]
    fn test_deep_otm_price_non_negative() {
        let inputs = PricingInputs::new(100.0, 400.0, 0.25, 0.05, 0.0, 0.2, OptionType::Call);
        let estimate = pricer(10_000).estimate(&inputs).unwrap();
        assert!(estimate.price >= 0.0);
        assert!(estimate.price < 1e-6);
    }

    // ========================================================================
    // Confidence Gating
    // ========================================================================

    #[test]
    fn test_wide_interval_fails_with_convergence_error() {
        let config = MonteCarloConfig::builder()
            .n_paths(1_000)
            .max_relative_error(1e-4)
            .build()
            .unwrap();
        let err = MonteCarloPricer::new(config)
            .unwrap()
            .price(&atm_call())
            .unwrap_err();
        assert!(err.is_convergence_failure());
        assert!(matches!(err, PricingError::NotConverged { .. }));
    }

    #[test]
    fn test_loose_gate_passes() {
        let config = MonteCarloConfig::builder()
            .n_paths(10_000)
            .max_relative_error(0.5)
            .build()
            .unwrap();
        assert!(MonteCarloPricer::new(config)
            .unwrap()
            .price(&atm_call())
            .is_ok());
    }

    // ========================================================================
    // Heston Dynamics
    // ========================================================================

    #[test]
    fn test_heston_dynamics_close_to_characteristic_function() {
        let params = HestonParams::new(0.04, 0.04, 1.5, 0.3, -0.7);
        let config = MonteCarloConfig::builder()
            .n_paths(40_000)
            .n_steps(50)
            .seed(5)
            .dynamics(Dynamics::Heston {
                params,
                variance_source: VarianceSource::Calibrated,
            })
            .build()
            .unwrap();
        let inputs = PricingInputs::new(100.0, 100.0, 0.5, 0.03, 0.0, 0.2, OptionType::Call);
        let estimate = MonteCarloPricer::new(config).unwrap().estimate(&inputs).unwrap();
        let exact = HestonModel::new(params)
            .with_variance_source(VarianceSource::Calibrated)
            .price(&inputs)
            .unwrap();
        assert!((estimate.price - exact).abs() < 4.0 * estimate.std_error + 0.05);
    }

    // ========================================================================
    // Greeks
    // ========================================================================

    #[test]
    fn test_greeks_close_to_black_scholes() {
        let inputs = atm_call();
        let greeks = pricer(100_000).greeks(&inputs).unwrap();
        let exact = BlackScholes.greeks(&inputs).unwrap();

        assert!((greeks.delta - exact.delta).abs() < 0.02);
        assert!((greeks.vega - exact.vega).abs() < 0.05 * exact.vega);
        assert!((greeks.rho - exact.rho).abs() < 0.05 * exact.rho);
        assert!(greeks.theta < 0.0);
    }

    #[test]
    fn test_greeks_ignore_gate() {
        let config = MonteCarloConfig::builder()
            .n_paths(2_000)
            .max_relative_error(1e-6)
            .build()
            .unwrap();
        let pricer = MonteCarloPricer::new(config).unwrap();
        assert!(pricer.price(&atm_call()).is_err());
        assert!(pricer.greeks(&atm_call()).is_ok());
    }
}
