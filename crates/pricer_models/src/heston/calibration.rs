//! Heston calibration to option prices.
//!
//! ## Calibration Approach
//!
//! Minimises the weighted sum of squared price errors over
//! (v₀, θ, κ, ξ, ρ) with bounded Levenberg-Marquardt. Quotes are grouped
//! by expiry so each residual evaluation builds one quadrature per expiry.
//!
//! The Feller condition 2κθ > ξ² is not imposed as a hard bound. A penalty
//! residual `w · max(0, ξ² - 2κθ)`, on by default, pushes the fit towards
//! it, and the result always reports whether it holds. The penalty vanishes
//! wherever the condition holds, so it never biases a Feller-satisfying fit.

use pricer_core::math::solvers::{LMConfig, LevenbergMarquardtSolver};
use pricer_core::types::{CalibrationError, OptionType};
use serde::{Deserialize, Serialize};

use super::params::HestonParams;
use super::pricer::{HestonIntegration, HestonSlice};

/// Number of calibrated parameters `[v0, θ, κ, ξ, ρ]`.
pub const HESTON_PARAMETER_COUNT: usize = 5;

/// Default weight of the Feller penalty residual.
pub const DEFAULT_FELLER_PENALTY: f64 = 10.0;

/// One market price used in calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HestonQuote {
    /// Strike.
    pub strike: f64,
    /// Time to expiry in years.
    pub expiry: f64,
    /// Observed option price.
    pub price: f64,
    /// Call or put.
    pub option_type: OptionType,
    /// Residual weight.
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

fn unit_weight() -> f64 {
    1.0
}

impl HestonQuote {
    /// Quote with unit weight.
    pub fn new(strike: f64, expiry: f64, price: f64, option_type: OptionType) -> Self {
        Self {
            strike,
            expiry,
            price,
            option_type,
            weight: 1.0,
        }
    }

    /// Sets the residual weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Calibration settings.
///
/// # Default Values
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `initial` | `HestonParams::default()` | Starting point |
/// | `lm` | `LMConfig::default()` | Optimiser settings |
/// | `feller_penalty` | `Some(10.0)` | Weight of the Feller penalty residual |
/// | `lower_bounds` | `[1e-4, 1e-4, 0.05, 0.01, -0.99]` | Lower bounds of `[v0, θ, κ, ξ, ρ]` |
/// | `upper_bounds` | `[1.0, 1.0, 20.0, 2.0, 0.99]` | Upper bounds of `[v0, θ, κ, ξ, ρ]` |
/// | `integration` | `HestonIntegration::default()` | Quadrature settings |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HestonCalibrationConfig {
    /// Starting point, projected into the bounds.
    pub initial: HestonParams,
    /// Optimiser settings.
    pub lm: LMConfig,
    /// Weight of the Feller penalty residual, `None` to disable.
    pub feller_penalty: Option<f64>,
    /// Lower bounds of `[v0, θ, κ, ξ, ρ]`.
    pub lower_bounds: [f64; HESTON_PARAMETER_COUNT],
    /// Upper bounds of `[v0, θ, κ, ξ, ρ]`.
    pub upper_bounds: [f64; HESTON_PARAMETER_COUNT],
    /// Quadrature settings.
    pub integration: HestonIntegration,
}

impl Default for HestonCalibrationConfig {
    fn default() -> Self {
        Self {
            initial: HestonParams::default(),
            lm: LMConfig::default(),
            feller_penalty: Some(DEFAULT_FELLER_PENALTY),
            lower_bounds: [1e-4, 1e-4, 0.05, 0.01, -0.99],
            upper_bounds: [1.0, 1.0, 20.0, 2.0, 0.99],
            integration: HestonIntegration::default(),
        }
    }
}

impl HestonCalibrationConfig {
    /// Sets the starting point.
    pub fn with_initial(mut self, initial: HestonParams) -> Self {
        self.initial = initial;
        self
    }

    /// Enables the Feller penalty with the given weight.
    pub fn with_feller_penalty(mut self, weight: f64) -> Self {
        self.feller_penalty = Some(weight);
        self
    }

    /// Disables the Feller penalty.
    pub fn without_feller_penalty(mut self) -> Self {
        self.feller_penalty = None;
        self
    }

    /// Sets the parameter bounds, each ordered `[v0, θ, κ, ξ, ρ]`.
    pub fn with_bounds(
        mut self,
        lower: [f64; HESTON_PARAMETER_COUNT],
        upper: [f64; HESTON_PARAMETER_COUNT],
    ) -> Self {
        self.lower_bounds = lower;
        self.upper_bounds = upper;
        self
    }

    /// Checks the penalty weight and bounds.
    ///
    /// # Errors
    ///
    /// `CalibrationErrorKind::InvalidConstraint` when:
    /// - the penalty weight is negative or non-finite
    /// - a bound is non-finite or a lower bound is not below its upper bound
    /// - v0, θ, κ or ξ may reach zero
    /// - the ρ bounds leave (-1, 1)
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if let Some(weight) = self.feller_penalty {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(CalibrationError::constraint_violation(format!(
                    "feller penalty weight must be non-negative, got {}",
                    weight
                )));
            }
        }
        let (lower, upper) = (&self.lower_bounds, &self.upper_bounds);
        if let Some(i) = (0..HESTON_PARAMETER_COUNT)
            .find(|&i| !(lower[i].is_finite() && upper[i].is_finite() && lower[i] < upper[i]))
        {
            return Err(CalibrationError::constraint_violation(format!(
                "bounds of parameter {} are invalid: [{}, {}]",
                i, lower[i], upper[i]
            )));
        }
        if lower[..4].iter().any(|&b| b <= 0.0) {
            return Err(CalibrationError::constraint_violation(
                "lower bounds of v0, theta, kappa and xi must be positive".to_string(),
            ));
        }
        if !(lower[4] > -1.0 && upper[4] < 1.0) {
            return Err(CalibrationError::constraint_violation(format!(
                "rho bounds must lie inside (-1, 1), got [{}, {}]",
                lower[4], upper[4]
            )));
        }
        Ok(())
    }
}

/// Whether calibrated parameters satisfy 2κθ > ξ².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FellerStatus {
    /// Condition holds.
    Satisfied,
    /// Condition fails; `ratio` is 2κθ / ξ².
    Violated {
        /// Feller ratio.
        ratio: f64,
    },
}

/// Outcome of a successful calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HestonCalibrationResult {
    /// Fitted parameters.
    pub params: HestonParams,
    /// Root mean square price error (unweighted).
    pub rmse: f64,
    /// Optimiser iterations.
    pub iterations: usize,
    /// Feller condition at the fitted parameters.
    pub feller: FellerStatus,
}

/// Fits Heston parameters to option prices.
///
/// # Arguments
///
/// * `spot` - Underlying price
/// * `rate` - Continuously compounded risk-free rate
/// * `dividend_yield` - Continuous dividend yield
/// * `quotes` - Market prices, at least five
/// * `config` - Starting point, optimiser and quadrature settings
///
/// # Errors
///
/// * `CalibrationErrorKind::InsufficientData` - Fewer quotes than parameters
/// * `CalibrationErrorKind::InvalidConstraint` - Malformed quote, market
///   inputs or settings
/// * `CalibrationErrorKind::NotConverged` - Iteration budget exhausted; the
///   error carries the last parameters
pub fn calibrate_heston(
    spot: f64,
    rate: f64,
    dividend_yield: f64,
    quotes: &[HestonQuote],
    config: &HestonCalibrationConfig,
) -> Result<HestonCalibrationResult, CalibrationError> {
    config.validate()?;
    if quotes.len() < HESTON_PARAMETER_COUNT {
        return Err(CalibrationError::insufficient_data(
            quotes.len(),
            HESTON_PARAMETER_COUNT,
        ));
    }
    if !(spot.is_finite() && spot > 0.0 && rate.is_finite() && dividend_yield.is_finite()) {
        return Err(CalibrationError::constraint_violation(format!(
            "invalid market inputs: spot {}, rate {}, dividend yield {}",
            spot, rate, dividend_yield
        )));
    }
    if let Some((index, quote)) = quotes.iter().enumerate().find(|(_, q)| {
        !(q.strike > 0.0 && q.expiry > 0.0 && q.price >= 0.0 && q.weight > 0.0)
            || !(q.strike.is_finite() && q.expiry.is_finite() && q.price.is_finite())
    }) {
        return Err(CalibrationError::constraint_violation(format!(
            "quote {} is malformed: {:?}",
            index, quote
        )));
    }

    let groups = group_by_expiry(quotes);
    let model_errors = |params: &HestonParams| -> Option<Vec<f64>> {
        let mut errors = vec![0.0; quotes.len()];
        for (expiry, indices) in &groups {
            let slice = HestonSlice::new(params, *expiry, &config.integration).ok()?;
            for &i in indices {
                let q = &quotes[i];
                errors[i] =
                    slice.price(spot, q.strike, rate, dividend_yield, q.option_type) - q.price;
            }
        }
        Some(errors)
    };

    let residuals = |x: &[f64]| -> Vec<f64> {
        let n = quotes.len() + usize::from(config.feller_penalty.is_some());
        let Some(params) = HestonParams::from_slice(x) else {
            return vec![f64::NAN; n];
        };
        let Some(errors) = model_errors(&params) else {
            return vec![f64::NAN; n];
        };
        let mut r: Vec<f64> = errors
            .iter()
            .zip(quotes)
            .map(|(e, q)| q.weight.sqrt() * e)
            .collect();
        if let Some(weight) = config.feller_penalty {
            r.push(weight * (params.xi * params.xi - 2.0 * params.kappa * params.theta).max(0.0));
        }
        r
    };

    let solver = LevenbergMarquardtSolver::new(config.lm);
    let fit = solver.solve_bounded(
        residuals,
        config.initial.to_vec(),
        &config.lower_bounds,
        &config.upper_bounds,
    )?;

    let params = HestonParams::from_slice(&fit.params).ok_or_else(|| {
        CalibrationError::numerical_instability("optimiser returned a malformed parameter vector")
    })?;
    if !fit.converged {
        return Err(
            CalibrationError::not_converged(fit.iterations, fit.residual_ss)
                .with_parameters(fit.params),
        );
    }

    let errors = model_errors(&params).ok_or_else(|| {
        CalibrationError::numerical_instability("pricing failed at the fitted parameters")
    })?;
    let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64).sqrt();

    let feller = if params.satisfies_feller() {
        FellerStatus::Satisfied
    } else {
        let ratio = params.feller_ratio();
        tracing::warn!(
            ratio,
            kappa = params.kappa,
            theta = params.theta,
            xi = params.xi,
            "calibrated heston parameters violate the Feller condition"
        );
        FellerStatus::Violated { ratio }
    };

    tracing::info!(
        quotes = quotes.len(),
        iterations = fit.iterations,
        rmse,
        "heston calibration finished"
    );

    Ok(HestonCalibrationResult {
        params,
        rmse,
        iterations: fit.iterations,
        feller,
    })
}

/// Quote indices grouped by identical expiry, in ascending expiry order.
fn group_by_expiry(quotes: &[HestonQuote]) -> Vec<(f64, Vec<usize>)> {
    let mut order: Vec<usize> = (0..quotes.len()).collect();
    order.sort_by(|&a, &b| quotes[a].expiry.total_cmp(&quotes[b].expiry));

    let mut groups: Vec<(f64, Vec<usize>)> = Vec::new();
    for i in order {
        match groups.last_mut() {
            Some((expiry, indices)) if *expiry == quotes[i].expiry => indices.push(i),
            _ => groups.push((quotes[i].expiry, vec![i])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricer_core::types::CalibrationErrorKind;

    const SPOT: f64 = 100.0;
    const RATE: f64 = 0.03;

    fn synthetic_quotes(params: &HestonParams) -> Vec<HestonQuote> {
        let integration = HestonIntegration::default();
        let mut quotes = Vec::new();
        for expiry in [0.25, 0.5, 1.0] {
            let slice = HestonSlice::new(params, expiry, &integration).unwrap();
            for strike in [85.0, 95.0, 100.0, 105.0, 115.0] {
                let option_type = if strike < SPOT {
                    OptionType::Put
                } else {
                    OptionType::Call
                };
                let price = slice.price(SPOT, strike, RATE, 0.0, option_type);
                quotes.push(HestonQuote::new(strike, expiry, price, option_type));
            }
        }
        quotes
    }

    #[test]
    fn test_recovers_synthetic_parameters() {
        // 2κθ = 0.15 > ξ² = 0.09
        let truth = HestonParams::new(0.04, 0.05, 1.5, 0.3, -0.6);
        let quotes = synthetic_quotes(&truth);
        let config = HestonCalibrationConfig::default()
            .with_initial(HestonParams::new(0.06, 0.06, 1.0, 0.3, -0.3));

        let result = calibrate_heston(SPOT, RATE, 0.0, &quotes, &config).unwrap();
        assert!(result.rmse < 1e-6, "rmse {}", result.rmse);
        assert!((result.params.v0 - truth.v0).abs() < 1e-3);
        assert!((result.params.rho - truth.rho).abs() < 1e-2);
        assert_eq!(result.feller, FellerStatus::Satisfied);
    }

    #[test]
    fn test_reports_feller_violation() {
        // 2κθ = 0.08 < ξ² = 0.81
        let truth = HestonParams::new(0.04, 0.04, 1.0, 0.9, -0.5);
        let quotes = synthetic_quotes(&truth);
        let config = HestonCalibrationConfig::default()
            .with_initial(truth)
            .without_feller_penalty();

        let result = calibrate_heston(SPOT, RATE, 0.0, &quotes, &config).unwrap();
        match result.feller {
            FellerStatus::Violated { ratio } => assert!(ratio < 1.0),
            FellerStatus::Satisfied => panic!("expected a Feller violation"),
        }
    }

    #[test]
    fn test_feller_penalty_pulls_towards_condition() {
        let truth = HestonParams::new(0.04, 0.04, 1.0, 0.9, -0.5);
        let quotes = synthetic_quotes(&truth);
        let free = calibrate_heston(
            SPOT,
            RATE,
            0.0,
            &quotes,
            &HestonCalibrationConfig::default()
                .with_initial(truth)
                .without_feller_penalty(),
        )
        .unwrap();
        let config = HestonCalibrationConfig {
            lm: LMConfig::new(1e-12, 40),
            ..HestonCalibrationConfig::default()
        }
        .with_initial(truth)
        .with_feller_penalty(100.0);
        // The penalty makes the optimum inexact, so take the last iterate either way.
        let penalised = match calibrate_heston(SPOT, RATE, 0.0, &quotes, &config) {
            Ok(result) => result.params,
            Err(err) => err
                .parameter_values
                .as_deref()
                .and_then(HestonParams::from_slice)
                .unwrap(),
        };
        assert!(penalised.feller_ratio() > free.params.feller_ratio());
    }

    #[test]
    fn test_default_config_keeps_feller_satisfying_fit() {
        // 2κθ = 0.24 > ξ² = 0.16
        let truth = HestonParams::new(0.05, 0.06, 2.0, 0.4, -0.5);
        let quotes = synthetic_quotes(&truth);
        let config = HestonCalibrationConfig::default();
        assert_eq!(config.feller_penalty, Some(DEFAULT_FELLER_PENALTY));

        let result = calibrate_heston(SPOT, RATE, 0.0, &quotes, &config).unwrap();
        assert_eq!(result.feller, FellerStatus::Satisfied);
        assert!(result.rmse < 1e-5, "rmse {}", result.rmse);
    }

    #[test]
    fn test_bounds_are_configurable() {
        let truth = HestonParams::new(0.04, 0.05, 1.5, 0.3, -0.6);
        let quotes = synthetic_quotes(&truth);
        // Cap κ below its true value
        let config = HestonCalibrationConfig::default()
            .with_initial(HestonParams::new(0.06, 0.06, 0.8, 0.3, -0.3))
            .with_bounds(
                [1e-4, 1e-4, 0.05, 0.01, -0.99],
                [1.0, 1.0, 1.0, 2.0, 0.99],
            );
        let params = match calibrate_heston(SPOT, RATE, 0.0, &quotes, &config) {
            Ok(result) => result.params,
            Err(err) => err
                .parameter_values
                .as_deref()
                .and_then(HestonParams::from_slice)
                .unwrap(),
        };
        assert!(params.kappa <= 1.0 + 1e-12);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let quotes = synthetic_quotes(&HestonParams::default());
        let inverted = HestonCalibrationConfig::default().with_bounds(
            [1e-4, 1e-4, 0.05, 0.01, -0.99],
            [1.0, 1.0, 0.01, 2.0, 0.99],
        );
        let zero_variance = HestonCalibrationConfig::default().with_bounds(
            [0.0, 1e-4, 0.05, 0.01, -0.99],
            [1.0, 1.0, 20.0, 2.0, 0.99],
        );
        let full_correlation = HestonCalibrationConfig::default().with_bounds(
            [1e-4, 1e-4, 0.05, 0.01, -1.0],
            [1.0, 1.0, 20.0, 2.0, 0.99],
        );
        let negative_penalty = HestonCalibrationConfig::default().with_feller_penalty(-1.0);
        for config in [inverted, zero_variance, full_correlation, negative_penalty] {
            let err = calibrate_heston(SPOT, RATE, 0.0, &quotes, &config).unwrap_err();
            assert!(err.is_constraint_violation(), "{:?}", config);
        }
        assert!(HestonCalibrationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_insufficient_quotes() {
        let quotes = vec![HestonQuote::new(100.0, 0.5, 5.0, OptionType::Call); 3];
        let err = calibrate_heston(SPOT, RATE, 0.0, &quotes, &HestonCalibrationConfig::default())
            .unwrap_err();
        assert_eq!(err.kind, CalibrationErrorKind::InsufficientData { got: 3, need: 5 });
    }

    #[test]
    fn test_malformed_quote() {
        let mut quotes = synthetic_quotes(&HestonParams::default());
        quotes[2].expiry = -1.0;
        let err = calibrate_heston(SPOT, RATE, 0.0, &quotes, &HestonCalibrationConfig::default())
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_budget_exhaustion_carries_parameters() {
        let quotes = synthetic_quotes(&HestonParams::new(0.04, 0.05, 1.5, 0.5, -0.6));
        let config = HestonCalibrationConfig {
            lm: LMConfig::new(1e-15, 1),
            ..HestonCalibrationConfig::default()
        }
        .with_initial(HestonParams::new(0.09, 0.09, 3.0, 0.2, 0.2));
        let err = calibrate_heston(SPOT, RATE, 0.0, &quotes, &config).unwrap_err();
        assert!(err.is_not_converged());
        assert_eq!(err.parameter_values.as_ref().map(Vec::len), Some(5));
    }

    #[test]
    fn test_groups_quotes_by_expiry() {
        let quotes = [
            HestonQuote::new(100.0, 1.0, 1.0, OptionType::Call),
            HestonQuote::new(100.0, 0.5, 1.0, OptionType::Call),
            HestonQuote::new(110.0, 1.0, 1.0, OptionType::Call),
        ];
        let groups = group_by_expiry(&quotes);
        assert_eq!(groups, vec![(0.5, vec![1]), (1.0, vec![0, 2])]);
    }
}
