//! Heston model parameters.

use pricer_core::types::PricingError;
use serde::{Deserialize, Serialize};

/// Parameters of the Heston stochastic volatility model.
///
/// ```text
/// dS = (r - q) S dt + √v S dW_S
/// dv = κ (θ - v) dt + ξ √v dW_v
/// E[dW_S dW_v] = ρ dt
/// ```
///
/// # Examples
///
/// ```
/// use pricer_models::heston::HestonParams;
///
/// let params = HestonParams::new(0.04, 0.04, 1.5, 0.3, -0.7);
/// assert!(params.validate().is_ok());
/// assert!(params.satisfies_feller());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HestonParams {
    /// Initial variance v₀ ≥ 0.
    pub v0: f64,
    /// Long-run variance θ ≥ 0.
    pub theta: f64,
    /// Mean reversion speed κ > 0.
    pub kappa: f64,
    /// Volatility of variance ξ > 0.
    pub xi: f64,
    /// Spot-variance correlation ρ ∈ (-1, 1).
    pub rho: f64,
}

impl Default for HestonParams {
    fn default() -> Self {
        Self::new(0.04, 0.04, 1.5, 0.3, -0.7)
    }
}

impl HestonParams {
    /// Creates a parameter set without validating it.
    pub const fn new(v0: f64, theta: f64, kappa: f64, xi: f64, rho: f64) -> Self {
        Self {
            v0,
            theta,
            kappa,
            xi,
            rho,
        }
    }

    /// Parameter vector in calibration order `[v0, θ, κ, ξ, ρ]`.
    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.v0, self.theta, self.kappa, self.xi, self.rho]
    }

    /// Inverse of [`HestonParams::to_vec`]. Returns `None` unless `values`
    /// has exactly five elements.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match *values {
            [v0, theta, kappa, xi, rho] => Some(Self::new(v0, theta, kappa, xi, rho)),
            _ => None,
        }
    }

    /// Checks parameter domains.
    ///
    /// # Errors
    ///
    /// `PricingError::InvalidInput` naming the first offending parameter.
    pub fn validate(&self) -> Result<(), PricingError> {
        let checks = [
            ("v0", self.v0, self.v0 >= 0.0),
            ("theta", self.theta, self.theta >= 0.0),
            ("kappa", self.kappa, self.kappa > 0.0),
            ("xi", self.xi, self.xi > 0.0),
            ("rho", self.rho, self.rho > -1.0 && self.rho < 1.0),
        ];
        for (name, value, ok) in checks {
            if !value.is_finite() || !ok {
                return Err(PricingError::InvalidInput(format!(
                    "heston {} out of range: {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Feller ratio 2κθ / ξ².
    pub fn feller_ratio(&self) -> f64 {
        2.0 * self.kappa * self.theta / (self.xi * self.xi)
    }

    /// Whether 2κθ > ξ², i.e. the variance process stays strictly positive.
    pub fn satisfies_feller(&self) -> bool {
        self.feller_ratio() > 1.0
    }

    /// Copy with a different initial variance.
    pub fn with_v0(mut self, v0: f64) -> Self {
        self.v0 = v0;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_each_parameter() {
        let base = HestonParams::default();
        let bad = [
            HestonParams { v0: -0.01, ..base },
            HestonParams { theta: -0.01, ..base },
            HestonParams { kappa: 0.0, ..base },
            HestonParams { xi: 0.0, ..base },
            HestonParams { rho: 1.0, ..base },
            HestonParams { rho: f64::NAN, ..base },
        ];
        for params in bad {
            assert!(params.validate().unwrap_err().is_domain_error(), "{:?}", params);
        }
    }

    #[test]
    fn test_feller_condition() {
        let params = HestonParams::new(0.04, 0.04, 1.5, 0.3, -0.7);
        assert!((params.feller_ratio() - 0.12 / 0.09).abs() < 1e-12);
        assert!(params.satisfies_feller());
        assert!(!HestonParams::new(0.04, 0.04, 0.5, 1.0, -0.7).satisfies_feller());
    }

    #[test]
    fn test_vector_round_trip() {
        let params = HestonParams::new(0.03, 0.05, 2.0, 0.4, -0.5);
        assert_eq!(HestonParams::from_slice(&params.to_vec()), Some(params));
        assert_eq!(HestonParams::from_slice(&[1.0, 2.0]), None);
    }
}
