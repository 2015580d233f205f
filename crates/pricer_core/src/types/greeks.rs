//! Option sensitivities.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul};

/// First- and second-order sensitivities of an option value.
///
/// Units follow the market convention used throughout the workspace:
/// - `delta`: ∂V/∂S
/// - `gamma`: ∂²V/∂S²
/// - `theta`: ∂V/∂t per year of calendar time (negative for decay)
/// - `vega`: ∂V/∂σ per unit of volatility (1.0 = 100 vol points)
/// - `rho`: ∂V/∂r per unit of rate
/// - `vanna`: ∂²V/∂S∂σ
/// - `volga`: ∂²V/∂σ²
///
/// `GreeksSet` is additive so portfolio aggregation is a weighted sum.
///
/// # Examples
/// ```
/// use pricer_core::types::GreeksSet;
///
/// let leg = GreeksSet { delta: 0.5, gamma: 0.02, ..GreeksSet::zero() };
/// let book = leg.scale(100.0) + leg.scale(-40.0);
/// assert!((book.delta - 30.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GreeksSet {
    /// ∂V/∂S
    pub delta: f64,
    /// ∂²V/∂S²
    pub gamma: f64,
    /// ∂V/∂t (per year)
    pub theta: f64,
    /// ∂V/∂σ
    pub vega: f64,
    /// ∂V/∂r
    pub rho: f64,
    /// ∂²V/∂S∂σ
    pub vanna: f64,
    /// ∂²V/∂σ²
    pub volga: f64,
}

impl GreeksSet {
    /// All sensitivities zero.
    #[inline]
    pub const fn zero() -> Self {
        Self {
            delta: 0.0,
            gamma: 0.0,
            theta: 0.0,
            vega: 0.0,
            rho: 0.0,
            vanna: 0.0,
            volga: 0.0,
        }
    }

    /// Sensitivities of one unit of the underlying.
    #[inline]
    pub const fn underlying() -> Self {
        Self {
            delta: 1.0,
            ..Self::zero()
        }
    }

    /// Multiplies every sensitivity by `factor`.
    #[inline]
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            theta: self.theta * factor,
            vega: self.vega * factor,
            rho: self.rho * factor,
            vanna: self.vanna * factor,
            volga: self.volga * factor,
        }
    }

    /// Returns true when every sensitivity is finite.
    pub fn is_finite(&self) -> bool {
        [
            self.delta, self.gamma, self.theta, self.vega, self.rho, self.vanna, self.volga,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Theta per calendar day.
    #[inline]
    pub fn theta_per_day(&self) -> f64 {
        self.theta / 365.0
    }
}

impl Add for GreeksSet {
    type Output = GreeksSet;

    fn add(self, rhs: GreeksSet) -> GreeksSet {
        GreeksSet {
            delta: self.delta + rhs.delta,
            gamma: self.gamma + rhs.gamma,
            theta: self.theta + rhs.theta,
            vega: self.vega + rhs.vega,
            rho: self.rho + rhs.rho,
            vanna: self.vanna + rhs.vanna,
            volga: self.volga + rhs.volga,
        }
    }
}

impl AddAssign for GreeksSet {
    fn add_assign(&mut self, rhs: GreeksSet) {
        *self = *self + rhs;
    }
}

impl Mul<f64> for GreeksSet {
    type Output = GreeksSet;

    fn mul(self, rhs: f64) -> GreeksSet {
        self.scale(rhs)
    }
}

impl std::iter::Sum for GreeksSet {
    fn sum<I: Iterator<Item = GreeksSet>>(iter: I) -> GreeksSet {
        iter.fold(GreeksSet::zero(), |acc, g| acc + g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> GreeksSet {
        GreeksSet {
            delta: 0.6,
            gamma: 0.03,
            theta: -5.0,
            vega: 20.0,
            rho: 30.0,
            vanna: -0.1,
            volga: 4.0,
        }
    }

    #[test]
    fn test_scale_and_sum_are_linear() {
        let g = sample();
        let total: GreeksSet = vec![g, g.scale(2.0), g * -1.0].into_iter().sum();
        assert_relative_eq!(total.delta, 2.0 * g.delta, epsilon = 1e-12);
        assert_relative_eq!(total.volga, 2.0 * g.volga, epsilon = 1e-12);
    }

    #[test]
    fn test_underlying_has_unit_delta() {
        let u = GreeksSet::underlying();
        assert_eq!(u.delta, 1.0);
        assert_eq!(u.gamma, 0.0);
    }

    #[test]
    fn test_is_finite_detects_nan() {
        let mut g = sample();
        assert!(g.is_finite());
        g.vanna = f64::NAN;
        assert!(!g.is_finite());
    }

    #[test]
    fn test_theta_per_day() {
        assert_relative_eq!(sample().theta_per_day(), -5.0 / 365.0);
    }
}
