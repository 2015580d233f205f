//! Market shifts applied by a scenario.
//!
//! A [`Scenario`] moves spot by a relative amount, the whole volatility
//! surface by an absolute parallel amount, the rate by an absolute amount,
//! and the valuation time forward by whole days. Volatility is read sticky
//! to strike: a shifted spot queries the surface at the same strikes.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::RiskError;
use crate::market::MarketState;

/// Named set of market shifts.
///
/// # Examples
///
/// ```
/// use pricer_risk::Scenario;
///
/// let crash = Scenario::new("crash")
///     .with_spot_shift(-0.2)
///     .with_vol_shift(0.1);
/// assert!(crash.validate().is_ok());
/// assert!(!crash.is_base());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Relative spot move; -0.1 is a 10% fall
    pub spot_shift: f64,
    /// Absolute shift of every surface volatility
    pub vol_shift: f64,
    /// Absolute shift of the risk-free rate
    pub rate_shift: f64,
    /// Calendar days the valuation time moves forward
    pub days_forward: u32,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new("base")
    }
}

impl Scenario {
    /// Scenario with no shifts.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spot_shift: 0.0,
            vol_shift: 0.0,
            rate_shift: 0.0,
            days_forward: 0,
        }
    }

    /// Sets the relative spot shift.
    pub fn with_spot_shift(mut self, shift: f64) -> Self {
        self.spot_shift = shift;
        self
    }

    /// Sets the absolute volatility shift.
    pub fn with_vol_shift(mut self, shift: f64) -> Self {
        self.vol_shift = shift;
        self
    }

    /// Sets the absolute rate shift.
    pub fn with_rate_shift(mut self, shift: f64) -> Self {
        self.rate_shift = shift;
        self
    }

    /// Sets the number of days to roll forward.
    pub fn with_days_forward(mut self, days: u32) -> Self {
        self.days_forward = days;
        self
    }

    /// Returns true when the scenario changes nothing.
    pub fn is_base(&self) -> bool {
        self.spot_shift == 0.0
            && self.vol_shift == 0.0
            && self.rate_shift == 0.0
            && self.days_forward == 0
    }

    /// Checks that every shift is finite and spot stays positive.
    ///
    /// # Errors
    ///
    /// `RiskError::InvalidScenario` naming the offending shift.
    pub fn validate(&self) -> Result<(), RiskError> {
        let invalid = |reason: &str| RiskError::InvalidScenario {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if !(self.spot_shift.is_finite() && self.vol_shift.is_finite() && self.rate_shift.is_finite())
        {
            return Err(invalid("shifts must be finite"));
        }
        if self.spot_shift <= -1.0 {
            return Err(invalid("spot shift must exceed -100%"));
        }
        Ok(())
    }

    /// Market state after the spot, rate and time shifts.
    pub fn apply(&self, market: &MarketState) -> MarketState {
        MarketState {
            spot: market.spot * (1.0 + self.spot_shift),
            rate: market.rate + self.rate_shift,
            dividend_yield: market.dividend_yield,
            valuation: market.valuation + Duration::days(i64::from(self.days_forward)),
        }
    }
}
