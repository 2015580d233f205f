//! Market state a portfolio is valued against.

use chrono::NaiveDateTime;
use pricer_core::market_data::MarketData;
use serde::{Deserialize, Serialize};

use crate::error::RiskError;

/// Spot, carry and valuation time of one underlying.
///
/// Volatility comes from a [`VolatilitySurface`](pricer_surface::VolatilitySurface)
/// built from the same snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    /// Underlying price
    pub spot: f64,
    /// Continuously compounded risk-free rate
    pub rate: f64,
    /// Continuous dividend yield
    pub dividend_yield: f64,
    /// Valuation time
    pub valuation: NaiveDateTime,
}

impl MarketState {
    /// Creates a market state.
    pub fn new(spot: f64, rate: f64, dividend_yield: f64, valuation: NaiveDateTime) -> Self {
        Self {
            spot,
            rate,
            dividend_yield,
            valuation,
        }
    }

    /// Market state of a snapshot.
    pub fn from_snapshot(snapshot: &MarketData) -> Self {
        Self::new(
            snapshot.spot,
            snapshot.rate,
            snapshot.dividend_yield,
            snapshot.timestamp,
        )
    }

    /// Checks that the state can be priced.
    ///
    /// # Errors
    ///
    /// `RiskError::InvalidMarket` for a non-positive spot or non-finite carry.
    pub fn validate(&self) -> Result<(), RiskError> {
        if !(self.spot.is_finite() && self.spot > 0.0) {
            return Err(RiskError::InvalidMarket(format!(
                "spot must be positive, got {}",
                self.spot
            )));
        }
        if !(self.rate.is_finite() && self.dividend_yield.is_finite()) {
            return Err(RiskError::InvalidMarket(format!(
                "rate and dividend yield must be finite, got {} and {}",
                self.rate, self.dividend_yield
            )));
        }
        Ok(())
    }
}
