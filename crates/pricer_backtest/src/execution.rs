//! Orders and the execution cost model.

use pricer_core::market_data::OptionsContract;
use pricer_risk::{Instrument, Leg};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::position::PositionId;

/// Instruction emitted by a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Order {
    /// Open a new position.
    Open {
        /// Instrument and signed quantity
        leg: Leg,
    },
    /// Close an open position at the current quote.
    Close {
        /// Position to close
        id: PositionId,
    },
}

impl Order {
    /// Buy (positive) or sell (negative) `quantity` contracts.
    pub fn option(contract: OptionsContract, quantity: f64) -> Self {
        Order::Open {
            leg: Leg::option(contract, quantity),
        }
    }

    /// Buy (positive) or sell (negative) `quantity` shares.
    pub fn underlying(quantity: f64) -> Self {
        Order::Open {
            leg: Leg::underlying(quantity),
        }
    }

    /// Close position `id`.
    pub fn close(id: PositionId) -> Self {
        Order::Close { id }
    }
}

/// Spread and commission charged on fills.
///
/// A buyer pays `mid + spread_fraction × half_spread`, a seller receives
/// `mid - spread_fraction × half_spread`; a fraction of 1 crosses the full
/// quoted spread. Commissions are charged per contract and per share on
/// every fill. Expiry settlement is free.
///
/// # Default Values
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `spread_fraction` | 0.5 | Share of the half-spread paid on each fill |
/// | `commission_per_contract` | 0.65 | Fixed fee per option contract |
/// | `commission_per_share` | 0.0 | Fixed fee per share of the underlying |
///
/// # Examples
/// ```
/// use pricer_backtest::TransactionCostModel;
///
/// let costs = TransactionCostModel::default();
/// // Buying at a 2.00 / 2.20 quote
/// assert!((costs.fill_price(2.0, 2.2, 1.0) - 2.15).abs() < 1e-12);
/// // Selling
/// assert!((costs.fill_price(2.0, 2.2, -1.0) - 2.05).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionCostModel {
    /// Share of the half-spread paid on each fill, in [0, 1]
    pub spread_fraction: f64,
    /// Commission per option contract
    pub commission_per_contract: f64,
    /// Commission per share of the underlying
    pub commission_per_share: f64,
}

impl Default for TransactionCostModel {
    fn default() -> Self {
        Self {
            spread_fraction: 0.5,
            commission_per_contract: 0.65,
            commission_per_share: 0.0,
        }
    }
}

impl TransactionCostModel {
    /// No spread and no commission.
    pub fn frictionless() -> Self {
        Self {
            spread_fraction: 0.0,
            commission_per_contract: 0.0,
            commission_per_share: 0.0,
        }
    }

    /// Checks the parameters.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidParameter` for a spread fraction outside [0, 1]
    /// or a negative commission.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.spread_fraction) {
            return Err(ConfigError::InvalidParameter {
                name: "spread_fraction",
                reason: format!("must lie in [0, 1], got {}", self.spread_fraction),
            });
        }
        for (name, value) in [
            ("commission_per_contract", self.commission_per_contract),
            ("commission_per_share", self.commission_per_share),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("must be non-negative, got {}", value),
                });
            }
        }
        Ok(())
    }

    /// Execution price for a trade of sign `side` (+1 buy, -1 sell) against
    /// a `bid` / `ask` quote, floored at zero.
    pub fn fill_price(&self, bid: f64, ask: f64, side: f64) -> f64 {
        let mid = 0.5 * (bid + ask);
        let half_spread = 0.5 * (ask - bid);
        (mid + side.signum() * self.spread_fraction * half_spread).max(0.0)
    }

    /// Commission for trading `quantity` of `instrument`.
    pub fn commission(&self, instrument: &Instrument, quantity: f64) -> f64 {
        match instrument {
            Instrument::Option { .. } => self.commission_per_contract * quantity.abs(),
            Instrument::Underlying => self.commission_per_share * quantity.abs(),
        }
    }
}
