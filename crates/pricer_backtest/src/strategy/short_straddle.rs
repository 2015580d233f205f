//! Short at-the-money straddle with profit target and stop loss.

use pricer_core::types::OptionType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Strategy, StrategyContext};
use crate::execution::Order;

/// Sells a call and a put at the strike nearest spot when flat in options,
/// and buys both back once the position has captured `profit_target` of
/// the credit or lost `stop_loss` times it.
///
/// # Default Values
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `contracts` | 1 | Contracts sold on each side |
/// | `target_days` | 30 | Preferred days to expiry |
/// | `profit_target` | 0.5 | Share of the credit that triggers a close |
/// | `stop_loss` | 2.0 | Loss, in multiples of the credit, that triggers a close |
/// | `min_volatility` | 0.0 | Surface vol at the strike required to sell |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortStraddle {
    /// Contracts per side
    pub contracts: f64,
    /// Preferred days to expiry
    pub target_days: i64,
    /// Share of the credit to capture before closing
    pub profit_target: f64,
    /// Loss multiple of the credit that forces a close
    pub stop_loss: f64,
    /// Minimum surface volatility at the straddle strike
    pub min_volatility: f64,
}

impl Default for ShortStraddle {
    fn default() -> Self {
        Self {
            contracts: 1.0,
            target_days: 30,
            profit_target: 0.5,
            stop_loss: 2.0,
            min_volatility: 0.0,
        }
    }
}

impl Strategy for ShortStraddle {
    fn name(&self) -> &str {
        "short_straddle"
    }

    fn risk_management(&mut self, ctx: &StrategyContext<'_>) -> Vec<Order> {
        let shorts: Vec<_> = ctx
            .portfolio
            .open_positions()
            .filter(|p| p.is_option() && p.leg.quantity < 0.0)
            .collect();
        let credit: f64 = shorts.iter().map(|p| -p.units() * p.entry_price).sum();
        if credit <= 0.0 {
            return Vec::new();
        }
        let buyback: f64 = shorts.iter().map(|p| -p.units() * p.mark).sum();
        let pnl = credit - buyback;

        if pnl >= self.profit_target * credit || -pnl >= self.stop_loss * credit {
            debug!(
                date = %ctx.date,
                credit,
                pnl,
                "closing straddle"
            );
            return shorts.iter().map(|p| Order::close(p.id)).collect();
        }
        Vec::new()
    }

    fn generate_signals(&mut self, ctx: &StrategyContext<'_>) -> Vec<Order> {
        if ctx.portfolio.open_positions().any(|p| p.is_option()) {
            return Vec::new();
        }
        let Some(call) = ctx.nearest_contract(OptionType::Call, self.target_days) else {
            return Vec::new();
        };
        let Some(put) = ctx.counterpart(call) else {
            return Vec::new();
        };

        let t = call.time_to_expiry(ctx.snapshot.timestamp);
        match ctx.surface.interpolate(call.strike, t) {
            Ok(vol) if vol >= self.min_volatility => vec![
                Order::option(call.clone(), -self.contracts),
                Order::option(put.clone(), -self.contracts),
            ],
            _ => Vec::new(),
        }
    }
}
