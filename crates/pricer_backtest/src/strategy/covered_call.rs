//! Covered call: long underlying, short one-month call rolled at expiry.

use pricer_core::market_data::DEFAULT_CONTRACT_MULTIPLIER;
use pricer_core::types::OptionType;
use pricer_risk::Instrument;
use serde::{Deserialize, Serialize};

use super::{Strategy, StrategyContext};
use crate::execution::Order;

/// Holds `contracts × 100` shares and keeps one short call per 100 shares
/// open at the strike nearest spot.
///
/// A new call is written on the first date without an open short call,
/// which is the date after the previous one expired or was assigned.
/// Underlying positions left flat by physical assignment are closed.
///
/// # Default Values
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `contracts` | 1 | Calls written; shares held are 100 per contract |
/// | `target_days` | 30 | Preferred days to expiry of each written call |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoveredCall {
    /// Number of calls written
    pub contracts: f64,
    /// Preferred days to expiry
    pub target_days: i64,
}

impl Default for CoveredCall {
    fn default() -> Self {
        Self {
            contracts: 1.0,
            target_days: 30,
        }
    }
}

impl CoveredCall {
    /// Covered call writing `contracts` calls about `target_days` out.
    pub fn new(contracts: f64, target_days: i64) -> Self {
        Self {
            contracts,
            target_days,
        }
    }

    fn target_shares(&self) -> f64 {
        self.contracts * DEFAULT_CONTRACT_MULTIPLIER
    }
}

fn is_short_call(instrument: &Instrument, quantity: f64) -> bool {
    matches!(instrument, Instrument::Option { contract } if contract.option_type == OptionType::Call)
        && quantity < 0.0
}

impl Strategy for CoveredCall {
    fn name(&self) -> &str {
        "covered_call"
    }

    fn risk_management(&mut self, ctx: &StrategyContext<'_>) -> Vec<Order> {
        let underlying: Vec<_> = ctx
            .portfolio
            .open_positions()
            .filter(|p| !p.is_option())
            .collect();
        if underlying.len() > 1 && ctx.portfolio.underlying_shares().abs() < 1e-9 {
            return underlying.iter().map(|p| Order::close(p.id)).collect();
        }
        Vec::new()
    }

    fn generate_signals(&mut self, ctx: &StrategyContext<'_>) -> Vec<Order> {
        let mut orders = Vec::new();

        let shortfall = self.target_shares() - ctx.portfolio.underlying_shares();
        if shortfall > 1e-9 {
            orders.push(Order::underlying(shortfall));
        }

        let call_open = ctx
            .portfolio
            .open_positions()
            .any(|p| is_short_call(&p.leg.instrument, p.leg.quantity));
        if !call_open {
            if let Some(contract) = ctx.nearest_contract(OptionType::Call, self.target_days) {
                orders.push(Order::option(contract.clone(), -self.contracts));
            }
        }
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::Portfolio;
    use crate::strategy::test_support::{date, snapshot, surface};
    use pricer_risk::Leg;

    #[test]
    fn test_opens_shares_and_call() {
        let snapshot = snapshot(date(2, 1), 100.0);
        let surface = surface(&snapshot);
        let portfolio = Portfolio::new(50_000.0);
        let ctx = StrategyContext {
            date: date(2, 1),
            snapshot: &snapshot,
            surface: &surface,
            portfolio: &portfolio,
        };

        let mut strategy = CoveredCall::default();
        assert!(strategy.risk_management(&ctx).is_empty());
        let orders = strategy.generate_signals(&ctx);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0], Order::underlying(100.0));
        match &orders[1] {
            Order::Open { leg } => {
                assert_eq!(leg.quantity, -1.0);
                let Instrument::Option { contract } = &leg.instrument else {
                    panic!("expected an option leg");
                };
                assert_eq!(contract.strike, 100.0);
                assert_eq!(contract.option_type, OptionType::Call);
                assert_eq!(contract.expiration, date(3, 15));
            }
            other => panic!("unexpected order {:?}", other),
        }
    }

    #[test]
    fn test_quiet_while_covered() {
        let snapshot = snapshot(date(2, 1), 100.0);
        let surface = surface(&snapshot);
        let call = snapshot
            .chain
            .iter()
            .find(|c| c.option_type == OptionType::Call && c.strike == 100.0)
            .unwrap()
            .clone();

        let mut portfolio = Portfolio::new(50_000.0);
        let shares = portfolio.submit(Leg::underlying(100.0), date(2, 1));
        portfolio.fill(shares, 100.0, 0.0).unwrap();
        let short = portfolio.submit(Leg::option(call, -1.0), date(2, 1));
        portfolio.fill(short, 2.5, 0.65).unwrap();

        let ctx = StrategyContext {
            date: date(2, 2),
            snapshot: &snapshot,
            surface: &surface,
            portfolio: &portfolio,
        };
        let mut strategy = CoveredCall::default();
        assert!(strategy.generate_signals(&ctx).is_empty());
    }

    #[test]
    fn test_flattens_delivered_shares() {
        let snapshot = snapshot(date(2, 1), 100.0);
        let surface = surface(&snapshot);
        let mut portfolio = Portfolio::new(50_000.0);
        let long = portfolio.submit(Leg::underlying(100.0), date(2, 1));
        portfolio.fill(long, 95.0, 0.0).unwrap();
        let delivered = portfolio.submit(Leg::underlying(-100.0), date(2, 1));
        portfolio.fill(delivered, 98.0, 0.0).unwrap();

        let ctx = StrategyContext {
            date: date(2, 2),
            snapshot: &snapshot,
            surface: &surface,
            portfolio: &portfolio,
        };
        let mut strategy = CoveredCall::default();
        assert_eq!(
            strategy.risk_management(&ctx),
            vec![Order::close(long), Order::close(delivered)]
        );
    }
}
