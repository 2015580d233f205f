//! Portfolio arena.
//!
//! Positions live in one `Vec` indexed by [`PositionId`]; the portfolio
//! keeps index lists of the open and closed sets instead of references.
//! Every cash movement belongs to exactly one position, so at any time
//!
//! ```text
//! Σ realised + Σ unrealised = total_value - initial_cash
//! ```
//!
//! where both P&L terms are net of transaction costs.

use chrono::NaiveDate;
use pricer_core::types::{GreeksSet, OptionType};
use pricer_risk::{Instrument, Leg};
use serde::{Deserialize, Serialize};

use crate::config::Settlement;
use crate::error::LifecycleError;
use crate::position::{Position, PositionId, PositionState};

/// Result of settling an option at expiry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpiryOutcome {
    /// Terminal state reached
    pub state: PositionState,
    /// Realised P&L of the option position
    pub realised_pnl: f64,
    /// Cash paid out (negative) or received for the option itself
    pub cash_flow: f64,
    /// Underlying position created by physical delivery
    pub delivered: Option<PositionId>,
}

/// Cash and positions of one backtest run.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use pricer_backtest::Portfolio;
/// use pricer_risk::Leg;
///
/// let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
/// let mut portfolio = Portfolio::new(50_000.0);
/// let id = portfolio.submit(Leg::underlying(100.0), date);
/// portfolio.fill(id, 400.0, 1.0).unwrap();
///
/// assert_eq!(portfolio.cash(), 50_000.0 - 40_000.0 - 1.0);
/// assert_eq!(portfolio.total_value(), 50_000.0 - 1.0);
/// assert!(portfolio.reconciliation_error().abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    positions: Vec<Position>,
    pending: Vec<PositionId>,
    open: Vec<PositionId>,
    closed: Vec<PositionId>,
    cash: f64,
    initial_cash: f64,
    transaction_costs: f64,
}

impl Portfolio {
    /// Empty portfolio holding `initial_cash`.
    pub fn new(initial_cash: f64) -> Self {
        Self {
            positions: Vec::new(),
            pending: Vec::new(),
            open: Vec::new(),
            closed: Vec::new(),
            cash: initial_cash,
            initial_cash,
            transaction_costs: 0.0,
        }
    }

    /// Current cash balance.
    #[inline]
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Cash at the start of the run.
    #[inline]
    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    /// Transaction costs paid so far.
    #[inline]
    pub fn transaction_costs(&self) -> f64 {
        self.transaction_costs
    }

    /// Every position ever created, indexed by id.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Looks up a position.
    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(id.0)
    }

    /// Ids of open positions, in opening order.
    pub fn open_ids(&self) -> &[PositionId] {
        &self.open
    }

    /// Ids of terminal positions, in closing order.
    pub fn closed_ids(&self) -> &[PositionId] {
        &self.closed
    }

    /// Open positions, in opening order.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> + '_ {
        self.open.iter().map(move |id| &self.positions[id.0])
    }

    /// Terminal positions, in closing order.
    pub fn closed_positions(&self) -> impl Iterator<Item = &Position> + '_ {
        self.closed.iter().map(move |id| &self.positions[id.0])
    }

    /// Net shares of the underlying across open positions.
    pub fn underlying_shares(&self) -> f64 {
        self.open_positions()
            .filter(|p| !p.is_option())
            .map(|p| p.leg.quantity)
            .sum()
    }

    /// Σ units × mark over open positions.
    pub fn market_value(&self) -> f64 {
        self.open_positions().map(Position::market_value).sum()
    }

    /// Cash plus market value.
    pub fn total_value(&self) -> f64 {
        self.cash + self.market_value()
    }

    /// Σ open position Greeks.
    pub fn greeks(&self) -> GreeksSet {
        self.open_positions().map(|p| p.greeks).sum()
    }

    /// Σ realised P&L of terminal positions.
    pub fn realised_pnl(&self) -> f64 {
        self.closed_positions()
            .filter_map(|p| p.realised_pnl)
            .sum()
    }

    /// Σ unrealised P&L of open positions.
    pub fn unrealised_pnl(&self) -> f64 {
        self.open_positions().map(Position::unrealised_pnl).sum()
    }

    /// Σ P&L minus the change in total value; zero up to rounding.
    pub fn reconciliation_error(&self) -> f64 {
        self.realised_pnl() + self.unrealised_pnl() - (self.total_value() - self.initial_cash)
    }

    fn get_mut(&mut self, id: PositionId) -> Result<&mut Position, LifecycleError> {
        self.positions
            .get_mut(id.0)
            .ok_or(LifecycleError::UnknownPosition(id))
    }

    /// Accepts an order, creating a `PendingOpen` position.
    pub fn submit(&mut self, leg: Leg, date: NaiveDate) -> PositionId {
        let id = PositionId(self.positions.len());
        self.positions.push(Position::pending(id, leg, date));
        self.pending.push(id);
        id
    }

    /// Fills a pending position at `price` per unit and pays `cost`.
    ///
    /// # Errors
    ///
    /// `LifecycleError` when the position is unknown or not pending.
    pub fn fill(&mut self, id: PositionId, price: f64, cost: f64) -> Result<(), LifecycleError> {
        let position = self.get_mut(id)?;
        position.fill(price, cost)?;
        let outlay = position.units() * price;
        self.cash -= outlay + cost;
        self.transaction_costs += cost;
        self.pending.retain(|p| *p != id);
        self.open.push(id);
        Ok(())
    }

    /// Updates the mark of an open position.
    ///
    /// # Errors
    ///
    /// `LifecycleError` when the position is unknown or not open.
    pub fn mark(
        &mut self,
        id: PositionId,
        price: f64,
        greeks: GreeksSet,
    ) -> Result<(), LifecycleError> {
        self.get_mut(id)?.update_mark(price, greeks)
    }

    /// Flags every open mark as carried forward.
    pub fn flag_stale(&mut self) {
        for id in &self.open {
            self.positions[id.0].stale = true;
        }
    }

    /// Closes an open position at `price` per unit, paying `cost`.
    ///
    /// Returns the realised P&L.
    ///
    /// # Errors
    ///
    /// `LifecycleError` when the position is unknown or not open.
    pub fn close(
        &mut self,
        id: PositionId,
        price: f64,
        cost: f64,
        date: NaiveDate,
    ) -> Result<f64, LifecycleError> {
        let pnl = self.finish(id, PositionState::Closed, price, cost, date)?;
        Ok(pnl)
    }

    fn finish(
        &mut self,
        id: PositionId,
        state: PositionState,
        price: f64,
        cost: f64,
        date: NaiveDate,
    ) -> Result<f64, LifecycleError> {
        let position = self.get_mut(id)?;
        let pnl = position.finish(state, price, cost, date)?;
        let proceeds = position.units() * price;
        self.cash += proceeds - cost;
        self.transaction_costs += cost;
        self.open.retain(|p| *p != id);
        self.closed.push(id);
        Ok(pnl)
    }

    /// Settles an open option position at expiry against `spot`.
    ///
    /// Out-of-the-money and at-the-money options expire worthless. In the
    /// money, long positions are exercised and short positions assigned:
    /// cash settlement pays the intrinsic value, physical settlement
    /// delivers the underlying at the strike as a new position marked at
    /// `spot`.
    ///
    /// # Errors
    ///
    /// `LifecycleError::NotAnOption` for an underlying position, or a
    /// transition error when the position is not open.
    pub fn settle_expiry(
        &mut self,
        id: PositionId,
        spot: f64,
        settlement: Settlement,
        date: NaiveDate,
    ) -> Result<ExpiryOutcome, LifecycleError> {
        let position = self.position(id).ok_or(LifecycleError::UnknownPosition(id))?;
        let Instrument::Option { contract } = &position.leg.instrument else {
            return Err(LifecycleError::NotAnOption(id));
        };
        let (option_type, strike) = (contract.option_type, contract.strike);
        let units = position.units();
        let intrinsic = option_type.intrinsic(spot, strike);

        if intrinsic <= 0.0 {
            let pnl = self.finish(id, PositionState::ExpiredWorthless, 0.0, 0.0, date)?;
            return Ok(ExpiryOutcome {
                state: PositionState::ExpiredWorthless,
                realised_pnl: pnl,
                cash_flow: 0.0,
                delivered: None,
            });
        }

        let state = if units > 0.0 {
            PositionState::Exercised
        } else {
            PositionState::Assigned
        };
        match settlement {
            Settlement::Cash => {
                let pnl = self.finish(id, state, intrinsic, 0.0, date)?;
                Ok(ExpiryOutcome {
                    state,
                    realised_pnl: pnl,
                    cash_flow: units * intrinsic,
                    delivered: None,
                })
            }
            Settlement::Physical => {
                let pnl = self.finish(id, state, 0.0, 0.0, date)?;
                let direction = match option_type {
                    OptionType::Call => 1.0,
                    OptionType::Put => -1.0,
                };
                let shares = units * direction;
                let delivered = self.submit(Leg::underlying(shares), date);
                self.fill(delivered, strike, 0.0)?;
                self.mark(delivered, spot, GreeksSet::underlying().scale(shares))?;
                Ok(ExpiryOutcome {
                    state,
                    realised_pnl: pnl,
                    cash_flow: 0.0,
                    delivered: Some(delivered),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pricer_core::market_data::OptionsContract;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
    }

    fn option(option_type: OptionType, strike: f64, quantity: f64) -> Leg {
        let contract = OptionsContract::new(
            format!("{}{}", option_type, strike),
            "XYZ",
            strike,
            date(16),
            option_type,
        );
        Leg::option(contract, quantity)
    }

    fn opened(portfolio: &mut Portfolio, leg: Leg, price: f64, cost: f64) -> PositionId {
        let id = portfolio.submit(leg, date(1));
        portfolio.fill(id, price, cost).unwrap();
        id
    }

    #[test]
    fn test_fill_moves_cash_and_lists() {
        let mut portfolio = Portfolio::new(10_000.0);
        let id = portfolio.submit(option(OptionType::Put, 95.0, 2.0), date(1));
        assert!(portfolio.open_ids().is_empty());
        assert_eq!(portfolio.position(id).unwrap().state, PositionState::PendingOpen);

        portfolio.fill(id, 1.5, 1.3).unwrap();
        assert_eq!(portfolio.open_ids(), &[id]);
        assert_relative_eq!(portfolio.cash(), 10_000.0 - 300.0 - 1.3, epsilon = 1e-9);
        assert_relative_eq!(portfolio.transaction_costs(), 1.3, epsilon = 1e-12);
        assert!(portfolio.fill(id, 1.5, 0.0).is_err());
    }

    #[test]
    fn test_unknown_position() {
        let mut portfolio = Portfolio::new(1.0);
        let err = portfolio.close(PositionId(9), 1.0, 0.0, date(2)).unwrap_err();
        assert_eq!(err, LifecycleError::UnknownPosition(PositionId(9)));
    }

    #[test]
    fn test_close_realises_pnl() {
        let mut portfolio = Portfolio::new(10_000.0);
        let id = opened(&mut portfolio, option(OptionType::Call, 100.0, 1.0), 3.0, 0.65);
        portfolio.mark(id, 4.0, GreeksSet::zero()).unwrap();
        assert_relative_eq!(portfolio.unrealised_pnl(), 100.0 - 0.65, epsilon = 1e-9);

        let pnl = portfolio.close(id, 4.2, 0.65, date(5)).unwrap();
        assert_relative_eq!(pnl, 120.0 - 1.3, epsilon = 1e-9);
        assert_eq!(portfolio.closed_ids(), &[id]);
        assert!(portfolio.open_ids().is_empty());
        assert_relative_eq!(portfolio.total_value(), 10_000.0 + pnl, epsilon = 1e-9);
        assert!(portfolio.reconciliation_error().abs() < 1e-9);
        assert!(portfolio.close(id, 4.2, 0.0, date(6)).is_err());
    }

    #[test]
    fn test_otm_short_call_expires_worthless() {
        let mut portfolio = Portfolio::new(0.0);
        let id = opened(&mut portfolio, option(OptionType::Call, 100.0, -1.0), 2.0, 0.65);
        let outcome = portfolio
            .settle_expiry(id, 100.0, Settlement::Cash, date(16))
            .unwrap();

        assert_eq!(outcome.state, PositionState::ExpiredWorthless);
        assert_eq!(outcome.cash_flow, 0.0);
        assert_relative_eq!(outcome.realised_pnl, 200.0 - 0.65, epsilon = 1e-9);
        assert!(portfolio.reconciliation_error().abs() < 1e-9);
    }

    #[test]
    fn test_cash_settlement_pays_intrinsic() {
        let mut portfolio = Portfolio::new(1_000.0);
        let long_put = opened(&mut portfolio, option(OptionType::Put, 100.0, 1.0), 2.0, 0.0);
        let short_call = opened(&mut portfolio, option(OptionType::Call, 90.0, -1.0), 8.0, 0.0);

        let put = portfolio
            .settle_expiry(long_put, 95.0, Settlement::Cash, date(16))
            .unwrap();
        assert_eq!(put.state, PositionState::Exercised);
        assert_relative_eq!(put.cash_flow, 500.0, epsilon = 1e-9);
        assert_relative_eq!(put.realised_pnl, 300.0, epsilon = 1e-9);

        let call = portfolio
            .settle_expiry(short_call, 95.0, Settlement::Cash, date(16))
            .unwrap();
        assert_eq!(call.state, PositionState::Assigned);
        assert_relative_eq!(call.cash_flow, -500.0, epsilon = 1e-9);
        assert_relative_eq!(call.realised_pnl, 300.0, epsilon = 1e-9);

        assert_relative_eq!(portfolio.cash(), 1_600.0, epsilon = 1e-9);
        assert!(portfolio.reconciliation_error().abs() < 1e-9);
    }

    #[test]
    fn test_physical_assignment_delivers_at_strike() {
        let mut portfolio = Portfolio::new(20_000.0);
        let shares = opened(&mut portfolio, Leg::underlying(100.0), 100.0, 0.0);
        let call = opened(&mut portfolio, option(OptionType::Call, 105.0, -1.0), 1.5, 0.0);
        portfolio
            .mark(shares, 110.0, GreeksSet::underlying().scale(100.0))
            .unwrap();

        let outcome = portfolio
            .settle_expiry(call, 110.0, Settlement::Physical, date(16))
            .unwrap();
        assert_eq!(outcome.state, PositionState::Assigned);
        assert_relative_eq!(outcome.realised_pnl, 150.0, epsilon = 1e-9);

        let delivered = portfolio.position(outcome.delivered.unwrap()).unwrap();
        assert_eq!(delivered.leg.quantity, -100.0);
        assert_eq!(delivered.entry_price, 105.0);
        assert_eq!(delivered.mark, 110.0);
        assert_eq!(portfolio.underlying_shares(), 0.0);
        assert_relative_eq!(portfolio.greeks().delta, 0.0, epsilon = 1e-12);
        // Shares called away at 105: 20_000 - 10_000 + 150 + 10_500
        assert_relative_eq!(portfolio.cash(), 20_650.0, epsilon = 1e-9);
        assert_relative_eq!(portfolio.total_value(), 20_650.0, epsilon = 1e-9);
        assert!(portfolio.reconciliation_error().abs() < 1e-9);
    }

    #[test]
    fn test_settle_underlying_rejected() {
        let mut portfolio = Portfolio::new(1_000.0);
        let id = opened(&mut portfolio, Leg::underlying(1.0), 100.0, 0.0);
        assert_eq!(
            portfolio.settle_expiry(id, 100.0, Settlement::Cash, date(16)),
            Err(LifecycleError::NotAnOption(id))
        );
    }

    #[test]
    fn test_greeks_sum_open_positions() {
        let mut portfolio = Portfolio::new(10_000.0);
        let a = opened(&mut portfolio, Leg::underlying(50.0), 100.0, 0.0);
        let b = opened(&mut portfolio, option(OptionType::Call, 100.0, -1.0), 2.0, 0.0);
        portfolio.mark(a, 100.0, GreeksSet::underlying().scale(50.0)).unwrap();
        portfolio
            .mark(
                b,
                2.0,
                GreeksSet {
                    delta: -45.0,
                    gamma: -3.0,
                    ..GreeksSet::zero()
                },
            )
            .unwrap();
        let greeks = portfolio.greeks();
        assert_relative_eq!(greeks.delta, 5.0, epsilon = 1e-12);
        assert_relative_eq!(greeks.gamma, -3.0, epsilon = 1e-12);
    }
}
