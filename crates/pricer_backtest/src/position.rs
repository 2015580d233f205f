//! Positions and their lifecycle.
//!
//! ```text
//! PendingOpen ──fill──▶ Open ──close──▶ Closed
//!                        │
//!                        └──expiry──▶ ExpiredWorthless | Exercised | Assigned
//! ```
//!
//! Terminal states are absorbing: once reached, the realised P&L is fixed
//! and every further transition is a [`LifecycleError`].
//!
//! P&L is net of the position's own transaction costs:
//!
//! ```text
//! unrealised = units × (mark - entry_price) - entry_cost
//! realised   = units × (exit_price - entry_price) - entry_cost - exit_cost
//! ```

use std::fmt;

use chrono::NaiveDate;
use pricer_core::types::GreeksSet;
use pricer_risk::{Instrument, Leg};
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;

/// Index of a position in its portfolio's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub usize);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    /// Order accepted, not yet filled.
    PendingOpen,
    /// Filled and marked daily.
    Open,
    /// Closed by an order before expiry.
    Closed,
    /// Reached expiry out of or at the money.
    ExpiredWorthless,
    /// Long option reached expiry in the money.
    Exercised,
    /// Short option reached expiry in the money.
    Assigned,
}

impl PositionState {
    /// Returns true for absorbing states.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PositionState::PendingOpen | PositionState::Open)
    }

    /// Returns true when the state machine allows `self → next`.
    pub fn can_transition_to(self, next: PositionState) -> bool {
        match (self, next) {
            (PositionState::PendingOpen, PositionState::Open) => true,
            (PositionState::Open, next) => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PositionState::PendingOpen => "pending_open",
            PositionState::Open => "open",
            PositionState::Closed => "closed",
            PositionState::ExpiredWorthless => "expired_worthless",
            PositionState::Exercised => "exercised",
            PositionState::Assigned => "assigned",
        };
        f.write_str(name)
    }
}

/// One holding and its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Arena index
    pub id: PositionId,
    /// Instrument and signed quantity
    pub leg: Leg,
    /// Lifecycle state
    pub state: PositionState,
    /// Date the order was accepted
    pub entry_date: NaiveDate,
    /// Fill price per unit
    pub entry_price: f64,
    /// Transaction costs paid on entry
    pub entry_cost: f64,
    /// Latest value per unit
    pub mark: f64,
    /// Latest position Greeks, already scaled by quantity and multiplier
    pub greeks: GreeksSet,
    /// True while the mark is carried over a data gap
    pub stale: bool,
    /// Date the position reached a terminal state
    pub exit_date: Option<NaiveDate>,
    /// Exit price or settlement value per unit
    pub exit_price: Option<f64>,
    /// Transaction costs paid on exit
    pub exit_cost: f64,
    /// P&L fixed at the terminal transition
    pub realised_pnl: Option<f64>,
}

impl Position {
    /// New position awaiting its fill.
    pub fn pending(id: PositionId, leg: Leg, entry_date: NaiveDate) -> Self {
        Self {
            id,
            leg,
            state: PositionState::PendingOpen,
            entry_date,
            entry_price: 0.0,
            entry_cost: 0.0,
            mark: 0.0,
            greeks: GreeksSet::zero(),
            stale: false,
            exit_date: None,
            exit_price: None,
            exit_cost: 0.0,
            realised_pnl: None,
        }
    }

    /// Signed quantity times multiplier.
    #[inline]
    pub fn units(&self) -> f64 {
        self.leg.quantity * self.leg.multiplier()
    }

    /// Returns true for an option position.
    pub fn is_option(&self) -> bool {
        matches!(self.leg.instrument, Instrument::Option { .. })
    }

    /// Returns true while the position is filled and not terminal.
    pub fn is_open(&self) -> bool {
        self.state == PositionState::Open
    }

    /// Current value: units × mark while open, zero otherwise.
    pub fn market_value(&self) -> f64 {
        if self.is_open() {
            self.units() * self.mark
        } else {
            0.0
        }
    }

    /// Mark-to-market P&L of an open position.
    pub fn unrealised_pnl(&self) -> f64 {
        if self.is_open() {
            self.units() * (self.mark - self.entry_price) - self.entry_cost
        } else {
            0.0
        }
    }

    fn transition(&mut self, to: PositionState) -> Result<(), LifecycleError> {
        if !self.state.can_transition_to(to) {
            return Err(LifecycleError::IllegalTransition {
                id: self.id,
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// PendingOpen → Open at `price` per unit, paying `cost`.
    ///
    /// The initial mark is the fill price.
    pub fn fill(&mut self, price: f64, cost: f64) -> Result<(), LifecycleError> {
        self.transition(PositionState::Open)?;
        self.entry_price = price;
        self.entry_cost = cost;
        self.mark = price;
        Ok(())
    }

    /// Updates the mark and Greeks of an open position.
    pub fn update_mark(&mut self, mark: f64, greeks: GreeksSet) -> Result<(), LifecycleError> {
        if !self.is_open() {
            return Err(LifecycleError::IllegalTransition {
                id: self.id,
                from: self.state,
                to: PositionState::Open,
            });
        }
        self.mark = mark;
        self.greeks = greeks;
        self.stale = false;
        Ok(())
    }

    /// Open → terminal `state`, exiting at `price` per unit and paying
    /// `cost`. Returns the realised P&L.
    pub fn finish(
        &mut self,
        state: PositionState,
        price: f64,
        cost: f64,
        date: NaiveDate,
    ) -> Result<f64, LifecycleError> {
        if !state.is_terminal() {
            return Err(LifecycleError::IllegalTransition {
                id: self.id,
                from: self.state,
                to: state,
            });
        }
        self.transition(state)?;
        let pnl = self.units() * (price - self.entry_price) - self.entry_cost - cost;
        self.exit_date = Some(date);
        self.exit_price = Some(price);
        self.exit_cost = cost;
        self.mark = price;
        self.greeks = GreeksSet::zero();
        self.stale = false;
        self.realised_pnl = Some(pnl);
        Ok(pnl)
    }
}
