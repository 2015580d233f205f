//! Scenario execution engine.
//!
//! Scenarios revalue a set of legs against a shifted copy of the market.
//! The legs, the base market and the surface are only borrowed, so a run
//! never changes the book it analyses.

use pricer_core::types::GreeksSet;
use pricer_surface::VolatilitySurface;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::shifts::Scenario;
use crate::calculator::GreeksCalculator;
use crate::error::RiskError;
use crate::market::MarketState;
use crate::portfolio::Leg;

/// Value and Greeks of a book under one scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario that was executed
    pub scenario: Scenario,
    /// Value before the scenario
    pub base_value: f64,
    /// Value after the scenario
    pub value: f64,
    /// P&L (value - base)
    pub pnl: f64,
    /// P&L as a fraction of the absolute base value
    pub pnl_pct: f64,
    /// Greeks after the scenario
    pub greeks: GreeksSet,
}

impl ScenarioResult {
    fn new(scenario: Scenario, base_value: f64, value: f64, greeks: GreeksSet) -> Self {
        let pnl = value - base_value;
        let pnl_pct = if base_value != 0.0 {
            pnl / base_value.abs()
        } else {
            0.0
        };
        Self {
            scenario,
            base_value,
            value,
            pnl,
            pnl_pct,
            greeks,
        }
    }

    /// Check if P&L is a loss (negative).
    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }
}

/// Runs scenarios against a book with one calculator.
///
/// # Examples
///
/// ```
/// # use chrono::NaiveDate;
/// # use pricer_core::market_data::OptionsContract;
/// # use pricer_core::types::{OptionType, PricingInputs};
/// # use pricer_models::analytical::BlackScholes;
/// # use pricer_surface::SurfaceBuilder;
/// use pricer_risk::{standard_scenarios, GreeksCalculator, Leg, MarketState, ScenarioEngine};
///
/// # let now = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(16, 0, 0).unwrap();
/// # let expiry = NaiveDate::from_ymd_opt(2024, 7, 2).unwrap();
/// # let t = 182.0 / 365.0;
/// # let chain: Vec<OptionsContract> = [90.0, 100.0, 110.0]
/// #     .iter()
/// #     .map(|&k| {
/// #         let mid = BlackScholes
/// #             .price(&PricingInputs::new(100.0, k, t, 0.03, 0.0, 0.2, OptionType::Call))
/// #             .unwrap();
/// #         OptionsContract::new(format!("C{}", k), "SPY", k, expiry, OptionType::Call)
/// #             .with_quote(mid, mid)
/// #     })
/// #     .collect();
/// # let surface = SurfaceBuilder::default()
/// #     .build(&chain, 100.0, now, 0.03, 0.0)
/// #     .unwrap()
/// #     .into_surface();
/// let market = MarketState::new(100.0, 0.03, 0.0, now);
/// let book = vec![Leg::option(chain[1].clone(), 1.0)];
/// let engine = ScenarioEngine::new(GreeksCalculator::default());
///
/// let results = engine
///     .run_scenarios(&book, &market, &surface, &standard_scenarios())
///     .unwrap();
/// // A long call gains when spot rises
/// assert!(results[0].pnl > 0.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScenarioEngine {
    calculator: GreeksCalculator,
}

impl ScenarioEngine {
    /// Create a new scenario engine.
    pub fn new(calculator: GreeksCalculator) -> Self {
        Self { calculator }
    }

    /// Returns the calculator.
    pub fn calculator(&self) -> &GreeksCalculator {
        &self.calculator
    }

    /// Revalues `legs` under `scenario`.
    ///
    /// # Errors
    ///
    /// * `RiskError::InvalidScenario` - Shifts out of range
    /// * Any error from valuing the base or shifted book
    pub fn run_scenario(
        &self,
        legs: &[Leg],
        market: &MarketState,
        surface: &VolatilitySurface,
        scenario: &Scenario,
    ) -> Result<ScenarioResult, RiskError> {
        let base = self.calculator.portfolio_risk(legs, market, surface)?;
        self.revalue(legs, market, surface, scenario, base.value)
    }

    /// Revalues `legs` under each scenario in parallel.
    ///
    /// The base book is valued once. Results follow the order of `scenarios`.
    ///
    /// # Errors
    ///
    /// An error from any scenario; the others are discarded.
    pub fn run_scenarios(
        &self,
        legs: &[Leg],
        market: &MarketState,
        surface: &VolatilitySurface,
        scenarios: &[Scenario],
    ) -> Result<Vec<ScenarioResult>, RiskError> {
        let base = self.calculator.portfolio_risk(legs, market, surface)?;
        scenarios
            .par_iter()
            .map(|scenario| self.revalue(legs, market, surface, scenario, base.value))
            .collect()
    }

    fn revalue(
        &self,
        legs: &[Leg],
        market: &MarketState,
        surface: &VolatilitySurface,
        scenario: &Scenario,
        base_value: f64,
    ) -> Result<ScenarioResult, RiskError> {
        scenario.validate()?;
        let shifted = scenario.apply(market);
        let risk =
            self.calculator
                .portfolio_risk_shifted(legs, &shifted, surface, scenario.vol_shift)?;
        let result = ScenarioResult::new(scenario.clone(), base_value, risk.value, risk.greeks);
        debug!(
            scenario = %scenario.name,
            pnl = result.pnl,
            "scenario revalued"
        );
        Ok(result)
    }
}
