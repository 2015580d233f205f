//! # Pricer Risk (L4: Application)
//!
//! Position Greeks, portfolio aggregation and scenario analysis.
//!
//! This crate provides:
//! - [`GreeksCalculator`]: per-contract price and Greeks from a
//!   [`PricingModel`](pricer_pricing::PricingModel), with volatility read off a
//!   [`VolatilitySurface`](pricer_surface::VolatilitySurface)
//! - [`PortfolioRisk`]: Σ quantity × multiplier × Greeks over a set of [`Leg`]s
//! - [`ScenarioEngine`]: revaluation under spot, volatility, rate and
//!   time-decay shifts, plus a standard stress ladder
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            pricer_risk (L4)             │
//! ├─────────────────────────────────────────┤
//! │  calculator  - Contract & book Greeks   │
//! │  portfolio/  - Legs and aggregation     │
//! │  scenarios/  - Shifts, presets, engine  │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │   pricer_pricing (L3) pricer_surface (L3)│
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Performance
//!
//! Legs are valued in parallel with Rayon and summed in input order, so the
//! aggregate is identical for any thread count.
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use pricer_core::market_data::{MarketData, OptionsContract};
//! use pricer_core::types::{OptionType, PricingInputs};
//! use pricer_models::analytical::BlackScholes;
//! use pricer_risk::{GreeksCalculator, Leg, MarketState, PresetScenarioType, ScenarioEngine};
//! use pricer_surface::SurfaceBuilder;
//!
//! let now = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(16, 0, 0).unwrap();
//! let expiry = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
//! let t = 73.0 / 365.0;
//! let chain: Vec<OptionsContract> = [470.0, 480.0, 490.0, 500.0]
//!     .iter()
//!     .map(|&k| {
//!         let mid = BlackScholes
//!             .price(&PricingInputs::new(475.0, k, t, 0.05, 0.0, 0.16, OptionType::Put))
//!             .unwrap();
//!         OptionsContract::new(format!("P{}", k), "SPY", k, expiry, OptionType::Put)
//!             .with_quote(mid, mid)
//!     })
//!     .collect();
//! let snapshot = MarketData::new("SPY", now, 475.0, 0.05, 0.0, chain).unwrap();
//! let surface = SurfaceBuilder::default()
//!     .build_from_snapshot(&snapshot)
//!     .unwrap()
//!     .into_surface();
//!
//! // Protective put: 100 shares plus one put
//! let market = MarketState::from_snapshot(&snapshot);
//! let book = vec![
//!     Leg::underlying(100.0),
//!     Leg::option(snapshot.chain[1].clone(), 1.0),
//! ];
//!
//! let engine = ScenarioEngine::new(GreeksCalculator::default());
//! let crash = PresetScenarioType::Crash.scenario();
//! let result = engine.run_scenario(&book, &market, &surface, &crash).unwrap();
//!
//! // The put offsets part of the share loss
//! assert!(result.pnl < 0.0);
//! assert!(result.pnl > -0.2 * 475.0 * 100.0);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

mod calculator;
mod error;
mod market;
pub mod portfolio;
pub mod scenarios;

pub use calculator::GreeksCalculator;
pub use error::RiskError;
pub use market::MarketState;
pub use portfolio::{Instrument, Leg, LegRisk, PortfolioRisk};
pub use scenarios::{
    standard_scenarios, PresetScenarioType, Scenario, ScenarioEngine, ScenarioResult,
};
