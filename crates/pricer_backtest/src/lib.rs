//! # Pricer Backtest (L4: Application)
//!
//! Position lifecycle, strategies and deterministic historical simulation.
//!
//! This crate provides:
//! - [`Portfolio`]: an arena of [`Position`]s moving through
//!   `PendingOpen → Open → {Closed, ExpiredWorthless, Exercised, Assigned}`
//! - [`Strategy`]: the decision interface, with [`CoveredCall`] and
//!   [`ShortStraddle`] implementations
//! - [`BacktestEngine`]: the daily mark / decide / transition / record loop,
//!   parameter sweeps and surface prefetch
//! - [`PerformanceMetrics`] and a [`DataQualityReport`](pricer_core::market_data::DataQualityReport)
//!   computed once from the full run history
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             pricer_backtest (L4)            │
//! ├─────────────────────────────────────────────┤
//! │  config      - TOML run settings            │
//! │  position    - State machine                │
//! │  portfolio   - Arena, cash, settlement      │
//! │  execution   - Orders, spread, commissions  │
//! │  strategy/   - Strategy trait and library   │
//! │  engine      - Daily loop, sweeps, prefetch │
//! │  metrics     - Returns, ratios, VaR / ES    │
//! │  diagnostics - Gaps, fallbacks, rejections  │
//! └─────────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────────┐
//! │   pricer_risk (L4)   pricer_surface (L3)    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## P&L identity
//!
//! Every cash movement belongs to one position and position P&L is net of
//! its own transaction costs, so after every processed date
//! `Σ realised + Σ unrealised = total value - initial cash`.
//!
//! ## Example
//!
//! ```
//! use pricer_backtest::{BacktestConfig, BacktestEngine, InMemoryProvider, ShortStraddle};
//!
//! let config = BacktestConfig::from_toml_str(
//!     r#"
//!     ticker = "SPY"
//!     start_date = "2024-01-08"
//!     end_date = "2024-01-12"
//!     prefetch_window = 5
//!
//!     [model]
//!     model = "binomial_tree"
//!     steps = 101
//!     "#,
//! )
//! .unwrap();
//! let engine = BacktestEngine::new(config).unwrap();
//!
//! let mut strategy = ShortStraddle::default();
//! let results = engine.run(&InMemoryProvider::new(), &mut strategy).unwrap();
//! assert_eq!(results.strategy, "short_straddle");
//! assert_eq!(results.data_quality.missing_dates.len(), 5);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

mod config;
mod diagnostics;
mod engine;
mod error;
mod execution;
mod metrics;
mod portfolio;
mod position;
mod provider;
pub mod strategy;

pub use config::{BacktestConfig, Settlement, DEFAULT_INITIAL_CASH, DEFAULT_VAR_CONFIDENCE};
pub use diagnostics::{DiagnosticEvent, Diagnostics};
pub use engine::{
    trading_dates, BacktestEngine, BacktestResults, CancellationToken, PortfolioSnapshot,
    RunStatus,
};
pub use error::{BacktestError, ConfigError, LifecycleError};
pub use execution::{Order, TransactionCostModel};
pub use metrics::PerformanceMetrics;
pub use portfolio::{ExpiryOutcome, Portfolio};
pub use position::{Position, PositionId, PositionState};
pub use provider::{InMemoryProvider, MarketDataProvider};
pub use strategy::{CoveredCall, ShortStraddle, Strategy, StrategyContext};
