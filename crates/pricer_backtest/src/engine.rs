//! Historical simulation driver.
//!
//! # Daily order
//!
//! Every simulated weekday runs the same fixed sequence:
//!
//! 1. Refresh the snapshot and its validated surface
//! 2. Mark every open position with the configured model
//! 3. Ask the strategy for exits, then for new entries
//! 4. Apply transitions: fills, then closes, then expirations
//! 5. Record a [`PortfolioSnapshot`]
//!
//! A date without a snapshot, or without any validated surface, is skipped:
//! marks are carried forward and flagged stale, and a
//! [`DiagnosticEvent::DataGap`] is logged. Only model exhaustion aborts a run.
//!
//! # Prefetch
//!
//! With `prefetch_window = n > 0`, snapshots and surfaces for the next `n`
//! dates are fetched and built in parallel before the engine steps through
//! them. Surface builds are pure, so results do not depend on the window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};
use pricer_core::market_data::{DataQualityReport, MarketData};
use pricer_core::types::GreeksSet;
use pricer_risk::{GreeksCalculator, Instrument, Leg, LegRisk, MarketState};
use pricer_surface::{SurfaceBuild, SurfaceBuilder, SurfaceError, VolatilitySurface};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BacktestConfig;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{BacktestError, ConfigError};
use crate::execution::Order;
use crate::metrics::PerformanceMetrics;
use crate::portfolio::Portfolio;
use crate::position::{Position, PositionId};
use crate::provider::MarketDataProvider;
use crate::strategy::{Strategy, StrategyContext};

/// Shared flag that stops a run at the next date boundary.
///
/// # Examples
/// ```
/// use pricer_backtest::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every run holding a clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every date in the range was processed.
    Completed,
    /// Stopped by a [`CancellationToken`]; results cover the completed dates.
    Cancelled,
}

/// Portfolio state recorded at the end of a simulated date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Simulation date
    pub date: NaiveDate,
    /// Cash balance
    pub cash: f64,
    /// Σ units × mark of open positions
    pub market_value: f64,
    /// Cash plus market value
    pub total_value: f64,
    /// Σ realised P&L to date
    pub realised_pnl: f64,
    /// Σ unrealised P&L of open positions
    pub unrealised_pnl: f64,
    /// Transaction costs paid to date
    pub transaction_costs: f64,
    /// Aggregated Greeks of open positions
    pub greeks: GreeksSet,
    /// Number of open positions
    pub open_positions: usize,
}

impl PortfolioSnapshot {
    fn capture(date: NaiveDate, portfolio: &Portfolio) -> Self {
        Self {
            date,
            cash: portfolio.cash(),
            market_value: portfolio.market_value(),
            total_value: portfolio.total_value(),
            realised_pnl: portfolio.realised_pnl(),
            unrealised_pnl: portfolio.unrealised_pnl(),
            transaction_costs: portfolio.transaction_costs(),
            greeks: portfolio.greeks(),
            open_positions: portfolio.open_ids().len(),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResults {
    /// Strategy name
    pub strategy: String,
    /// Configuration of the run
    pub config: BacktestConfig,
    /// Completion status
    pub status: RunStatus,
    /// One snapshot per processed date
    pub snapshots: Vec<PortfolioSnapshot>,
    /// Every position of the run, indexed by id
    pub positions: Vec<Position>,
    /// Performance statistics over the snapshots
    pub metrics: PerformanceMetrics,
    /// Recoverable events, in order
    pub diagnostics: Diagnostics,
    /// Data quality summary of the run
    pub data_quality: DataQualityReport,
}

impl BacktestResults {
    /// Total value after the last processed date.
    pub fn final_value(&self) -> f64 {
        self.snapshots
            .last()
            .map_or(self.config.initial_cash, |s| s.total_value)
    }
}

/// Weekdays from `start` to `end`, inclusive.
pub fn trading_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

/// Data fetched and built for one date, possibly ahead of time.
struct PreparedDay {
    date: NaiveDate,
    snapshot: Option<MarketData>,
    surface: Option<Result<SurfaceBuild, SurfaceError>>,
}

/// Runs strategies over a historical date range.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use pricer_backtest::{
///     BacktestConfig, BacktestEngine, CoveredCall, InMemoryProvider, RunStatus,
/// };
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
/// let engine = BacktestEngine::new(BacktestConfig::new("SPY", start, end)).unwrap();
///
/// // No data at all: every weekday is a gap and nothing trades
/// let results = engine
///     .run(&InMemoryProvider::new(), &mut CoveredCall::default())
///     .unwrap();
/// assert_eq!(results.status, RunStatus::Completed);
/// assert!(results.snapshots.is_empty());
/// assert_eq!(results.diagnostics.data_gaps().len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: BacktestConfig,
    calculator: GreeksCalculator,
    builder: SurfaceBuilder,
}

impl BacktestEngine {
    /// Creates an engine for a validated configuration.
    ///
    /// # Errors
    ///
    /// `BacktestError::Config` when the configuration is invalid.
    pub fn new(config: BacktestConfig) -> Result<Self, BacktestError> {
        config.validate()?;
        let model = config.pricing_model()?;
        let builder =
            SurfaceBuilder::new(config.surface).map_err(|e| ConfigError::InvalidParameter {
                name: "surface",
                reason: e.to_string(),
            })?;
        Ok(Self {
            config,
            calculator: GreeksCalculator::new(model),
            builder,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Runs `strategy` over the configured range.
    ///
    /// # Errors
    ///
    /// See [`run_with_cancel`](Self::run_with_cancel).
    pub fn run<P>(
        &self,
        provider: &P,
        strategy: &mut dyn Strategy,
    ) -> Result<BacktestResults, BacktestError>
    where
        P: MarketDataProvider + ?Sized,
    {
        self.run_with_cancel(provider, strategy, &CancellationToken::new())
    }

    /// Runs `strategy`, stopping at the first date boundary after `cancel`
    /// is triggered.
    ///
    /// # Errors
    ///
    /// - `BacktestError::FatalModelFailure` when every model fails on a
    ///   position
    /// - `BacktestError::Valuation` for other valuation failures
    pub fn run_with_cancel<P>(
        &self,
        provider: &P,
        strategy: &mut dyn Strategy,
        cancel: &CancellationToken,
    ) -> Result<BacktestResults, BacktestError>
    where
        P: MarketDataProvider + ?Sized,
    {
        let config = &self.config;
        info!(
            strategy = strategy.name(),
            ticker = %config.ticker,
            start = %config.start_date,
            end = %config.end_date,
            model = %self.calculator.model().id(),
            "backtest started"
        );

        let mut run = RunState::new(config.initial_cash);
        let dates = trading_dates(config.start_date, config.end_date);
        let window = config.prefetch_window.max(1);
        let mut status = RunStatus::Completed;

        'dates: for chunk in dates.chunks(window) {
            let prepared: Vec<PreparedDay> = if config.prefetch_window > 0 {
                chunk
                    .par_iter()
                    .map(|date| self.prepare(provider, *date))
                    .collect()
            } else {
                chunk.iter().map(|date| self.prepare(provider, *date)).collect()
            };

            for day in prepared {
                if cancel.is_cancelled() {
                    warn!(date = %day.date, "backtest cancelled");
                    status = RunStatus::Cancelled;
                    break 'dates;
                }
                self.step(&mut run, day, strategy)?;
            }
        }

        self.finish(run, strategy.name(), status)
    }

    /// Runs one independent backtest per configuration in parallel.
    ///
    /// Each run owns its portfolio and a strategy from `make_strategy`.
    /// Results are in configuration order.
    pub fn run_sweep<P, S, F>(
        provider: &P,
        configs: &[BacktestConfig],
        make_strategy: F,
    ) -> Vec<Result<BacktestResults, BacktestError>>
    where
        P: MarketDataProvider + ?Sized,
        S: Strategy,
        F: Fn(&BacktestConfig) -> S + Sync,
    {
        Self::run_sweep_with_cancel(provider, configs, make_strategy, &CancellationToken::new())
    }

    /// [`run_sweep`](Self::run_sweep) sharing one cancellation token.
    pub fn run_sweep_with_cancel<P, S, F>(
        provider: &P,
        configs: &[BacktestConfig],
        make_strategy: F,
        cancel: &CancellationToken,
    ) -> Vec<Result<BacktestResults, BacktestError>>
    where
        P: MarketDataProvider + ?Sized,
        S: Strategy,
        F: Fn(&BacktestConfig) -> S + Sync,
    {
        configs
            .par_iter()
            .map(|config| {
                let engine = BacktestEngine::new(config.clone())?;
                let mut strategy = make_strategy(config);
                engine.run_with_cancel(provider, &mut strategy, cancel)
            })
            .collect()
    }

    fn prepare<P>(&self, provider: &P, date: NaiveDate) -> PreparedDay
    where
        P: MarketDataProvider + ?Sized,
    {
        let snapshot = provider.snapshot(date);
        let surface = snapshot
            .as_ref()
            .map(|s| self.builder.build_from_snapshot(s));
        PreparedDay {
            date,
            snapshot,
            surface,
        }
    }

    fn step(
        &self,
        run: &mut RunState,
        day: PreparedDay,
        strategy: &mut dyn Strategy,
    ) -> Result<(), BacktestError> {
        let date = day.date;
        let (Some(snapshot), Some(build)) = (day.snapshot, day.surface) else {
            run.gap(date, "no market snapshot".to_string());
            return Ok(());
        };
        run.records += snapshot.chain.len();

        let surface = match build {
            Ok(build) => {
                for anomaly in &build.anomalies {
                    run.diagnostics.push(DiagnosticEvent::ExcludedQuote {
                        date,
                        symbol: anomaly.symbol.clone(),
                        reason: anomaly.reason.to_string(),
                    });
                }
                run.last_surface = Some((date, build.surface));
                run.last_surface.as_ref().map(|(_, s)| s)
            }
            Err(err) => match &run.last_surface {
                Some((surface_date, _)) => {
                    warn!(%date, surface_date = %surface_date, error = %err, "reusing last validated surface");
                    run.diagnostics.push(DiagnosticEvent::StaleSurface {
                        date,
                        surface_date: *surface_date,
                        reason: err.to_string(),
                    });
                    run.last_surface.as_ref().map(|(_, s)| s)
                }
                None => None,
            },
        };
        let Some(surface) = surface.cloned() else {
            run.gap(date, "no validated surface".to_string());
            return Ok(());
        };

        let market = MarketState::from_snapshot(&snapshot);
        self.mark(run, date, &market, &surface)?;

        let orders = {
            let ctx = StrategyContext {
                date,
                snapshot: &snapshot,
                surface: &surface,
                portfolio: &run.portfolio,
            };
            let mut orders = strategy.risk_management(&ctx);
            orders.extend(strategy.generate_signals(&ctx));
            orders
        };

        let (opens, closes): (Vec<Order>, Vec<Order>) = orders
            .into_iter()
            .partition(|o| matches!(o, Order::Open { .. }));
        for order in opens {
            if let Order::Open { leg } = order {
                self.fill(run, date, &snapshot, &market, &surface, leg)?;
            }
        }
        for order in closes {
            if let Order::Close { id } = order {
                self.close(run, date, &snapshot, id);
            }
        }
        self.expire(run, date, snapshot.spot)?;

        let record = PortfolioSnapshot::capture(date, &run.portfolio);
        debug!(
            %date,
            total_value = record.total_value,
            open = record.open_positions,
            delta = record.greeks.delta,
            "date processed"
        );
        run.snapshots.push(record);
        Ok(())
    }

    fn value(
        &self,
        run: &mut RunState,
        date: NaiveDate,
        leg: &Leg,
        market: &MarketState,
        surface: &VolatilitySurface,
    ) -> Result<LegRisk, BacktestError> {
        let risk = self
            .calculator
            .leg_risk(leg, market, surface)
            .map_err(|e| BacktestError::from_risk(date, e))?;
        if risk.fallback {
            run.fallback(date, leg, self.calculator.model().id());
        }
        Ok(risk)
    }

    fn mark(
        &self,
        run: &mut RunState,
        date: NaiveDate,
        market: &MarketState,
        surface: &VolatilitySurface,
    ) -> Result<(), BacktestError> {
        let calculator = &self.calculator;
        let portfolio = &run.portfolio;
        let marks: Vec<(PositionId, LegRisk)> = portfolio
            .open_ids()
            .par_iter()
            .map(|id| {
                let leg = &portfolio.positions()[id.0].leg;
                calculator.leg_risk(leg, market, surface).map(|r| (*id, r))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BacktestError::from_risk(date, e))?;

        let model = calculator.model().id();
        for (id, risk) in marks {
            if risk.fallback {
                let leg = run.portfolio.positions()[id.0].leg.clone();
                run.fallback(date, &leg, model);
            }
            run.portfolio.mark(id, risk.unit_price, risk.greeks)?;
        }
        Ok(())
    }

    fn fill(
        &self,
        run: &mut RunState,
        date: NaiveDate,
        snapshot: &MarketData,
        market: &MarketState,
        surface: &VolatilitySurface,
        leg: Leg,
    ) -> Result<(), BacktestError> {
        if !(leg.quantity.is_finite() && leg.quantity != 0.0) {
            run.reject(date, None, format!("invalid quantity {}", leg.quantity));
            return Ok(());
        }
        let (bid, ask) = match &leg.instrument {
            Instrument::Underlying => (snapshot.spot, snapshot.spot),
            Instrument::Option { contract } => match snapshot.contract(&contract.symbol) {
                Some(quote) if quote.is_expired_on(date) => {
                    run.reject(date, None, format!("{} has expired", contract.symbol));
                    return Ok(());
                }
                Some(quote) if quote.has_two_sided_quote() => (quote.bid, quote.ask),
                _ => {
                    run.reject(date, None, format!("no two-sided quote for {}", contract.symbol));
                    return Ok(());
                }
            },
        };

        let costs = &self.config.costs;
        let price = costs.fill_price(bid, ask, leg.quantity);
        let cost = costs.commission(&leg.instrument, leg.quantity);
        let risk = self.value(run, date, &leg, market, surface)?;

        let id = run.portfolio.submit(leg, date);
        run.portfolio.fill(id, price, cost)?;
        run.portfolio.mark(id, risk.unit_price, risk.greeks)?;
        debug!(%date, position = %id, price, cost, "order filled");
        Ok(())
    }

    fn close(&self, run: &mut RunState, date: NaiveDate, snapshot: &MarketData, id: PositionId) {
        let Some(position) = run.portfolio.position(id) else {
            run.reject(date, Some(id), format!("unknown position {}", id));
            return;
        };
        let closing_side = -position.leg.quantity;
        let price = match &position.leg.instrument {
            Instrument::Underlying => snapshot.spot,
            Instrument::Option { contract } => snapshot
                .contract(&contract.symbol)
                .filter(|q| q.has_two_sided_quote())
                .map_or(position.mark, |q| {
                    self.config.costs.fill_price(q.bid, q.ask, closing_side)
                }),
        };
        let cost = self
            .config
            .costs
            .commission(&position.leg.instrument, closing_side);

        match run.portfolio.close(id, price, cost, date) {
            Ok(pnl) => debug!(%date, position = %id, price, pnl, "position closed"),
            Err(err) => run.reject(date, Some(id), err.to_string()),
        }
    }

    fn expire(&self, run: &mut RunState, date: NaiveDate, spot: f64) -> Result<(), BacktestError> {
        let expiring: Vec<PositionId> = run
            .portfolio
            .open_positions()
            .filter(|p| match &p.leg.instrument {
                Instrument::Option { contract } => contract.is_expired_on(date),
                Instrument::Underlying => false,
            })
            .map(|p| p.id)
            .collect();

        for id in expiring {
            let outcome = run
                .portfolio
                .settle_expiry(id, spot, self.config.settlement, date)?;
            info!(
                %date,
                position = %id,
                state = %outcome.state,
                pnl = outcome.realised_pnl,
                "option expired"
            );
        }
        Ok(())
    }

    fn finish(
        &self,
        run: RunState,
        strategy: &str,
        status: RunStatus,
    ) -> Result<BacktestResults, BacktestError> {
        let config = &self.config;
        let equity: Vec<f64> = run.snapshots.iter().map(|s| s.total_value).collect();
        let trades: Vec<f64> = run
            .portfolio
            .closed_positions()
            .filter_map(|p| p.realised_pnl)
            .collect();
        let metrics = PerformanceMetrics::compute(
            config.initial_cash,
            &equity,
            &trades,
            config.risk_free_rate,
            config.var_confidence,
        );
        let data_quality = run
            .diagnostics
            .quality_report(&config.ticker, config.start_date, config.end_date, run.records)
            .map_err(|e| ConfigError::InvalidParameter {
                name: "ticker",
                reason: e.to_string(),
            })?;

        info!(
            strategy,
            status = ?status,
            dates = run.snapshots.len(),
            trades = trades.len(),
            total_return = metrics.total_return,
            gaps = data_quality.missing_dates.len(),
            fallbacks = run.diagnostics.fallback_count(),
            "backtest finished"
        );

        Ok(BacktestResults {
            strategy: strategy.to_string(),
            config: config.clone(),
            status,
            snapshots: run.snapshots,
            positions: run.portfolio.positions().to_vec(),
            metrics,
            diagnostics: run.diagnostics,
            data_quality,
        })
    }
}

/// Mutable state of one run.
struct RunState {
    portfolio: Portfolio,
    diagnostics: Diagnostics,
    snapshots: Vec<PortfolioSnapshot>,
    last_surface: Option<(NaiveDate, VolatilitySurface)>,
    records: usize,
}

impl RunState {
    fn new(initial_cash: f64) -> Self {
        Self {
            portfolio: Portfolio::new(initial_cash),
            diagnostics: Diagnostics::new(),
            snapshots: Vec::new(),
            last_surface: None,
            records: 0,
        }
    }

    fn gap(&mut self, date: NaiveDate, reason: String) {
        warn!(%date, reason = %reason, "data gap, marks carried forward");
        self.portfolio.flag_stale();
        self.diagnostics.push(DiagnosticEvent::DataGap { date, reason });
    }

    fn fallback(&mut self, date: NaiveDate, leg: &Leg, model: pricer_pricing::ModelId) {
        let symbol = leg.symbol().unwrap_or_default().to_string();
        warn!(%date, symbol = %symbol, model = %model, "model failed, Black-Scholes fallback used");
        self.diagnostics.push(DiagnosticEvent::ModelFallback {
            date,
            symbol,
            model,
        });
    }

    fn reject(&mut self, date: NaiveDate, position: Option<PositionId>, reason: String) {
        warn!(%date, reason = %reason, "order rejected");
        self.diagnostics.push(DiagnosticEvent::OrderRejected {
            date,
            position,
            reason,
        });
    }
}
