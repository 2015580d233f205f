//! Integration tests for the daily loop, expiry settlement and sweeps.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use pricer_backtest::{
    trading_dates, BacktestConfig, BacktestEngine, BacktestResults, CancellationToken,
    CoveredCall, InMemoryProvider, Order, PositionState, RunStatus, Settlement, ShortStraddle,
    Strategy, StrategyContext,
};
use pricer_core::market_data::{MarketData, OptionsContract};
use pricer_core::types::{OptionType, PricingInputs};
use pricer_models::analytical::BlackScholes;
use pricer_risk::Instrument;

const RATE: f64 = 0.03;
const VOL: f64 = 0.2;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn expiries() -> [NaiveDate; 2] {
    [day(3, 15), day(4, 19)]
}

fn model_price(spot: f64, strike: f64, t: f64, option_type: OptionType) -> f64 {
    BlackScholes
        .price(&PricingInputs::new(spot, strike, t, RATE, 0.0, VOL, option_type))
        .unwrap()
}

/// Flat-vol chain quoted 2% either side of the model price.
fn snapshot(on: NaiveDate, spot: f64) -> MarketData {
    let mut chain = Vec::new();
    for expiry in expiries() {
        if expiry < on {
            continue;
        }
        let t = (expiry - on).num_days() as f64 / 365.0;
        for strike in (80..=130).step_by(5).map(f64::from) {
            for option_type in [OptionType::Call, OptionType::Put] {
                let mid = model_price(spot, strike, t, option_type);
                if mid < 0.005 {
                    continue;
                }
                chain.push(
                    OptionsContract::new(
                        format!("XYZ{}{:?}{}", expiry.format("%y%m%d"), option_type, strike),
                        "XYZ",
                        strike,
                        expiry,
                        option_type,
                    )
                    .with_quote(mid * 0.98, mid * 1.02),
                );
            }
        }
    }
    MarketData::new("XYZ", on.and_hms_opt(16, 0, 0).unwrap(), spot, RATE, 0.0, chain).unwrap()
}

fn provider(start: NaiveDate, end: NaiveDate, spot: impl Fn(usize) -> f64) -> InMemoryProvider {
    InMemoryProvider::from_snapshots(
        trading_dates(start, end)
            .into_iter()
            .enumerate()
            .map(|(i, date)| snapshot(date, spot(i))),
    )
}

fn assert_reconciles(results: &BacktestResults) {
    for record in &results.snapshots {
        let pnl = record.realised_pnl + record.unrealised_pnl;
        let change = record.total_value - results.config.initial_cash;
        assert!(
            (pnl - change).abs() < 1e-6,
            "{}: P&L {} vs value change {}",
            record.date,
            pnl,
            change
        );
    }
}

// ==========================================================
// Expiry settlement
// ==========================================================

#[test]
fn test_covered_call_expires_worthless() {
    init_tracing();
    let (start, end) = (day(3, 1), day(3, 15));
    let dates = trading_dates(start, end);
    let last = dates.len() - 1;
    let provider = provider(start, end, |i| if i == last { 98.0 } else { 100.0 });

    let engine = BacktestEngine::new(BacktestConfig::new("XYZ", start, end)).unwrap();
    let mut strategy = CoveredCall::new(1.0, 14);
    let results = engine.run(&provider, &mut strategy).unwrap();
    assert_eq!(results.status, RunStatus::Completed);
    assert_eq!(results.snapshots.len(), dates.len());
    assert_reconciles(&results);

    let call = results
        .positions
        .iter()
        .find(|p| p.is_option())
        .expect("a call was written");
    let Instrument::Option { contract } = &call.leg.instrument else {
        unreachable!();
    };
    assert_eq!(contract.strike, 100.0);
    assert_eq!(contract.expiration, day(3, 15));

    // Sold at mid less half of the 2% half-spread, one contract commission
    let mid = model_price(100.0, 100.0, 14.0 / 365.0, OptionType::Call);
    assert_relative_eq!(call.entry_price, 0.99 * mid, epsilon = 1e-9);
    assert_eq!(call.entry_cost, 0.65);

    assert_eq!(call.state, PositionState::ExpiredWorthless);
    assert_eq!(call.exit_date, Some(day(3, 15)));
    assert_eq!(call.exit_price, Some(0.0));
    let premium = 100.0 * call.entry_price;
    assert_relative_eq!(call.realised_pnl.unwrap(), premium - 0.65, epsilon = 1e-9);

    // No cash moves on the expiry date
    let n = results.snapshots.len();
    assert_eq!(results.snapshots[n - 1].cash, results.snapshots[n - 2].cash);
    assert!(results
        .positions
        .iter()
        .all(|p| !matches!(p.state, PositionState::Exercised | PositionState::Assigned)));
}

#[test]
fn test_short_straddle_physical_assignment() {
    init_tracing();
    let (start, end) = (day(2, 1), day(3, 15));
    let n = trading_dates(start, end).len();
    let provider = provider(start, end, |i| 100.0 + 10.0 * i as f64 / (n - 1) as f64);

    let mut config = BacktestConfig::new("XYZ", start, end);
    config.settlement = Settlement::Physical;
    let engine = BacktestEngine::new(config).unwrap();
    let mut strategy = ShortStraddle {
        target_days: 40,
        profit_target: 1e9,
        stop_loss: 1e9,
        ..ShortStraddle::default()
    };
    let results = engine.run(&provider, &mut strategy).unwrap();
    assert_reconciles(&results);

    let state_of = |option_type: OptionType| {
        results
            .positions
            .iter()
            .find(|p| match &p.leg.instrument {
                Instrument::Option { contract } => contract.option_type == option_type,
                Instrument::Underlying => false,
            })
            .map(|p| p.state)
    };
    assert_eq!(state_of(OptionType::Call), Some(PositionState::Assigned));
    assert_eq!(state_of(OptionType::Put), Some(PositionState::ExpiredWorthless));

    // Assignment on the short call delivers 100 shares short at the strike
    let delivered = results
        .positions
        .iter()
        .find(|p| !p.is_option())
        .expect("shares delivered");
    assert_eq!(delivered.leg.quantity, -100.0);
    assert_eq!(delivered.entry_price, 100.0);
    assert_eq!(delivered.entry_date, day(3, 15));
    assert_eq!(delivered.state, PositionState::Open);
    assert_relative_eq!(delivered.mark, 110.0, epsilon = 1e-9);
}

// ==========================================================
// Failure handling and control
// ==========================================================

#[test]
fn test_data_gap_carries_marks() {
    init_tracing();
    let (start, end) = (day(2, 1), day(2, 9));
    let mut provider = provider(start, end, |_| 100.0);
    provider.remove(day(2, 6));

    let engine = BacktestEngine::new(BacktestConfig::new("XYZ", start, end)).unwrap();
    let results = engine.run(&provider, &mut CoveredCall::default()).unwrap();

    assert_eq!(results.diagnostics.data_gaps(), vec![day(2, 6)]);
    assert_eq!(results.snapshots.len(), trading_dates(start, end).len() - 1);
    assert!(results.snapshots.iter().all(|s| s.date != day(2, 6)));
    assert_eq!(results.data_quality.missing_dates, vec![day(2, 6)]);
    let anomalies = results.data_quality.anomalies.len() as f64;
    assert_relative_eq!(
        results.data_quality.quality_score,
        (0.9 - 0.05 * anomalies).max(0.0),
        epsilon = 1e-12
    );
    // Marks were refreshed after the gap
    assert!(results.positions.iter().all(|p| !p.stale));
    assert_reconciles(&results);
}

/// Delegates to a covered call and cancels the run after `after` dates.
struct CancelAfter {
    inner: CoveredCall,
    token: CancellationToken,
    after: usize,
    seen: usize,
}

impl Strategy for CancelAfter {
    fn name(&self) -> &str {
        "cancel_after"
    }

    fn risk_management(&mut self, ctx: &StrategyContext<'_>) -> Vec<Order> {
        self.inner.risk_management(ctx)
    }

    fn generate_signals(&mut self, ctx: &StrategyContext<'_>) -> Vec<Order> {
        self.seen += 1;
        if self.seen == self.after {
            self.token.cancel();
        }
        self.inner.generate_signals(ctx)
    }
}

#[test]
fn test_cancellation_at_date_boundary() {
    init_tracing();
    let (start, end) = (day(2, 1), day(2, 29));
    let provider = provider(start, end, |_| 100.0);
    let engine = BacktestEngine::new(BacktestConfig::new("XYZ", start, end)).unwrap();

    let token = CancellationToken::new();
    let mut strategy = CancelAfter {
        inner: CoveredCall::default(),
        token: token.clone(),
        after: 3,
        seen: 0,
    };
    let results = engine
        .run_with_cancel(&provider, &mut strategy, &token)
        .unwrap();

    assert_eq!(results.status, RunStatus::Cancelled);
    assert_eq!(results.snapshots.len(), 3);
    assert_eq!(results.metrics.total_return, results.final_value() / 100_000.0 - 1.0);
    assert!(serde_json::to_string(&results).is_ok());
}

// ==========================================================
// Determinism
// ==========================================================

#[test]
fn test_prefetch_does_not_change_results() {
    let (start, end) = (day(2, 1), day(3, 8));
    let provider = provider(start, end, |i| 100.0 + (i as f64 * 0.7).sin() * 4.0);

    let run = |window: usize| {
        let mut config = BacktestConfig::new("XYZ", start, end);
        config.prefetch_window = window;
        BacktestEngine::new(config)
            .unwrap()
            .run(&provider, &mut ShortStraddle::default())
            .unwrap()
    };
    let sequential = run(0);
    let prefetched = run(4);

    assert_eq!(sequential.snapshots, prefetched.snapshots);
    assert_eq!(sequential.positions, prefetched.positions);
    assert_eq!(sequential.metrics, prefetched.metrics);
    assert_eq!(sequential.diagnostics, prefetched.diagnostics);
}

#[test]
fn test_sweep_matches_individual_runs() {
    let (start, end) = (day(2, 1), day(2, 23));
    let provider = provider(start, end, |i| 100.0 - i as f64 * 0.3);

    let configs: Vec<BacktestConfig> = [50_000.0, 150_000.0]
        .iter()
        .map(|cash| {
            let mut config = BacktestConfig::new("XYZ", start, end);
            config.initial_cash = *cash;
            config
        })
        .collect();

    let sweep = BacktestEngine::run_sweep(&provider, &configs, |_| CoveredCall::default());
    assert_eq!(sweep.len(), 2);

    for (config, result) in configs.iter().zip(&sweep) {
        let result = result.as_ref().unwrap();
        assert_eq!(result.config.initial_cash, config.initial_cash);
        let single = BacktestEngine::new(config.clone())
            .unwrap()
            .run(&provider, &mut CoveredCall::default())
            .unwrap();
        assert_eq!(result, &single);
    }
}
