//! End-of-run performance statistics.
//!
//! Everything is recomputed from the full equity history in one pass over
//! the recorded snapshots; nothing is accumulated while the run is in
//! progress.
//!
//! Ratios that are undefined for the given history (flat equity, no losing
//! trade, no drawdown) are `None` rather than infinite or NaN.

use pricer_core::types::TRADING_DAYS_PER_YEAR;
use serde::{Deserialize, Serialize};

/// Performance summary of one run.
///
/// Returns are simple daily returns of total portfolio value. VaR and
/// expected shortfall are historical, on daily P&L in currency units, and
/// reported as positive losses.
///
/// # Examples
/// ```
/// use pricer_backtest::PerformanceMetrics;
///
/// let metrics = PerformanceMetrics::compute(100.0, &[110.0, 99.0, 121.0], &[15.0, -4.0], 0.0, 0.95);
/// assert!((metrics.total_return - 0.21).abs() < 1e-12);
/// assert!((metrics.max_drawdown - 0.1).abs() < 1e-12);
/// assert_eq!(metrics.win_rate, Some(0.5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Final over initial value, minus one
    pub total_return: f64,
    /// Geometric return scaled to 252 trading days
    pub annualised_return: f64,
    /// Sample standard deviation of daily returns scaled by √252
    pub annualised_volatility: f64,
    /// Annualised excess return over volatility
    pub sharpe_ratio: Option<f64>,
    /// Annualised excess return over downside deviation
    pub sortino_ratio: Option<f64>,
    /// Largest peak-to-trough loss as a fraction of the peak
    pub max_drawdown: f64,
    /// Annualised return over maximum drawdown
    pub calmar_ratio: Option<f64>,
    /// Share of closed trades with positive P&L
    pub win_rate: Option<f64>,
    /// Gross profit over gross loss of closed trades
    pub profit_factor: Option<f64>,
    /// Number of closed trades
    pub trade_count: usize,
    /// Historical one-day value at risk
    pub value_at_risk: f64,
    /// Historical one-day expected shortfall
    pub expected_shortfall: f64,
    /// Confidence of the tail measures
    pub confidence: f64,
}

impl PerformanceMetrics {
    /// Computes the statistics of one run.
    ///
    /// # Arguments
    ///
    /// * `initial_value` - Portfolio value before the first date
    /// * `equity` - Total portfolio value at each recorded date
    /// * `trade_pnls` - Realised P&L of each terminal position
    /// * `risk_free_rate` - Annual rate subtracted in Sharpe and Sortino
    /// * `confidence` - Confidence of VaR and expected shortfall, in (0, 1)
    pub fn compute(
        initial_value: f64,
        equity: &[f64],
        trade_pnls: &[f64],
        risk_free_rate: f64,
        confidence: f64,
    ) -> Self {
        let mut series = Vec::with_capacity(equity.len() + 1);
        series.push(initial_value);
        series.extend_from_slice(equity);

        let returns: Vec<f64> = series
            .windows(2)
            .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
            .collect();
        let daily_pnl: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

        let final_value = series[series.len() - 1];
        let total_return = if initial_value != 0.0 {
            final_value / initial_value - 1.0
        } else {
            0.0
        };
        let annualised_return = annualise(total_return, returns.len());

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let std = sample_std(&returns);
        let mean_excess = mean(&returns) - daily_rf;
        let sharpe_ratio = (std > 0.0 && returns.len() >= 2)
            .then(|| mean_excess / std * TRADING_DAYS_PER_YEAR.sqrt());

        let downside = downside_deviation(&returns, daily_rf);
        let sortino_ratio = (downside > 0.0)
            .then(|| mean_excess / downside * TRADING_DAYS_PER_YEAR.sqrt());

        let max_drawdown = max_drawdown(&series);
        let calmar_ratio = (max_drawdown > 0.0).then(|| annualised_return / max_drawdown);

        let trade_count = trade_pnls.len();
        let wins = trade_pnls.iter().filter(|p| **p > 0.0).count();
        let win_rate = (trade_count > 0).then(|| wins as f64 / trade_count as f64);
        let gross_profit: f64 = trade_pnls.iter().filter(|p| **p > 0.0).sum();
        let gross_loss: f64 = -trade_pnls.iter().filter(|p| **p < 0.0).sum::<f64>();
        let profit_factor = (gross_loss > 0.0).then(|| gross_profit / gross_loss);

        let (value_at_risk, expected_shortfall) = historical_tail(&daily_pnl, confidence);

        Self {
            total_return,
            annualised_return,
            annualised_volatility: std * TRADING_DAYS_PER_YEAR.sqrt(),
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            calmar_ratio,
            win_rate,
            profit_factor,
            trade_count,
            value_at_risk,
            expected_shortfall,
            confidence,
        }
    }
}

fn annualise(total_return: f64, days: usize) -> f64 {
    if days == 0 {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(TRADING_DAYS_PER_YEAR / days as f64) - 1.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

fn downside_deviation(returns: &[f64], target: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let ss: f64 = returns
        .iter()
        .map(|r| (r - target).min(0.0).powi(2))
        .sum();
    (ss / returns.len() as f64).sqrt()
}

fn max_drawdown(series: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in series {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst
}

/// Linear-interpolated empirical quantile of a sorted sample.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p * (sorted.len() as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let w = rank - lo as f64;
    sorted[lo] + w * (sorted[hi] - sorted[lo])
}

/// Historical VaR and expected shortfall of a P&L sample, loss-positive.
fn historical_tail(pnl: &[f64], confidence: f64) -> (f64, f64) {
    if pnl.is_empty() {
        return (0.0, 0.0);
    }
    let mut losses: Vec<f64> = pnl.iter().map(|x| -x).collect();
    losses.sort_by(|a, b| a.total_cmp(b));
    let var = quantile(&losses, confidence).max(0.0);

    let tail: Vec<f64> = losses
        .iter()
        .copied()
        .filter(|l| *l >= var - 1e-12)
        .collect();
    let es = if tail.is_empty() {
        var
    } else {
        (tail.iter().sum::<f64>() / tail.len() as f64).max(var)
    };
    (var, es)
}
