//! Implied volatility surface on a (strike, expiry) grid.
//!
//! Nodes store Black-Scholes volatilities. Queries work in total variance
//! w = σ²T at fixed log-moneyness k = ln(K/F):
//! - inside the strike grid, each expiry row follows its
//!   [`StrikeInterpolation`], a natural cubic spline in k by default
//! - outside it, w is extended linearly in k with the row's [`WingParams`]
//! - across expiries, w is linear in T; beyond the first and last expiry the
//!   end row's volatility is held constant

use chrono::NaiveDateTime;
use pricer_core::math::interpolators::{
    CubicSplineInterpolator, Interpolator, LinearInterpolator,
};
use pricer_core::types::InterpolationError;
use serde::{Deserialize, Serialize};

use crate::arbitrage::{self, ArbitrageViolation};
use crate::error::SurfaceError;

/// Floor applied to node total variance.
pub const MIN_TOTAL_VARIANCE: f64 = 1e-10;

/// Arbitrage-check sample points per strike interval unless configured.
pub const DEFAULT_GRID_DENSITY: usize = 8;

/// Relative position inside a strike interval treated as the node itself.
const NODE_SNAP: f64 = 1e-12;

/// How an expiry row is interpolated between its strike nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrikeInterpolation {
    /// Natural cubic spline of total variance in log-moneyness.
    #[default]
    CubicSpline,
    /// Total variance linear in log-moneyness.
    Linear,
    /// Undiscounted call prices linear in strike between nodes.
    ///
    /// Convex whenever the node prices are. The repair pass switches the rows
    /// it rewrites to this scheme.
    ConvexCall,
}

/// Linear extrapolation of one expiry row beyond its outermost strikes.
///
/// Slopes are dw/dk: the left slope is non-positive and the right slope
/// non-negative, so total variance never falls in the wings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WingParams {
    /// Slope below the lowest strike.
    pub left_slope: f64,
    /// Slope above the highest strike.
    pub right_slope: f64,
}

impl WingParams {
    /// Edge slopes of a row clamped to the admissible signs and `max_slope`.
    pub(crate) fn clamped(left_edge: f64, right_edge: f64, max_slope: f64) -> Self {
        Self {
            left_slope: left_edge.clamp(-max_slope, 0.0),
            right_slope: right_edge.clamp(0.0, max_slope),
        }
    }

    /// At least as steep as the previous expiry's wings.
    pub(crate) fn steepened(self, previous: WingParams) -> Self {
        Self {
            left_slope: self.left_slope.min(previous.left_slope),
            right_slope: self.right_slope.max(previous.right_slope),
        }
    }
}

/// Interior interpolant of one expiry row over its log-moneyness nodes.
#[derive(Debug, Clone)]
pub(crate) enum RowCurve {
    Flat(f64),
    Spline(CubicSplineInterpolator<f64>),
    Linear(LinearInterpolator<f64>),
    ConvexCall(LinearInterpolator<f64>),
}

impl RowCurve {
    /// Curve through `(ks, ws)`. Splines need three nodes and fall back to
    /// linear on two.
    pub fn new(
        ks: &[f64],
        ws: &[f64],
        kind: StrikeInterpolation,
    ) -> Result<Self, InterpolationError> {
        Ok(match kind {
            StrikeInterpolation::CubicSpline if ks.len() >= 3 => {
                RowCurve::Spline(CubicSplineInterpolator::new(ks, ws)?)
            }
            StrikeInterpolation::CubicSpline | StrikeInterpolation::Linear => {
                RowCurve::Linear(LinearInterpolator::new(ks, ws)?)
            }
            StrikeInterpolation::ConvexCall => {
                RowCurve::ConvexCall(LinearInterpolator::new(ks, ws)?)
            }
        })
    }

    fn domain(&self) -> (f64, f64) {
        match self {
            RowCurve::Flat(_) => (f64::NEG_INFINITY, f64::INFINITY),
            RowCurve::Spline(spline) => spline.domain(),
            RowCurve::Linear(nodes) | RowCurve::ConvexCall(nodes) => nodes.domain(),
        }
    }

    /// dw/dk at the outermost nodes; end segments for the piecewise schemes.
    pub fn end_slopes(&self) -> (f64, f64) {
        match self {
            RowCurve::Flat(_) => (0.0, 0.0),
            RowCurve::Spline(spline) => spline.end_slopes(),
            RowCurve::Linear(nodes) | RowCurve::ConvexCall(nodes) => nodes.end_slopes(),
        }
    }

    /// Interior value at `k` inside the node range.
    fn value(&self, k: f64) -> f64 {
        match self {
            RowCurve::Flat(w) => *w,
            RowCurve::Spline(spline) => spline.evaluate(k),
            RowCurve::Linear(nodes) => nodes.evaluate(k),
            RowCurve::ConvexCall(nodes) => convex_call_variance(nodes, k),
        }
    }

    /// Total variance at `k` with `wing` beyond the outermost nodes.
    pub fn total_variance(&self, k: f64, wing: WingParams) -> f64 {
        let (k_lo, k_hi) = self.domain();
        let w = if k <= k_lo {
            self.value(k_lo) + wing.left_slope * (k - k_lo)
        } else if k >= k_hi {
            self.value(k_hi) + wing.right_slope * (k - k_hi)
        } else {
            self.value(k)
        };
        w.max(MIN_TOTAL_VARIANCE)
    }
}

/// Total variance whose call price is the chord of the neighbouring node
/// prices at strike x = e^k.
fn convex_call_variance(nodes: &LinearInterpolator<f64>, k: f64) -> f64 {
    let (ks, ws) = (nodes.xs(), nodes.ys());
    let j = ks
        .partition_point(|&node| node <= k)
        .saturating_sub(1)
        .min(ks.len() - 2);
    let (x0, x1, x) = (ks[j].exp(), ks[j + 1].exp(), k.exp());
    let u = (x - x0) / (x1 - x0);
    if u <= NODE_SNAP {
        return ws[j];
    }
    if u >= 1.0 - NODE_SNAP {
        return ws[j + 1];
    }

    let c0 = arbitrage::normalised_call(x0, ws[j]);
    let c1 = arbitrage::normalised_call(x1, ws[j + 1]);
    let guess = nodes.evaluate(k);
    arbitrage::implied_total_variance(c0 + u * (c1 - c0), x, guess).unwrap_or(guess)
}

/// Validated implied volatility surface.
///
/// Built by [`SurfaceBuilder`](crate::SurfaceBuilder); free of calendar and
/// butterfly arbitrage at the tolerance it was built with.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use pricer_core::market_data::OptionsContract;
/// use pricer_core::types::{OptionType, PricingInputs};
/// use pricer_models::analytical::BlackScholes;
/// use pricer_surface::{SurfaceBuilder, SurfaceConfig};
///
/// let valuation = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
/// let expiry = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
/// let t = 91.0 / 365.0;
///
/// let chain: Vec<OptionsContract> = [90.0, 100.0, 110.0]
///     .iter()
///     .map(|&strike| {
///         let inputs = PricingInputs::new(100.0, strike, t, 0.03, 0.0, 0.2, OptionType::Call);
///         let price = BlackScholes.price(&inputs).unwrap();
///         OptionsContract::new(format!("C{}", strike), "SPY", strike, expiry, OptionType::Call)
///             .with_quote(price, price)
///     })
///     .collect();
///
/// let surface = SurfaceBuilder::new(SurfaceConfig::default())
///     .unwrap()
///     .build(&chain, 100.0, valuation.and_hms_opt(0, 0, 0).unwrap(), 0.03, 0.0)
///     .unwrap()
///     .into_surface();
///
/// let vol = surface.interpolate(100.0, t).unwrap();
/// assert!((vol - 0.2).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilitySurface {
    strikes: Vec<f64>,
    expiries: Vec<f64>,
    vols: Vec<Vec<f64>>,
    forwards: Vec<f64>,
    wings: Vec<WingParams>,
    interpolation: Vec<StrikeInterpolation>,
    grid_density: usize,
    spot: f64,
    timestamp: NaiveDateTime,
    rate: f64,
    dividend_yield: f64,
}

/// Market state a surface is anchored to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Anchor {
    pub spot: f64,
    pub timestamp: NaiveDateTime,
    pub rate: f64,
    pub dividend_yield: f64,
}

impl Anchor {
    pub fn forward(&self, t: f64) -> f64 {
        self.spot * ((self.rate - self.dividend_yield) * t).exp()
    }
}

impl VolatilitySurface {
    /// Assembles a surface from rows of node total variance.
    ///
    /// `total_variance[i][j]` belongs to `expiries[i]` and `strikes[j]`.
    pub(crate) fn from_total_variance(
        anchor: Anchor,
        strikes: Vec<f64>,
        expiries: Vec<f64>,
        total_variance: &[Vec<f64>],
        wings: Vec<WingParams>,
        interpolation: Vec<StrikeInterpolation>,
    ) -> Self {
        let forwards = expiries.iter().map(|&t| anchor.forward(t)).collect();
        let vols = expiries
            .iter()
            .zip(total_variance)
            .map(|(&t, row)| {
                row.iter()
                    .map(|&w| (w.max(MIN_TOTAL_VARIANCE) / t).sqrt())
                    .collect()
            })
            .collect();
        Self {
            strikes,
            expiries,
            vols,
            forwards,
            wings,
            interpolation,
            grid_density: DEFAULT_GRID_DENSITY,
            spot: anchor.spot,
            timestamp: anchor.timestamp,
            rate: anchor.rate,
            dividend_yield: anchor.dividend_yield,
        }
    }

    /// Sets the number of arbitrage-check samples per strike interval.
    pub(crate) fn with_grid_density(mut self, density: usize) -> Self {
        self.grid_density = density.max(1);
        self
    }

    /// Copy with replaced node total variances and the same row settings.
    pub(crate) fn with_total_variance(&self, total_variance: &[Vec<f64>]) -> Self {
        self.with_rows(
            total_variance,
            self.wings.clone(),
            self.interpolation.clone(),
        )
    }

    /// Copy with replaced nodes, wings and row interpolation.
    pub(crate) fn with_rows(
        &self,
        total_variance: &[Vec<f64>],
        wings: Vec<WingParams>,
        interpolation: Vec<StrikeInterpolation>,
    ) -> Self {
        Self::from_total_variance(
            self.anchor(),
            self.strikes.clone(),
            self.expiries.clone(),
            total_variance,
            wings,
            interpolation,
        )
        .with_grid_density(self.grid_density)
    }

    pub(crate) fn anchor(&self) -> Anchor {
        Anchor {
            spot: self.spot,
            timestamp: self.timestamp,
            rate: self.rate,
            dividend_yield: self.dividend_yield,
        }
    }

    /// Node total variances, one row per expiry.
    pub(crate) fn total_variance_grid(&self) -> Vec<Vec<f64>> {
        (0..self.expiries.len())
            .map(|i| (0..self.strikes.len()).map(|j| self.node_variance(i, j)).collect())
            .collect()
    }

    #[inline]
    fn node_variance(&self, row: usize, column: usize) -> f64 {
        let vol = self.vols[row][column];
        vol * vol * self.expiries[row]
    }

    /// Ordered strike grid.
    #[inline]
    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    /// Ordered expiry buckets in years.
    #[inline]
    pub fn expiries(&self) -> &[f64] {
        &self.expiries
    }

    /// Node volatilities, one row per expiry, one column per strike.
    #[inline]
    pub fn vols(&self) -> &[Vec<f64>] {
        &self.vols
    }

    /// Forward price of each expiry row.
    #[inline]
    pub fn forwards(&self) -> &[f64] {
        &self.forwards
    }

    /// Wing parameters of each expiry row.
    #[inline]
    pub fn wings(&self) -> &[WingParams] {
        &self.wings
    }

    /// Strike interpolation of each expiry row.
    #[inline]
    pub fn interpolation(&self) -> &[StrikeInterpolation] {
        &self.interpolation
    }

    /// Arbitrage-check sample points per strike interval.
    #[inline]
    pub fn grid_density(&self) -> usize {
        self.grid_density
    }

    /// Spot at build time.
    #[inline]
    pub fn spot(&self) -> f64 {
        self.spot
    }

    /// Snapshot timestamp the surface was built from.
    #[inline]
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Risk-free rate used for forwards.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Dividend yield used for forwards.
    #[inline]
    pub fn dividend_yield(&self) -> f64 {
        self.dividend_yield
    }

    /// Forward price at horizon `t`.
    #[inline]
    pub fn forward(&self, t: f64) -> f64 {
        self.anchor().forward(t)
    }

    /// Volatility stored at a grid node.
    pub fn node_vol(&self, expiry_index: usize, strike_index: usize) -> Option<f64> {
        self.vols.get(expiry_index)?.get(strike_index).copied()
    }

    /// Log-moneyness ln(K/F) of the strike nodes in expiry row `row`.
    pub(crate) fn row_moneyness(&self, row: usize) -> Vec<f64> {
        let forward = self.forwards[row];
        self.strikes.iter().map(|k| (k / forward).ln()).collect()
    }

    /// Interpolant of expiry row `row`; rows with a single node are flat.
    pub(crate) fn row_curve(&self, row: usize) -> RowCurve {
        let ks = self.row_moneyness(row);
        let ws: Vec<f64> = (0..self.strikes.len())
            .map(|j| self.node_variance(row, j))
            .collect();
        RowCurve::new(&ks, &ws, self.interpolation[row]).unwrap_or_else(|_| {
            RowCurve::Flat(ws.first().copied().unwrap_or(MIN_TOTAL_VARIANCE))
        })
    }

    /// Total variance of expiry row `row` at log-moneyness `k`.
    ///
    /// Follows the row's [`StrikeInterpolation`] between grid nodes and is
    /// linear in `k` with the row's wing slopes outside the grid.
    pub fn row_total_variance(&self, row: usize, k: f64) -> f64 {
        self.row_curve(row).total_variance(k, self.wings[row])
    }

    /// Implied volatility at `strike` and horizon `t` years.
    ///
    /// # Errors
    ///
    /// `SurfaceError::InvalidInput` for a non-positive or non-finite strike,
    /// or a negative or non-finite horizon.
    pub fn interpolate(&self, strike: f64, t: f64) -> Result<f64, SurfaceError> {
        if !(strike.is_finite() && strike > 0.0) {
            return Err(SurfaceError::InvalidInput(format!(
                "strike must be positive, got {}",
                strike
            )));
        }
        if !(t.is_finite() && t >= 0.0) {
            return Err(SurfaceError::InvalidInput(format!(
                "expiry must be non-negative, got {}",
                t
            )));
        }

        let k = (strike / self.forward(t)).ln();
        let last = self.expiries.len() - 1;
        let (t_first, t_last) = (self.expiries[0], self.expiries[last]);

        let vol = if t <= t_first {
            (self.row_total_variance(0, k) / t_first).sqrt()
        } else if t >= t_last {
            (self.row_total_variance(last, k) / t_last).sqrt()
        } else {
            let i = self
                .expiries
                .partition_point(|&e| e <= t)
                .saturating_sub(1)
                .min(last - 1);
            let (t0, t1) = (self.expiries[i], self.expiries[i + 1]);
            let w0 = self.row_total_variance(i, k);
            let w1 = self.row_total_variance(i + 1, k);
            let w = w0 + (w1 - w0) * (t - t0) / (t1 - t0);
            (w / t).sqrt()
        };

        if vol.is_finite() {
            Ok(vol)
        } else {
            Err(SurfaceError::InvalidInput(format!(
                "no finite volatility at K = {}, T = {}",
                strike, t
            )))
        }
    }

    /// Total variance σ²T at `strike` and horizon `t`.
    pub fn total_variance(&self, strike: f64, t: f64) -> Result<f64, SurfaceError> {
        let vol = self.interpolate(strike, t)?;
        Ok(vol * vol * t)
    }

    /// Calendar, butterfly and monotonicity violations beyond `tolerance`.
    ///
    /// Each row is sampled [`grid_density`](Self::grid_density) times per
    /// strike interval and out to [`WING_SPAN`](crate::arbitrage::WING_SPAN)
    /// in log-moneyness beyond the outermost strikes.
    pub fn check_arbitrage(&self, tolerance: f64) -> Vec<ArbitrageViolation> {
        arbitrage::find_violations(self, tolerance)
    }

    /// Returns true when [`check_arbitrage`](Self::check_arbitrage) finds nothing.
    pub fn is_arbitrage_free(&self, tolerance: f64) -> bool {
        self.check_arbitrage(tolerance).is_empty()
    }
}
