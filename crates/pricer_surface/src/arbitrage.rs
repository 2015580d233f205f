//! Static arbitrage checks and the one-pass repair.
//!
//! Checks run on normalised call prices c(x) = C/(DF·F) with x = K/F, which
//! depend on total variance alone. Every expiry row is sampled on a dense
//! log-moneyness grid: [`grid_density`](crate::VolatilitySurface::grid_density)
//! points per strike interval, continued at the same spacing for
//! [`WING_SPAN`] beyond the outermost strikes.
//! - **Calendar**: w non-decreasing in T at fixed log-moneyness, tested at
//!   the grid points of both neighbouring rows
//! - **Monotonicity**: -1 ≤ dc/dx ≤ 0 between neighbouring grid points
//! - **Butterfly**: dc/dx non-decreasing in strike (call prices convex)
//!
//! The repair raises each row to the previous row's total variance along
//! moneyness lines. Rows that still fail the strike checks have their node
//! call prices replaced by the greatest convex minorant and switch to
//! [`StrikeInterpolation::ConvexCall`], with wings continuing their end
//! segments.

use std::fmt;

use pricer_core::math::solvers::SolverConfig;
use pricer_core::types::{OptionType, PricingInputs};
use pricer_models::analytical::{implied_volatility, BlackScholes, ImpliedVolConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::surface::{RowCurve, StrikeInterpolation, VolatilitySurface, WingParams};

/// Log-moneyness covered by the wing checks beyond the outermost strikes.
pub const WING_SPAN: f64 = 1.0;

/// Cap on wing samples per side.
const MAX_WING_SAMPLES: usize = 200;

/// Category of static arbitrage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrageKind {
    /// Total variance decreases with expiry.
    Calendar,
    /// Call prices are not convex in strike.
    Butterfly,
    /// Call prices rise with strike or fall faster than the discounted strike.
    Monotonicity,
}

impl fmt::Display for ArbitrageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArbitrageKind::Calendar => "calendar",
            ArbitrageKind::Butterfly => "butterfly",
            ArbitrageKind::Monotonicity => "monotonicity",
        };
        f.write_str(name)
    }
}

/// One violating point of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageViolation {
    /// What was violated.
    pub kind: ArbitrageKind,
    /// Expiry in years; the later row for calendar violations.
    pub expiry: f64,
    /// Strike where the violation was detected.
    pub strike: f64,
}

impl fmt::Display for ArbitrageViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at K={}, T={:.4}", self.kind, self.strike, self.expiry)
    }
}

/// Undiscounted call on a unit forward with strike `x` and total variance `w`.
pub(crate) fn normalised_call(x: f64, w: f64) -> f64 {
    let inputs = PricingInputs::new(1.0, x, 1.0, 0.0, 0.0, w.max(0.0).sqrt(), OptionType::Call);
    BlackScholes::price_unchecked(&inputs)
}

/// Total variance whose normalised call at strike `x` equals `target`.
pub(crate) fn implied_total_variance(target: f64, x: f64, guess: f64) -> Option<f64> {
    let config = ImpliedVolConfig {
        solver: SolverConfig {
            tolerance: 1e-14,
            max_iterations: 200,
        },
        min_vol: 1e-6,
        max_vol: 10.0,
    };
    let inputs = PricingInputs::new(1.0, x, 1.0, 0.0, 0.0, 0.0, OptionType::Call);
    implied_volatility(target, &inputs, &config, Some(guess.max(0.0).sqrt()))
        .ok()
        .map(|vol| vol * vol)
}

/// Sample points inside the node range: every node plus `density - 1`
/// evenly spaced points per interval.
fn interior_grid(ks: &[f64], density: usize) -> Vec<f64> {
    let step = density.max(1);
    let mut points: Vec<f64> = ks
        .windows(2)
        .flat_map(|pair| {
            (0..step).map(move |m| pair[0] + (pair[1] - pair[0]) * m as f64 / step as f64)
        })
        .collect();
    points.extend(ks.last().copied());
    points
}

/// Interior grid continued into both wings, ascending.
fn row_grid(ks: &[f64], density: usize) -> Vec<f64> {
    let n = ks.len();
    if n < 2 {
        return ks.to_vec();
    }
    let floor = WING_SPAN / MAX_WING_SAMPLES as f64;
    let left_step = ((ks[1] - ks[0]) / density.max(1) as f64).max(floor);
    let right_step = ((ks[n - 1] - ks[n - 2]) / density.max(1) as f64).max(floor);
    let left_count = (WING_SPAN / left_step).ceil() as usize;
    let right_count = (WING_SPAN / right_step).ceil() as usize;

    let mut points: Vec<f64> = (1..=left_count)
        .rev()
        .map(|m| ks[0] - left_step * m as f64)
        .collect();
    points.extend(interior_grid(ks, density));
    points.extend((1..=right_count).map(|m| ks[n - 1] + right_step * m as f64));
    points
}

/// (x, c) pairs of one expiry row at the grid strikes.
fn row_calls(surface: &VolatilitySurface, row: usize, total_variance: &[f64]) -> Vec<(f64, f64)> {
    let forward = surface.forwards()[row];
    surface
        .strikes()
        .iter()
        .zip(total_variance)
        .map(|(&strike, &w)| {
            let x = strike / forward;
            (x, normalised_call(x, w))
        })
        .collect()
}

#[inline]
fn slope(a: (f64, f64), b: (f64, f64)) -> f64 {
    (b.1 - a.1) / (b.0 - a.0)
}

pub(crate) fn find_violations(
    surface: &VolatilitySurface,
    tolerance: f64,
) -> Vec<ArbitrageViolation> {
    let mut violations = calendar_violations(surface, tolerance);
    for row in 0..surface.expiries().len() {
        violations.extend(strike_violations(surface, row, tolerance));
    }
    violations
}

fn calendar_violations(surface: &VolatilitySurface, tolerance: f64) -> Vec<ArbitrageViolation> {
    let expiries = surface.expiries();
    let forwards = surface.forwards();
    let density = surface.grid_density();
    let mut violations = Vec::new();

    for i in 0..expiries.len().saturating_sub(1) {
        let (earlier, later) = (surface.row_curve(i), surface.row_curve(i + 1));
        let (earlier_wing, later_wing) = (surface.wings()[i], surface.wings()[i + 1]);
        let mut moneyness = interior_grid(&surface.row_moneyness(i), density);
        moneyness.extend(interior_grid(&surface.row_moneyness(i + 1), density));
        moneyness.sort_by(f64::total_cmp);

        for k in moneyness {
            let w0 = earlier.total_variance(k, earlier_wing);
            let w1 = later.total_variance(k, later_wing);
            if w1 < w0 - tolerance {
                violations.push(ArbitrageViolation {
                    kind: ArbitrageKind::Calendar,
                    expiry: expiries[i + 1],
                    strike: forwards[i + 1] * k.exp(),
                });
            }
        }
    }
    violations
}

fn strike_violations(
    surface: &VolatilitySurface,
    row: usize,
    tolerance: f64,
) -> Vec<ArbitrageViolation> {
    let expiry = surface.expiries()[row];
    let forward = surface.forwards()[row];
    let curve = surface.row_curve(row);
    let wing = surface.wings()[row];
    let calls: Vec<(f64, f64)> = row_grid(&surface.row_moneyness(row), surface.grid_density())
        .into_iter()
        .map(|k| {
            let x = k.exp();
            (x, normalised_call(x, curve.total_variance(k, wing)))
        })
        .collect();
    let slopes: Vec<f64> = calls.windows(2).map(|p| slope(p[0], p[1])).collect();
    let mut violations = Vec::new();

    for (j, &s) in slopes.iter().enumerate() {
        if s > tolerance || s < -1.0 - tolerance {
            violations.push(ArbitrageViolation {
                kind: ArbitrageKind::Monotonicity,
                expiry,
                strike: forward * calls[j].0,
            });
        }
    }
    for (j, pair) in slopes.windows(2).enumerate() {
        if pair[1] < pair[0] - tolerance {
            violations.push(ArbitrageViolation {
                kind: ArbitrageKind::Butterfly,
                expiry,
                strike: forward * calls[j + 1].0,
            });
        }
    }
    violations
}

/// One repair pass: calendar first, then rows that still fail in strike.
pub(crate) fn smooth(
    surface: &VolatilitySurface,
    tolerance: f64,
    max_wing_slope: f64,
) -> VolatilitySurface {
    let mut grid = surface.total_variance_grid();
    let forwards = surface.forwards().to_vec();
    let strikes = surface.strikes().to_vec();

    let mut raised = 0usize;
    for i in 1..grid.len() {
        let current = surface.with_total_variance(&grid);
        for (j, &strike) in strikes.iter().enumerate() {
            let k = (strike / forwards[i]).ln();
            let floor = current.row_total_variance(i - 1, k);
            if grid[i][j] < floor {
                grid[i][j] = floor;
                raised += 1;
            }
        }
    }

    let current = surface.with_total_variance(&grid);
    let mut interpolation = current.interpolation().to_vec();
    let mut rewritten = vec![false; grid.len()];
    let mut lowered = 0usize;
    for (row, total_variance) in grid.iter_mut().enumerate() {
        if strike_violations(&current, row, tolerance).is_empty() {
            continue;
        }
        let calls = row_calls(&current, row, total_variance);
        let hull = lower_convex_hull(&calls);
        for (j, &(x, c)) in calls.iter().enumerate() {
            let target = evaluate_hull(&hull, x);
            if target >= c - f64::EPSILON * c.abs() {
                continue;
            }
            match implied_total_variance(target, x, total_variance[j]) {
                Some(w) => {
                    total_variance[j] = w;
                    lowered += 1;
                }
                None => debug!(row, strike = strikes[j], "convex minorant not invertible"),
            }
        }
        interpolation[row] = StrikeInterpolation::ConvexCall;
        rewritten[row] = true;
    }

    let mut wings = current.wings().to_vec();
    for row in 0..wings.len() {
        let mut wing = wings[row];
        if rewritten[row] {
            let ks = current.row_moneyness(row);
            if let Ok(curve) = RowCurve::new(&ks, &grid[row], StrikeInterpolation::ConvexCall) {
                let (left, right) = curve.end_slopes();
                wing = WingParams::clamped(left, right, max_wing_slope);
            }
        }
        if row > 0 {
            wing = wing.steepened(wings[row - 1]);
        }
        wings[row] = wing;
    }

    debug!(
        raised,
        lowered,
        rewritten = rewritten.iter().filter(|&&r| r).count(),
        "surface smoothing pass"
    );
    surface.with_rows(&grid, wings, interpolation)
}

/// Lower convex hull of points sorted by abscissa.
fn lower_convex_hull(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut hull: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for &p in points {
        while hull.len() >= 2 {
            let o = hull[hull.len() - 2];
            let a = hull[hull.len() - 1];
            let cross = (a.0 - o.0) * (p.1 - o.1) - (a.1 - o.1) * (p.0 - o.0);
            if cross <= 0.0 {
                hull.pop();
            } else {
                break;
            }
        }
        hull.push(p);
    }
    hull
}

fn evaluate_hull(hull: &[(f64, f64)], x: f64) -> f64 {
    if hull.len() < 2 {
        return hull.first().map_or(f64::NAN, |p| p.1);
    }
    let i = hull
        .partition_point(|p| p.0 <= x)
        .saturating_sub(1)
        .min(hull.len() - 2);
    let (a, b) = (hull[i], hull[i + 1]);
    a.1 + slope(a, b) * (x - a.0)
}
