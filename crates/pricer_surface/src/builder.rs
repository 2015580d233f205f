//! Chain-to-surface construction.
//!
//! # Pipeline
//!
//! 1. Screen every contract: static validity, two-sided quote, unexpired,
//!    mid strictly inside the no-arbitrage band
//! 2. Invert the mid to a Black-Scholes volatility, out-of-the-money side
//!    first when a strike is quoted on both sides
//! 3. Drop expiries with too few usable quotes
//! 4. Interpolate total variance over log-moneyness per expiry onto the
//!    union strike grid with the configured
//!    [`StrikeInterpolation`](crate::StrikeInterpolation) and
//!    derive clamped wing slopes
//! 5. Check for static arbitrage on a dense grid of strikes between and
//!    beyond the nodes; repair once if enabled, then re-check
//!
//! Rejected quotes never abort a build. They are returned as
//! [`QuoteAnomaly`] records and logged at `warn` level.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use pricer_core::market_data::{MarketData, OptionsContract};
use pricer_core::types::{OptionType, PricingInputs};
use pricer_models::analytical::{implied_volatility, price_bounds};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::arbitrage;
use crate::config::SurfaceConfig;
use crate::error::SurfaceError;
use crate::surface::{Anchor, RowCurve, VolatilitySurface, WingParams};

/// Why a quote was left out of a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyReason {
    /// The contract failed static validation.
    InvalidContract {
        /// Validation message
        detail: String,
    },
    /// Bid or ask is zero.
    MissingQuote,
    /// Expiration is on or before the valuation date.
    Expired,
    /// Mid price at or outside the no-arbitrage band.
    OutsidePriceBounds {
        /// Quoted mid
        mid: f64,
        /// Discounted intrinsic value on the forward
        lower: f64,
        /// Discounted spot (call) or strike (put)
        upper: f64,
    },
    /// Implied volatility inversion failed.
    ImpliedVolFailed {
        /// Solver message
        detail: String,
    },
    /// The quote's expiry had too few usable quotes.
    SparseExpiry {
        /// Usable quotes in that expiry
        quotes: usize,
    },
}

impl fmt::Display for AnomalyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyReason::InvalidContract { detail } => write!(f, "invalid contract: {}", detail),
            AnomalyReason::MissingQuote => f.write_str("missing bid or ask"),
            AnomalyReason::Expired => f.write_str("expired"),
            AnomalyReason::OutsidePriceBounds { mid, lower, upper } => write!(
                f,
                "mid {:.6} outside no-arbitrage bounds ({:.6}, {:.6})",
                mid, lower, upper
            ),
            AnomalyReason::ImpliedVolFailed { detail } => {
                write!(f, "implied vol failed: {}", detail)
            }
            AnomalyReason::SparseExpiry { quotes } => {
                write!(f, "expiry has only {} usable quotes", quotes)
            }
        }
    }
}

/// A quote excluded from a surface build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteAnomaly {
    /// Contract symbol
    pub symbol: String,
    /// Contract expiration
    pub expiration: NaiveDate,
    /// Contract strike
    pub strike: f64,
    /// Exclusion reason
    pub reason: AnomalyReason,
}

impl QuoteAnomaly {
    fn new(contract: &OptionsContract, reason: AnomalyReason) -> Self {
        Self {
            symbol: contract.symbol.clone(),
            expiration: contract.expiration,
            strike: contract.strike,
            reason,
        }
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceBuild {
    /// The validated surface.
    pub surface: VolatilitySurface,
    /// Quotes left out, in chain order per stage.
    pub anomalies: Vec<QuoteAnomaly>,
    /// Whether the repair pass was needed.
    pub smoothed: bool,
}

impl SurfaceBuild {
    /// Discards the diagnostics.
    pub fn into_surface(self) -> VolatilitySurface {
        self.surface
    }
}

/// A screened quote awaiting inversion.
struct Candidate<'a> {
    contract: &'a OptionsContract,
    inputs: PricingInputs,
    mid: f64,
}

impl Candidate<'_> {
    fn is_out_of_the_money(&self) -> bool {
        let at_or_above_forward = self.inputs.strike >= self.inputs.forward();
        match self.inputs.option_type {
            OptionType::Call => at_or_above_forward,
            OptionType::Put => !at_or_above_forward,
        }
    }
}

/// An inverted quote.
struct Quote<'a> {
    contract: &'a OptionsContract,
    expiry: f64,
    vol: f64,
}

/// One expiry of usable quotes, sorted by strike.
struct Slice {
    expiry: f64,
    strikes: Vec<f64>,
    vols: Vec<f64>,
}

/// Builds [`VolatilitySurface`]s from option chains.
///
/// Stateless apart from its settings, so one builder can serve many dates
/// and threads.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SurfaceBuilder {
    config: SurfaceConfig,
}

impl SurfaceBuilder {
    /// Creates a builder with validated settings.
    ///
    /// # Errors
    ///
    /// `SurfaceError::InvalidInput` when [`SurfaceConfig::validate`] fails.
    pub fn new(config: SurfaceConfig) -> Result<Self, SurfaceError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the settings.
    #[inline]
    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    /// Builds a surface from a market snapshot.
    ///
    /// # Errors
    ///
    /// As [`build`](Self::build), plus `SurfaceError::InvalidInput` for an
    /// invalid snapshot.
    pub fn build_from_snapshot(&self, snapshot: &MarketData) -> Result<SurfaceBuild, SurfaceError> {
        snapshot.validate()?;
        self.build(
            &snapshot.chain,
            snapshot.spot,
            snapshot.timestamp,
            snapshot.rate,
            snapshot.dividend_yield,
        )
    }

    /// Builds and validates a surface from an option chain.
    ///
    /// # Arguments
    ///
    /// * `chain` - Quoted contracts; unusable ones are reported, not fatal
    /// * `spot` - Underlying price
    /// * `timestamp` - Valuation time
    /// * `rate` - Continuously compounded risk-free rate
    /// * `dividend_yield` - Continuous dividend yield
    ///
    /// # Errors
    ///
    /// * `SurfaceError::InvalidInput` - Non-positive spot or non-finite rates
    /// * `SurfaceError::InsufficientQuotes` - No expiry kept enough quotes
    /// * `SurfaceError::ArbitrageViolation` - Arbitrage survives the repair pass
    /// * `SurfaceError::Interpolation` - A slice could not be interpolated
    pub fn build(
        &self,
        chain: &[OptionsContract],
        spot: f64,
        timestamp: NaiveDateTime,
        rate: f64,
        dividend_yield: f64,
    ) -> Result<SurfaceBuild, SurfaceError> {
        if !(spot.is_finite() && spot > 0.0) {
            return Err(SurfaceError::InvalidInput(format!(
                "spot must be positive, got {}",
                spot
            )));
        }
        if !(rate.is_finite() && dividend_yield.is_finite()) {
            return Err(SurfaceError::InvalidInput(format!(
                "rate and dividend yield must be finite, got {} and {}",
                rate, dividend_yield
            )));
        }
        let anchor = Anchor {
            spot,
            timestamp,
            rate,
            dividend_yield,
        };

        let screened: Vec<Result<Candidate<'_>, QuoteAnomaly>> = chain
            .par_iter()
            .map(|contract| screen(contract, &anchor))
            .collect();

        let mut anomalies = Vec::new();
        let mut by_strike: BTreeMap<(NaiveDate, u64), Vec<Candidate<'_>>> = BTreeMap::new();
        for outcome in screened {
            match outcome {
                Ok(candidate) => by_strike
                    .entry((
                        candidate.contract.expiration,
                        candidate.contract.strike.to_bits(),
                    ))
                    .or_default()
                    .push(candidate),
                Err(anomaly) => anomalies.push(anomaly),
            }
        }

        let inverted: Vec<(Option<Quote<'_>>, Vec<QuoteAnomaly>)> = by_strike
            .into_values()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|group| self.invert(group))
            .collect();

        let mut by_expiry: BTreeMap<NaiveDate, Vec<Quote<'_>>> = BTreeMap::new();
        for (quote, failures) in inverted {
            anomalies.extend(failures);
            if let Some(quote) = quote {
                by_expiry
                    .entry(quote.contract.expiration)
                    .or_default()
                    .push(quote);
            }
        }

        let need = self.config.min_quotes_per_expiry;
        let best = by_expiry.values().map(Vec::len).max().unwrap_or(0);
        let mut slices = Vec::new();
        for quotes in by_expiry.into_values() {
            if quotes.len() < need {
                let count = quotes.len();
                anomalies.extend(quotes.iter().map(|q| {
                    QuoteAnomaly::new(q.contract, AnomalyReason::SparseExpiry { quotes: count })
                }));
                continue;
            }
            slices.push(Slice::from_quotes(quotes));
        }
        if slices.is_empty() {
            return Err(SurfaceError::InsufficientQuotes { usable: best, need });
        }

        for anomaly in &anomalies {
            warn!(
                symbol = %anomaly.symbol,
                expiration = %anomaly.expiration,
                reason = %anomaly.reason,
                "quote excluded from surface"
            );
        }

        let surface = self.fit(anchor, &slices)?;
        let tolerance = self.config.arbitrage_tolerance;
        let violations = surface.check_arbitrage(tolerance);
        if violations.is_empty() {
            info!(
                expiries = surface.expiries().len(),
                strikes = surface.strikes().len(),
                excluded = anomalies.len(),
                "volatility surface built"
            );
            return Ok(SurfaceBuild {
                surface,
                anomalies,
                smoothed: false,
            });
        }
        if !self.config.smoothing {
            return Err(SurfaceError::ArbitrageViolation { violations });
        }

        warn!(
            violations = violations.len(),
            "surface admits arbitrage, smoothing"
        );
        let smoothed = arbitrage::smooth(&surface, tolerance, self.config.max_wing_slope);
        let remaining = smoothed.check_arbitrage(tolerance);
        if !remaining.is_empty() {
            return Err(SurfaceError::ArbitrageViolation {
                violations: remaining,
            });
        }

        info!(
            expiries = smoothed.expiries().len(),
            strikes = smoothed.strikes().len(),
            excluded = anomalies.len(),
            "volatility surface built after smoothing"
        );
        Ok(SurfaceBuild {
            surface: smoothed,
            anomalies,
            smoothed: true,
        })
    }

    /// Inverts one strike of one expiry, out-of-the-money side first.
    fn invert<'a>(
        &self,
        mut group: Vec<Candidate<'a>>,
    ) -> (Option<Quote<'a>>, Vec<QuoteAnomaly>) {
        group.sort_by_key(|c| !c.is_out_of_the_money());
        let mut failures = Vec::new();
        for candidate in group {
            let solved = implied_volatility(
                candidate.mid,
                &candidate.inputs,
                &self.config.implied_vol,
                candidate.contract.implied_vol,
            );
            match solved {
                Ok(vol) => {
                    return (
                        Some(Quote {
                            contract: candidate.contract,
                            expiry: candidate.inputs.time_to_expiry,
                            vol,
                        }),
                        failures,
                    )
                }
                Err(err) => failures.push(QuoteAnomaly::new(
                    candidate.contract,
                    AnomalyReason::ImpliedVolFailed {
                        detail: err.to_string(),
                    },
                )),
            }
        }
        (None, failures)
    }

    /// Interpolates each slice onto the union strike grid.
    fn fit(&self, anchor: Anchor, slices: &[Slice]) -> Result<VolatilitySurface, SurfaceError> {
        let mut strikes: Vec<f64> = slices.iter().flat_map(|s| s.strikes.iter().copied()).collect();
        strikes.sort_by(f64::total_cmp);
        strikes.dedup();

        let kind = self.config.interpolation;
        let max_slope = self.config.max_wing_slope;
        let mut wings: Vec<WingParams> = Vec::with_capacity(slices.len());
        let mut grid = Vec::with_capacity(slices.len());

        for slice in slices {
            let forward = anchor.forward(slice.expiry);
            let ks: Vec<f64> = slice.strikes.iter().map(|k| (k / forward).ln()).collect();
            let ws: Vec<f64> = slice
                .vols
                .iter()
                .map(|v| v * v * slice.expiry)
                .collect();
            let fill = RowCurve::new(&ks, &ws, kind)?;
            let (left_edge, right_edge) = fill.end_slopes();
            let fill_wing = WingParams::clamped(left_edge, right_edge, max_slope);

            let row_ks: Vec<f64> = strikes.iter().map(|k| (k / forward).ln()).collect();
            let row: Vec<f64> = row_ks
                .iter()
                .map(|&k| fill.total_variance(k, fill_wing))
                .collect();

            let (left_edge, right_edge) = RowCurve::new(&row_ks, &row, kind)?.end_slopes();
            let mut wing = WingParams::clamped(left_edge, right_edge, max_slope);
            // Wings may only steepen with expiry
            if let Some(&previous) = wings.last() {
                wing = wing.steepened(previous);
            }

            wings.push(wing);
            grid.push(row);
        }

        let expiries = slices.iter().map(|s| s.expiry).collect();
        let interpolation = vec![kind; slices.len()];
        Ok(VolatilitySurface::from_total_variance(
            anchor,
            strikes,
            expiries,
            &grid,
            wings,
            interpolation,
        )
        .with_grid_density(self.config.grid_density))
    }
}

impl Slice {
    fn from_quotes(mut quotes: Vec<Quote<'_>>) -> Self {
        quotes.sort_by(|a, b| a.contract.strike.total_cmp(&b.contract.strike));
        Self {
            expiry: quotes.first().map_or(0.0, |q| q.expiry),
            strikes: quotes.iter().map(|q| q.contract.strike).collect(),
            vols: quotes.iter().map(|q| q.vol).collect(),
        }
    }
}

fn screen<'a>(contract: &'a OptionsContract, anchor: &Anchor) -> Result<Candidate<'a>, QuoteAnomaly> {
    let reject = |reason| QuoteAnomaly::new(contract, reason);

    contract.validate().map_err(|err| {
        reject(AnomalyReason::InvalidContract {
            detail: err.to_string(),
        })
    })?;
    let mid = contract
        .mid()
        .ok_or_else(|| reject(AnomalyReason::MissingQuote))?;
    if contract.expiration <= anchor.timestamp.date() {
        return Err(reject(AnomalyReason::Expired));
    }

    let inputs = PricingInputs::new(
        anchor.spot,
        contract.strike,
        contract.time_to_expiry(anchor.timestamp),
        anchor.rate,
        anchor.dividend_yield,
        0.0,
        contract.option_type,
    );
    let (lower, upper) = price_bounds(&inputs);
    if !(mid > lower && mid < upper) {
        return Err(reject(AnomalyReason::OutsidePriceBounds { mid, lower, upper }));
    }

    Ok(Candidate {
        contract,
        inputs,
        mid,
    })
}
