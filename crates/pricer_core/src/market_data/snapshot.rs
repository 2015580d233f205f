//! Point-in-time market snapshot.

use super::contract::OptionsContract;
use super::error::MarketDataError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Immutable market state for one underlying on one valuation date.
///
/// Produced by a data provider and shared read-only by the surface
/// builder, pricing models and backtest engine.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use pricer_core::market_data::MarketData;
///
/// let ts = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(16, 0, 0).unwrap();
/// let snapshot = MarketData::new("SPY", ts, 510.0, 0.05, 0.013, Vec::new()).unwrap();
/// assert_eq!(snapshot.valuation_date(), ts.date());
/// assert!(MarketData::new("SPY", ts, 0.0, 0.05, 0.0, Vec::new()).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    /// Underlying ticker.
    pub symbol: String,
    /// Snapshot time.
    pub timestamp: NaiveDateTime,
    /// Underlying spot price.
    pub spot: f64,
    /// Volatility index level (e.g. VIX), if published.
    pub vol_index: Option<f64>,
    /// Continuously compounded risk-free rate.
    pub rate: f64,
    /// Continuous dividend yield.
    pub dividend_yield: f64,
    /// Listed options on the underlying.
    pub chain: Vec<OptionsContract>,
}

impl MarketData {
    /// Creates a validated snapshot.
    ///
    /// # Errors
    ///
    /// - `MarketDataError::EmptyTicker` for an empty symbol
    /// - `MarketDataError::InvalidSpot` for a non-positive spot
    /// - `MarketDataError::NonFinite` for a non-finite rate or dividend yield
    pub fn new(
        symbol: impl Into<String>,
        timestamp: NaiveDateTime,
        spot: f64,
        rate: f64,
        dividend_yield: f64,
        chain: Vec<OptionsContract>,
    ) -> Result<Self, MarketDataError> {
        let snapshot = Self {
            symbol: symbol.into(),
            timestamp,
            spot,
            vol_index: None,
            rate,
            dividend_yield,
            chain,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Attaches a volatility index level.
    pub fn with_vol_index(mut self, level: f64) -> Self {
        self.vol_index = Some(level);
        self
    }

    /// Checks snapshot-level invariants. Individual contracts are
    /// screened separately so that one bad quote does not void the snapshot.
    pub fn validate(&self) -> Result<(), MarketDataError> {
        if self.symbol.trim().is_empty() {
            return Err(MarketDataError::EmptyTicker);
        }
        if !self.spot.is_finite() || self.spot <= 0.0 {
            return Err(MarketDataError::InvalidSpot { spot: self.spot });
        }
        if !self.rate.is_finite() {
            return Err(MarketDataError::NonFinite {
                field: "rate",
                value: self.rate,
            });
        }
        if !self.dividend_yield.is_finite() {
            return Err(MarketDataError::NonFinite {
                field: "dividend_yield",
                value: self.dividend_yield,
            });
        }
        Ok(())
    }

    /// Calendar date of the snapshot.
    #[inline]
    pub fn valuation_date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Looks up a contract by symbol.
    pub fn contract(&self, symbol: &str) -> Option<&OptionsContract> {
        self.chain.iter().find(|c| c.symbol == symbol)
    }

    /// Distinct unexpired expiration dates, ascending.
    pub fn expirations(&self) -> Vec<NaiveDate> {
        let today = self.valuation_date();
        let mut dates: Vec<NaiveDate> = self
            .chain
            .iter()
            .map(|c| c.expiration)
            .filter(|d| *d > today)
            .collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }
}
