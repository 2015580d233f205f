//! Listed option contract records.

use super::error::MarketDataError;
use crate::types::{time_to_expiry, ExerciseStyle, OptionType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Standard number of underlying units per listed equity option.
pub const DEFAULT_CONTRACT_MULTIPLIER: f64 = 100.0;

/// A listed option contract with its latest quote.
///
/// A zero `bid` or `ask` means that side is not quoted.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use pricer_core::market_data::OptionsContract;
/// use pricer_core::types::OptionType;
///
/// let expiry = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
/// let contract = OptionsContract::new("SPY240621C00500000", "SPY", 500.0, expiry, OptionType::Call)
///     .with_quote(4.75, 5.25);
///
/// assert_eq!(contract.mid(), Some(5.0));
/// assert!(contract.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsContract {
    /// Contract identifier (OCC-style symbol).
    pub symbol: String,
    /// Underlying ticker.
    pub underlying: String,
    /// Strike price.
    pub strike: f64,
    /// Expiration date; the contract expires at that day's close.
    pub expiration: NaiveDate,
    /// Call or put.
    pub option_type: OptionType,
    /// Exercise style.
    #[serde(default)]
    pub exercise: ExerciseStyle,
    /// Best bid (0 when absent).
    pub bid: f64,
    /// Best ask (0 when absent).
    pub ask: f64,
    /// Last traded price.
    pub last: Option<f64>,
    /// Vendor-supplied implied volatility.
    pub implied_vol: Option<f64>,
    /// Open interest.
    #[serde(default)]
    pub open_interest: u64,
    /// Session volume.
    #[serde(default)]
    pub volume: u64,
    /// Units of underlying per contract.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_multiplier() -> f64 {
    DEFAULT_CONTRACT_MULTIPLIER
}

impl OptionsContract {
    /// Creates an unquoted contract.
    pub fn new(
        symbol: impl Into<String>,
        underlying: impl Into<String>,
        strike: f64,
        expiration: NaiveDate,
        option_type: OptionType,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            underlying: underlying.into(),
            strike,
            expiration,
            option_type,
            exercise: ExerciseStyle::European,
            bid: 0.0,
            ask: 0.0,
            last: None,
            implied_vol: None,
            open_interest: 0,
            volume: 0,
            multiplier: DEFAULT_CONTRACT_MULTIPLIER,
        }
    }

    /// Sets bid and ask.
    pub fn with_quote(mut self, bid: f64, ask: f64) -> Self {
        self.bid = bid;
        self.ask = ask;
        self
    }

    /// Sets the last traded price.
    pub fn with_last(mut self, last: f64) -> Self {
        self.last = Some(last);
        self
    }

    /// Sets the vendor implied volatility.
    pub fn with_implied_vol(mut self, vol: f64) -> Self {
        self.implied_vol = Some(vol);
        self
    }

    /// Sets open interest and volume.
    pub fn with_activity(mut self, open_interest: u64, volume: u64) -> Self {
        self.open_interest = open_interest;
        self.volume = volume;
        self
    }

    /// Sets the exercise style.
    pub fn with_exercise(mut self, exercise: ExerciseStyle) -> Self {
        self.exercise = exercise;
        self
    }

    /// Sets the contract multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Returns true when both sides are quoted and not crossed.
    #[inline]
    pub fn has_two_sided_quote(&self) -> bool {
        self.bid > 0.0 && self.ask > 0.0 && self.bid <= self.ask
    }

    /// Mid price of a two-sided quote.
    #[inline]
    pub fn mid(&self) -> Option<f64> {
        self.has_two_sided_quote()
            .then(|| 0.5 * (self.bid + self.ask))
    }

    /// Mid when available, otherwise the last trade.
    pub fn reference_price(&self) -> Option<f64> {
        self.mid().or(self.last.filter(|p| *p > 0.0))
    }

    /// Quoted spread, if two-sided.
    pub fn spread(&self) -> Option<f64> {
        self.has_two_sided_quote().then(|| self.ask - self.bid)
    }

    /// Year fraction from `valuation` to expiry, floored at zero.
    #[inline]
    pub fn time_to_expiry(&self, valuation: NaiveDateTime) -> f64 {
        time_to_expiry(valuation, self.expiration)
    }

    /// Returns true once `date` has reached the expiration date.
    #[inline]
    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        date >= self.expiration
    }

    /// Checks the contract's static invariants.
    ///
    /// # Errors
    ///
    /// `MarketDataError::InvalidContract` for an empty symbol, non-positive or
    /// non-finite strike, negative quote, crossed market, or non-positive multiplier.
    pub fn validate(&self) -> Result<(), MarketDataError> {
        let invalid = |reason: String| MarketDataError::InvalidContract {
            symbol: self.symbol.clone(),
            reason,
        };
        if self.symbol.trim().is_empty() {
            return Err(MarketDataError::EmptyTicker);
        }
        if !self.strike.is_finite() || self.strike <= 0.0 {
            return Err(invalid(format!("strike must be positive, got {}", self.strike)));
        }
        if !self.bid.is_finite() || !self.ask.is_finite() || self.bid < 0.0 || self.ask < 0.0 {
            return Err(invalid(format!(
                "quotes must be non-negative, got bid {} ask {}",
                self.bid, self.ask
            )));
        }
        if self.bid > 0.0 && self.ask > 0.0 && self.bid > self.ask {
            return Err(invalid(format!(
                "bid {} above ask {}",
                self.bid, self.ask
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(invalid(format!(
                "multiplier must be positive, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}
