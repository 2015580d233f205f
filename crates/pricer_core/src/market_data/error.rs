//! Market data error types.
//!
//! Raised when a snapshot, contract or quality report is malformed. These
//! are domain errors: they are surfaced, never retried.

use crate::types::PricingError;
use chrono::NaiveDate;
use thiserror::Error;

/// Market data validation errors.
///
/// # Examples
///
/// ```
/// use pricer_core::market_data::MarketDataError;
///
/// let err = MarketDataError::InvalidSpot { spot: -1.0 };
/// assert!(format!("{}", err).contains("-1"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// Spot price not strictly positive.
    #[error("Invalid spot: S = {spot}")]
    InvalidSpot {
        /// The invalid spot value
        spot: f64,
    },

    /// A numeric field was NaN or infinite.
    #[error("Non-finite value for {field}: {value}")]
    NonFinite {
        /// Field name
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// Contract failed validation.
    #[error("Invalid contract {symbol}: {reason}")]
    InvalidContract {
        /// Contract symbol
        symbol: String,
        /// Reason for rejection
        reason: String,
    },

    /// Start date after end date.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange {
        /// Range start
        start: NaiveDate,
        /// Range end
        end: NaiveDate,
    },

    /// Empty ticker or symbol.
    #[error("Ticker must be a non-empty string")]
    EmptyTicker,
}

impl From<MarketDataError> for PricingError {
    fn from(err: MarketDataError) -> Self {
        PricingError::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_contract_display() {
        let err = MarketDataError::InvalidContract {
            symbol: "SPY240621C00500000".to_string(),
            reason: "bid above ask".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid contract SPY240621C00500000: bid above ask"
        );
    }

    #[test]
    fn test_converts_to_domain_error() {
        let err: PricingError = MarketDataError::EmptyTicker.into();
        assert!(err.is_domain_error());
    }
}
