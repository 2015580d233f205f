//! Surface construction errors.

use pricer_core::market_data::MarketDataError;
use pricer_core::types::InterpolationError;
use thiserror::Error;

use crate::arbitrage::ArbitrageViolation;

/// Errors raised while building or querying a [`VolatilitySurface`](crate::VolatilitySurface).
///
/// # Examples
///
/// ```
/// use pricer_surface::SurfaceError;
///
/// let err = SurfaceError::InsufficientQuotes { usable: 2, need: 3 };
/// assert!(format!("{}", err).contains("need at least 3"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// Invalid market inputs, settings or query point.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No expiry had enough usable quotes.
    #[error("Insufficient quotes: best expiry has {usable} usable, need at least {need}")]
    InsufficientQuotes {
        /// Usable quotes in the best expiry
        usable: usize,
        /// Minimum per expiry
        need: usize,
    },

    /// The surface still admits arbitrage after one smoothing pass.
    #[error("Arbitrage violation at {} point(s){}", .violations.len(), first_violation(.violations))]
    ArbitrageViolation {
        /// Violating strikes and expiries
        violations: Vec<ArbitrageViolation>,
    },

    /// Slice interpolation failed.
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),
}

fn first_violation(violations: &[ArbitrageViolation]) -> String {
    violations
        .first()
        .map(|v| format!(", first: {}", v))
        .unwrap_or_default()
}

impl From<MarketDataError> for SurfaceError {
    fn from(err: MarketDataError) -> Self {
        SurfaceError::InvalidInput(err.to_string())
    }
}

impl SurfaceError {
    /// Returns true for an arbitrage failure.
    pub fn is_arbitrage_violation(&self) -> bool {
        matches!(self, SurfaceError::ArbitrageViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::ArbitrageKind;

    #[test]
    fn test_arbitrage_display_names_first_violation() {
        let err = SurfaceError::ArbitrageViolation {
            violations: vec![ArbitrageViolation {
                kind: ArbitrageKind::Butterfly,
                expiry: 0.25,
                strike: 105.0,
            }],
        };
        let text = err.to_string();
        assert!(text.contains("1 point"));
        assert!(text.contains("butterfly"));
        assert!(text.contains("105"));
        assert!(err.is_arbitrage_violation());
    }

    #[test]
    fn test_market_data_error_is_invalid_input() {
        let err: SurfaceError = MarketDataError::InvalidSpot { spot: -1.0 }.into();
        assert!(matches!(err, SurfaceError::InvalidInput(_)));
    }
}
