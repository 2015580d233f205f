//! Backtest error types.
//!
//! - [`LifecycleError`]: illegal position state transitions
//! - [`ConfigError`]: unreadable or invalid run configuration
//! - [`BacktestError`]: failures that abort a run

use chrono::NaiveDate;
use pricer_pricing::ModelId;
use pricer_risk::RiskError;
use thiserror::Error;

use crate::position::{PositionId, PositionState};

/// Illegal operation on a position.
///
/// # Examples
/// ```
/// use pricer_backtest::{LifecycleError, PositionId, PositionState};
///
/// let err = LifecycleError::IllegalTransition {
///     id: PositionId(3),
///     from: PositionState::Closed,
///     to: PositionState::Open,
/// };
/// assert_eq!(err.to_string(), "Position #3 cannot move from closed to open");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    /// Transition not allowed by the state machine.
    #[error("Position {id} cannot move from {from} to {to}")]
    IllegalTransition {
        /// Position
        id: PositionId,
        /// Current state
        from: PositionState,
        /// Requested state
        to: PositionState,
    },

    /// No position with this identifier.
    #[error("Unknown position {0}")]
    UnknownPosition(PositionId),

    /// Expiry settlement requested for a position without an option.
    #[error("Position {0} holds no option to settle")]
    NotAnOption(PositionId),
}

/// Invalid or unreadable configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Cannot read {path}: {reason}")]
    Io {
        /// File path
        path: String,
        /// Underlying I/O error
        reason: String,
    },

    /// The TOML text could not be parsed.
    #[error("Invalid TOML: {0}")]
    Parse(String),

    /// A field holds a value outside its valid range.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Field name
        name: &'static str,
        /// Reason for rejection
        reason: String,
    },
}

/// Errors that abort a backtest run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BacktestError {
    /// Every model tried for a contract failed.
    #[error("Fatal model failure on {date} for {symbol} (tried {}): {reason}", format_models(.attempted))]
    FatalModelFailure {
        /// Simulation date
        date: NaiveDate,
        /// Contract symbol
        symbol: String,
        /// Models tried, in order
        attempted: Vec<ModelId>,
        /// Last model error
        reason: String,
    },

    /// A position could not be valued for a reason other than the models.
    #[error("Valuation failed on {date}: {source}")]
    Valuation {
        /// Simulation date
        date: NaiveDate,
        /// Risk layer error
        source: RiskError,
    },

    /// Run configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Position state machine violated.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

fn format_models(models: &[ModelId]) -> String {
    models
        .iter()
        .map(ModelId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl BacktestError {
    /// Converts a valuation error on `date`, keeping model exhaustion fatal.
    pub(crate) fn from_risk(date: NaiveDate, err: RiskError) -> Self {
        match err {
            RiskError::Pricing {
                symbol,
                attempted,
                source,
            } => BacktestError::FatalModelFailure {
                date,
                symbol,
                attempted,
                reason: source.to_string(),
            },
            source => BacktestError::Valuation { date, source },
        }
    }
}
