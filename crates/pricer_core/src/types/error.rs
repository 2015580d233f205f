//! Error types for structured error handling.
//!
//! This module provides:
//! - `PricingError`: Errors from pricing operations
//! - `InterpolationError`: Errors from interpolation operations
//! - `SolverError`: Errors from root-finding solvers
//! - `CalibrationError`: Errors from model calibration
//!
//! ## Error Taxonomy
//!
//! Every pricing failure falls into one of three families:
//!
//! - **Domain errors** (`PricingError::InvalidInput`): the inputs are
//!   malformed. Surfaced to the caller, never retried.
//! - **Convergence errors** (`PricingError::NotConverged`,
//!   `PricingError::NumericalInstability`): the inputs were valid but the
//!   numerical method could not produce a trustworthy value. Callers may fall
//!   back to a simpler model.
//! - **Model exhaustion** (`PricingError::ModelFailure`): every model tried
//!   for the inputs failed, fallback included. Nothing is left to retry.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Categorised pricing errors.
///
/// # Variants
/// - `InvalidInput`: Invalid market data or parameters
/// - `NotConverged`: Iterative method exhausted its budget
/// - `NumericalInstability`: Computation produced a non-finite or unstable value
/// - `ModelFailure`: Every model tried failed, fallback included
///
/// # Examples
/// ```
/// use pricer_core::types::PricingError;
///
/// let err = PricingError::InvalidInput("Negative spot price".to_string());
/// assert_eq!(format!("{}", err), "Invalid input: Negative spot price");
/// assert!(err.is_domain_error());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PricingError {
    /// Invalid input data or parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Iterative method failed to reach its tolerance.
    #[error("{method} did not converge after {iterations} iterations (residual {residual:.3e})")]
    NotConverged {
        /// Name of the method that failed
        method: String,
        /// Number of iterations attempted
        iterations: usize,
        /// Final residual or error estimate
        residual: f64,
    },

    /// Numerical instability during computation
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// Every model tried failed; the message lists each model's error.
    #[error("Model failure: {0}")]
    ModelFailure(String),
}

impl PricingError {
    /// Returns true for malformed-input errors that must not be retried.
    pub fn is_domain_error(&self) -> bool {
        matches!(self, PricingError::InvalidInput(_))
    }

    /// Returns true when a fallback model may legitimately be tried.
    pub fn is_convergence_failure(&self) -> bool {
        matches!(
            self,
            PricingError::NotConverged { .. } | PricingError::NumericalInstability(_)
        )
    }

    /// Returns true when every model, fallback included, has failed.
    pub fn is_model_failure(&self) -> bool {
        matches!(self, PricingError::ModelFailure(_))
    }

    /// Rejects NaN and infinite model outputs.
    ///
    /// # Examples
    /// ```
    /// use pricer_core::types::PricingError;
    ///
    /// assert_eq!(PricingError::check_finite(1.5, "price").unwrap(), 1.5);
    /// assert!(PricingError::check_finite(f64::NAN, "price").is_err());
    /// ```
    pub fn check_finite(value: f64, what: &str) -> Result<f64, PricingError> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(PricingError::NumericalInstability(format!(
                "{} is not finite ({})",
                what, value
            )))
        }
    }
}

impl From<SolverError> for PricingError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::MaxIterationsExceeded { iterations } => PricingError::NotConverged {
                method: "root finder".to_string(),
                iterations,
                residual: f64::NAN,
            },
            other => PricingError::NumericalInstability(other.to_string()),
        }
    }
}

/// Interpolation-related errors.
///
/// # Examples
///
/// ```
/// use pricer_core::types::InterpolationError;
///
/// let err = InterpolationError::OutOfBounds { x: 5.0, min: 0.0, max: 3.0 };
/// assert!(format!("{}", err).contains("outside valid domain"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterpolationError {
    /// Query point outside valid interpolation domain.
    #[error("Query point {x} outside valid domain [{min}, {max}]")]
    OutOfBounds {
        /// The query point that was out of bounds
        x: f64,
        /// Minimum valid value
        min: f64,
        /// Maximum valid value
        max: f64,
    },

    /// Insufficient data points for interpolation.
    #[error("Insufficient data points: got {got}, need at least {need}")]
    InsufficientData {
        /// Number of points provided
        got: usize,
        /// Minimum number of points required
        need: usize,
    },

    /// Abscissae are not strictly increasing.
    #[error("Data is not strictly increasing at index {index}")]
    NonMonotonicData {
        /// Index where monotonicity violation was detected
        index: usize,
    },

    /// Invalid input data or parameters.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Root-finding solver errors.
///
/// # Examples
///
/// ```
/// use pricer_core::types::SolverError;
///
/// let err = SolverError::MaxIterationsExceeded { iterations: 100 };
/// assert!(format!("{}", err).contains("100 iterations"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SolverError {
    /// Solver failed to converge within maximum iterations.
    #[error("Failed to converge after {iterations} iterations")]
    MaxIterationsExceeded {
        /// Number of iterations attempted
        iterations: usize,
    },

    /// No valid bracket (function values at endpoints have same sign).
    #[error("No bracket: f({a}) and f({b}) have same sign")]
    NoBracket {
        /// Left bracket endpoint
        a: f64,
        /// Right bracket endpoint
        b: f64,
    },

    /// Numerical instability during computation.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
}

/// Calibration error kind.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CalibrationErrorKind {
    /// Calibration did not converge within iteration limit.
    #[error("calibration did not converge")]
    NotConverged,

    /// Parameter constraint was violated.
    #[error("constraint violation: {0}")]
    InvalidConstraint(String),

    /// Numerical instability during calibration.
    #[error("numerical instability")]
    NumericalInstability,

    /// Insufficient market data for calibration.
    #[error("insufficient data: need at least {need} points, got {got}")]
    InsufficientData {
        /// Number of data points provided.
        got: usize,
        /// Minimum required data points.
        need: usize,
    },
}

/// Calibration error with detailed diagnostics.
///
/// # Examples
/// ```
/// use pricer_core::types::CalibrationError;
///
/// let err = CalibrationError::not_converged(100, 0.01);
/// assert_eq!(err.iterations, 100);
/// assert!(err.is_not_converged());
///
/// let err = CalibrationError::constraint_violation("kappa must be positive");
/// assert!(format!("{}", err).contains("constraint violation"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationError {
    /// The type of calibration error.
    pub kind: CalibrationErrorKind,
    /// Final residual sum of squares.
    pub residual_ss: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Detailed error message.
    pub message: Option<String>,
    /// Final parameter values (if available).
    pub parameter_values: Option<Vec<f64>>,
}

impl CalibrationError {
    /// Create a new calibration error.
    pub fn new(kind: CalibrationErrorKind) -> Self {
        Self {
            kind,
            residual_ss: f64::NAN,
            iterations: 0,
            message: None,
            parameter_values: None,
        }
    }

    /// Create a not-converged error.
    pub fn not_converged(iterations: usize, residual_ss: f64) -> Self {
        Self {
            kind: CalibrationErrorKind::NotConverged,
            residual_ss,
            iterations,
            message: Some(format!(
                "Failed to converge after {} iterations (residual_ss: {:.6e})",
                iterations, residual_ss
            )),
            parameter_values: None,
        }
    }

    /// Create a constraint violation error.
    pub fn constraint_violation(constraint: impl Into<String>) -> Self {
        let msg = constraint.into();
        Self {
            kind: CalibrationErrorKind::InvalidConstraint(msg.clone()),
            message: Some(msg),
            ..Self::new(CalibrationErrorKind::NumericalInstability)
        }
    }

    /// Create a numerical instability error.
    pub fn numerical_instability(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(CalibrationErrorKind::NumericalInstability)
        }
    }

    /// Create an insufficient data error.
    pub fn insufficient_data(got: usize, need: usize) -> Self {
        Self {
            message: Some(format!(
                "Insufficient data: got {} points, need at least {}",
                got, need
            )),
            ..Self::new(CalibrationErrorKind::InsufficientData { got, need })
        }
    }

    /// Set the final parameter values.
    pub fn with_parameters(mut self, params: Vec<f64>) -> Self {
        self.parameter_values = Some(params);
        self
    }

    /// Check if the error is due to non-convergence.
    pub fn is_not_converged(&self) -> bool {
        matches!(self.kind, CalibrationErrorKind::NotConverged)
    }

    /// Check if the error is due to a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self.kind, CalibrationErrorKind::InvalidConstraint(_))
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Calibration error: {}", self.kind)?;
        if let Some(ref msg) = self.message {
            if !matches!(self.kind, CalibrationErrorKind::NotConverged) {
                write!(f, " - {}", msg)?;
            }
        }
        if self.iterations > 0 {
            write!(f, " (after {} iterations)", self.iterations)?;
        }
        if !self.residual_ss.is_nan() {
            write!(f, " [residual_ss: {:.6e}]", self.residual_ss)?;
        }
        Ok(())
    }
}

impl std::error::Error for CalibrationError {}

impl From<SolverError> for CalibrationError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::MaxIterationsExceeded { iterations } => {
                CalibrationError::not_converged(iterations, f64::NAN)
            }
            other => CalibrationError::numerical_instability(other.to_string()),
        }
    }
}

impl From<CalibrationError> for PricingError {
    fn from(err: CalibrationError) -> Self {
        match err.kind {
            CalibrationErrorKind::NotConverged => PricingError::NotConverged {
                method: "calibration".to_string(),
                iterations: err.iterations,
                residual: err.residual_ss,
            },
            CalibrationErrorKind::InvalidConstraint(_)
            | CalibrationErrorKind::InsufficientData { .. } => {
                PricingError::InvalidInput(err.to_string())
            }
            CalibrationErrorKind::NumericalInstability => {
                PricingError::NumericalInstability(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_display() {
        let err = PricingError::InvalidInput("Test error".to_string());
        assert_eq!(format!("{}", err), "Invalid input: Test error");
    }

    #[test]
    fn test_not_converged_display() {
        let err = PricingError::NotConverged {
            method: "implied volatility".to_string(),
            iterations: 50,
            residual: 1e-3,
        };
        let msg = err.to_string();
        assert!(msg.contains("implied volatility"));
        assert!(msg.contains("50 iterations"));
    }

    #[test]
    fn test_error_families_are_disjoint() {
        let domain = PricingError::InvalidInput("x".into());
        let convergence = PricingError::NumericalInstability("y".into());
        assert!(domain.is_domain_error());
        assert!(!domain.is_convergence_failure());
        assert!(convergence.is_convergence_failure());
        assert!(!convergence.is_domain_error());

        let exhausted = PricingError::ModelFailure("heston and black_scholes failed".into());
        assert!(exhausted.is_model_failure());
        assert!(!exhausted.is_convergence_failure());
        assert!(!exhausted.is_domain_error());
        assert!(!convergence.is_model_failure());
    }

    #[test]
    fn test_check_finite_rejects_nan_and_infinity() {
        assert!(PricingError::check_finite(f64::NAN, "delta").is_err());
        assert!(PricingError::check_finite(f64::INFINITY, "delta").is_err());
        assert_eq!(PricingError::check_finite(-2.0, "theta"), Ok(-2.0));
    }

    #[test]
    fn test_solver_error_maps_to_not_converged() {
        let err: PricingError = SolverError::MaxIterationsExceeded { iterations: 7 }.into();
        assert!(matches!(err, PricingError::NotConverged { iterations: 7, .. }));

        let err: PricingError = SolverError::NoBracket { a: 0.0, b: 1.0 }.into();
        assert!(matches!(err, PricingError::NumericalInstability(_)));
    }

    #[test]
    fn test_calibration_error_display_includes_residual() {
        let err = CalibrationError::not_converged(100, 0.5);
        let msg = err.to_string();
        assert!(msg.contains("did not converge"));
        assert!(msg.contains("100 iterations"));
        assert!(msg.contains("residual_ss"));
    }

    #[test]
    fn test_calibration_error_into_pricing_error() {
        let err: PricingError = CalibrationError::insufficient_data(2, 5).into();
        assert!(err.is_domain_error());

        let err: PricingError = CalibrationError::not_converged(10, 1.0).into();
        assert!(matches!(err, PricingError::NotConverged { .. }));
    }

    #[test]
    fn test_interpolation_error_display() {
        let err = InterpolationError::InsufficientData { got: 1, need: 2 };
        assert_eq!(
            err.to_string(),
            "Insufficient data points: got 1, need at least 2"
        );
    }
}
