//! Solver configuration types.

use serde::{Deserialize, Serialize};

/// Configuration for root-finding algorithms.
///
/// # Example
///
/// ```
/// use pricer_core::math::solvers::SolverConfig;
///
/// let config = SolverConfig::default();
/// assert!(config.tolerance < 1e-8);
/// assert!(config.max_iterations >= 50);
///
/// let custom = SolverConfig::new(1e-12, 200);
/// assert_eq!(custom.max_iterations, 200);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Convergence tolerance on `|f(x)|` and on the bracket width.
    pub tolerance: f64,

    /// Maximum number of iterations before giving up with
    /// `SolverError::MaxIterationsExceeded`.
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    /// Default values:
    /// - `tolerance`: 1e-10
    /// - `max_iterations`: 100
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 100,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with specified values.
    ///
    /// # Panics
    ///
    /// Panics if `tolerance <= 0` or `max_iterations == 0`.
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        assert!(tolerance > 0.0, "tolerance must be positive");
        assert!(max_iterations > 0, "max_iterations must be > 0");
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Checks the configuration without panicking.
    pub fn is_valid(&self) -> bool {
        self.tolerance > 0.0 && self.tolerance.is_finite() && self.max_iterations > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SolverConfig::default();
        assert!((config.tolerance - 1e-10).abs() < 1e-15);
        assert_eq!(config.max_iterations, 100);
        assert!(config.is_valid());
    }

    #[test]
    #[should_panic(expected = "tolerance must be positive")]
    fn test_new_config_zero_tolerance_panics() {
        let _ = SolverConfig::new(0.0, 100);
    }

    #[test]
    #[should_panic(expected = "max_iterations must be > 0")]
    fn test_new_config_zero_iterations_panics() {
        let _ = SolverConfig::new(1e-10, 0);
    }

    #[test]
    fn test_partial_deserialisation_keeps_defaults() {
        let config: SolverConfig = serde_json::from_str(r#"{"max_iterations": 40}"#).unwrap();
        assert_eq!(config.max_iterations, 40);
        assert!((config.tolerance - 1e-10).abs() < 1e-15);
    }
}
