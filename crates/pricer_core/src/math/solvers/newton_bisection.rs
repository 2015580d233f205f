//! Safeguarded Newton-Raphson root finder.

use super::SolverConfig;
use crate::types::SolverError;

/// Newton-Raphson iteration confined to a sign-changing bracket.
///
/// Each iteration takes the Newton step when it lands strictly inside the
/// current bracket and the derivative is usable; otherwise it bisects. The
/// bracket shrinks on every evaluation, so the method keeps Newton's
/// quadratic convergence near the root while inheriting the global
/// convergence of bisection.
///
/// # Example
///
/// ```
/// use pricer_core::math::solvers::{NewtonBisectionSolver, SolverConfig};
///
/// let solver = NewtonBisectionSolver::new(SolverConfig::default());
///
/// // x³ - x - 2 = 0, starting from a poor guess
/// let f = |x: f64| (x * x * x - x - 2.0, 3.0 * x * x - 1.0);
/// let root = solver.find_root(f, 0.0, 3.0, 0.1).unwrap();
/// assert!((root * root * root - root - 2.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone)]
pub struct NewtonBisectionSolver {
    config: SolverConfig,
}

impl NewtonBisectionSolver {
    /// Create a new solver with the given configuration.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(SolverConfig::default())
    }

    /// Returns the solver configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Find a root of `f` in `[lo, hi]` starting from `x0`.
    ///
    /// `f` returns the pair `(f(x), f'(x))`.
    ///
    /// # Returns
    ///
    /// * `Ok(x)` - Root where `|f(x)| < tolerance` or the bracket is narrower than tolerance
    /// * `Err(SolverError::NoBracket)` - `f(lo)` and `f(hi)` have the same sign
    /// * `Err(SolverError::MaxIterationsExceeded)` - Budget exhausted
    /// * `Err(SolverError::NumericalInstability)` - `f` is not finite at an endpoint
    pub fn find_root<F>(&self, f: F, lo: f64, hi: f64, x0: f64) -> Result<f64, SolverError>
    where
        F: Fn(f64) -> (f64, f64),
    {
        let (mut lo, mut hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let (f_lo, _) = f(lo);
        let (f_hi, _) = f(hi);

        if !f_lo.is_finite() || !f_hi.is_finite() {
            return Err(SolverError::NumericalInstability(
                "objective not finite at bracket endpoint".to_string(),
            ));
        }
        if f_lo.abs() < self.config.tolerance {
            return Ok(lo);
        }
        if f_hi.abs() < self.config.tolerance {
            return Ok(hi);
        }
        if f_lo * f_hi > 0.0 {
            return Err(SolverError::NoBracket { a: lo, b: hi });
        }

        // Orient so that f(lo) < 0 < f(hi) from here on.
        let increasing = f_lo < 0.0;
        let mut x = if x0 > lo && x0 < hi {
            x0
        } else {
            0.5 * (lo + hi)
        };

        for _ in 0..self.config.max_iterations {
            let (fx, dfx) = f(x);
            if fx.is_finite() && fx.abs() < self.config.tolerance {
                return Ok(x);
            }

            let below = if increasing { fx < 0.0 } else { fx > 0.0 };
            if below {
                lo = x;
            } else {
                hi = x;
            }
            if hi - lo < self.config.tolerance {
                return Ok(0.5 * (lo + hi));
            }

            let newton = x - fx / dfx;
            x = if fx.is_finite() && dfx.is_finite() && dfx != 0.0 && newton > lo && newton < hi
            {
                newton
            } else {
                0.5 * (lo + hi)
            };
        }

        Err(SolverError::MaxIterationsExceeded {
            iterations: self.config.max_iterations,
        })
    }
}
