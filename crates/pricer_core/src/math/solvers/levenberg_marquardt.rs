//! Box-constrained Levenberg-Marquardt least-squares solver.
//!
//! Minimises `||r(p)||²` subject to `lower ≤ p ≤ upper` by solving the
//! Marquardt-scaled normal equations
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr
//! p_{n+1} = Π(p_n + δ)
//! ```
//!
//! where `Π` projects onto the box. The Jacobian is built by forward
//! differences, stepping inwards when a parameter sits on its upper bound.
//!
//! # Example
//!
//! ```
//! use pricer_core::math::solvers::{LMConfig, LevenbergMarquardtSolver};
//!
//! // Fit y = a·exp(-b·x)
//! let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
//! let ys: Vec<f64> = xs.iter().map(|x: &f64| 2.0 * (-0.7 * x).exp()).collect();
//! let residuals = |p: &[f64]| -> Vec<f64> {
//!     xs.iter().zip(&ys).map(|(x, y)| p[0] * (-p[1] * x).exp() - y).collect()
//! };
//!
//! let solver = LevenbergMarquardtSolver::new(LMConfig::default());
//! let result = solver
//!     .solve_bounded(residuals, vec![1.0, 0.1], &[0.0, 0.0], &[10.0, 5.0])
//!     .unwrap();
//! assert!(result.converged);
//! assert!((result.params[1] - 0.7).abs() < 1e-6);
//! ```

use crate::types::SolverError;

/// Configuration for the Levenberg-Marquardt solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LMConfig {
    /// Stop when the residual norm falls below this value.
    pub tolerance: f64,
    /// Stop when an accepted step improves the sum of squares by less than
    /// this relative amount.
    pub relative_improvement: f64,
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Initial damping factor.
    pub initial_lambda: f64,
    /// Factor to increase lambda on a rejected step.
    pub lambda_up: f64,
    /// Factor to decrease lambda on an accepted step.
    pub lambda_down: f64,
    /// Damping above which the solver gives up on further progress.
    pub max_lambda: f64,
    /// Relative forward-difference step for the Jacobian.
    pub fd_step: f64,
}

impl Default for LMConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            relative_improvement: 1e-12,
            max_iterations: 200,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.3,
            max_lambda: 1e12,
            fd_step: 1e-7,
        }
    }
}

impl LMConfig {
    /// Create a configuration with the given residual tolerance and budget.
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
            ..Default::default()
        }
    }
}

/// Result of a Levenberg-Marquardt run.
#[derive(Debug, Clone, PartialEq)]
pub struct LMResult {
    /// Final parameters (always inside the bounds).
    pub params: Vec<f64>,
    /// Final residual sum of squares.
    pub residual_ss: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether a stopping criterion other than the budget was met.
    pub converged: bool,
}

impl LMResult {
    /// Root mean square residual.
    pub fn rmse(&self, n_observations: usize) -> f64 {
        if n_observations == 0 {
            return 0.0;
        }
        (self.residual_ss / n_observations as f64).sqrt()
    }
}

/// Levenberg-Marquardt nonlinear least-squares solver.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardtSolver {
    config: LMConfig,
}

impl LevenbergMarquardtSolver {
    /// Create a new solver with the given configuration.
    pub fn new(config: LMConfig) -> Self {
        Self { config }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(LMConfig::default())
    }

    /// Get the solver configuration.
    pub fn config(&self) -> &LMConfig {
        &self.config
    }

    /// Unconstrained solve.
    pub fn solve<F>(&self, residuals: F, initial: Vec<f64>) -> Result<LMResult, SolverError>
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let n = initial.len();
        self.solve_bounded(
            residuals,
            initial,
            &vec![f64::NEG_INFINITY; n],
            &vec![f64::INFINITY; n],
        )
    }

    /// Solve within the box `[lower, upper]`.
    ///
    /// The initial guess is projected into the box first. A run that exhausts
    /// its iteration budget is returned with `converged == false`; callers
    /// decide whether that is an error.
    ///
    /// # Errors
    ///
    /// `SolverError::NumericalInstability` for empty or mismatched inputs,
    /// inverted bounds, or a non-finite residual at the starting point.
    pub fn solve_bounded<F>(
        &self,
        residuals: F,
        initial: Vec<f64>,
        lower: &[f64],
        upper: &[f64],
    ) -> Result<LMResult, SolverError>
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let n = initial.len();
        if n == 0 {
            return Err(SolverError::NumericalInstability(
                "Empty parameter vector".to_string(),
            ));
        }
        if lower.len() != n || upper.len() != n {
            return Err(SolverError::NumericalInstability(format!(
                "bounds have length {}/{} for {} parameters",
                lower.len(),
                upper.len(),
                n
            )));
        }
        if lower.iter().zip(upper).any(|(lo, hi)| lo > hi) {
            return Err(SolverError::NumericalInstability(
                "lower bound above upper bound".to_string(),
            ));
        }

        let project = |p: &mut [f64]| {
            for ((x, lo), hi) in p.iter_mut().zip(lower).zip(upper) {
                *x = x.clamp(*lo, *hi);
            }
        };

        let mut params = initial;
        project(&mut params);
        let mut r = residuals(&params);
        if r.is_empty() {
            return Err(SolverError::NumericalInstability(
                "Empty residual vector".to_string(),
            ));
        }
        let mut ss = sum_of_squares(&r);
        if !ss.is_finite() {
            return Err(SolverError::NumericalInstability(
                "residuals not finite at initial guess".to_string(),
            ));
        }

        let mut lambda = self.config.initial_lambda;

        for iteration in 0..self.config.max_iterations {
            if ss.sqrt() < self.config.tolerance {
                return Ok(LMResult {
                    params,
                    residual_ss: ss,
                    iterations: iteration,
                    converged: true,
                });
            }

            let jac = self.jacobian(&residuals, &params, &r, upper);
            let (jtj, jtr) = normal_equations(&jac, &r, n);

            let mut accepted = false;
            while lambda <= self.config.max_lambda {
                let mut damped = jtj.clone();
                for i in 0..n {
                    damped[i][i] += lambda * jtj[i][i].max(1e-12);
                }
                let rhs: Vec<f64> = jtr.iter().map(|g| -g).collect();
                let Some(delta) = solve_cholesky(&damped, &rhs) else {
                    lambda *= self.config.lambda_up;
                    continue;
                };

                let mut trial: Vec<f64> = params.iter().zip(&delta).map(|(p, d)| p + d).collect();
                project(&mut trial);
                let trial_r = residuals(&trial);
                let trial_ss = sum_of_squares(&trial_r);

                if trial_ss.is_finite() && trial_ss < ss {
                    let improvement = (ss - trial_ss) / ss.max(f64::MIN_POSITIVE);
                    params = trial;
                    r = trial_r;
                    ss = trial_ss;
                    lambda = (lambda * self.config.lambda_down).max(1e-15);
                    accepted = true;
                    if improvement < self.config.relative_improvement {
                        return Ok(LMResult {
                            params,
                            residual_ss: ss,
                            iterations: iteration + 1,
                            converged: true,
                        });
                    }
                    break;
                }
                lambda *= self.config.lambda_up;
            }

            if !accepted {
                // No downhill step at any damping: a (possibly constrained) minimum.
                return Ok(LMResult {
                    params,
                    residual_ss: ss,
                    iterations: iteration + 1,
                    converged: true,
                });
            }
        }

        Ok(LMResult {
            params,
            residual_ss: ss,
            iterations: self.config.max_iterations,
            converged: false,
        })
    }

    fn jacobian<F>(&self, residuals: &F, params: &[f64], r0: &[f64], upper: &[f64]) -> Vec<Vec<f64>>
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let m = r0.len();
        let n = params.len();
        let mut jac = vec![vec![0.0; n]; m];
        for j in 0..n {
            let mut h = self.config.fd_step * params[j].abs().max(1e-4);
            if params[j] + h > upper[j] {
                h = -h;
            }
            let mut bumped = params.to_vec();
            bumped[j] += h;
            let rb = residuals(&bumped);
            for i in 0..m {
                let d = (rb[i] - r0[i]) / h;
                jac[i][j] = if d.is_finite() { d } else { 0.0 };
            }
        }
        jac
    }
}

fn normal_equations(jac: &[Vec<f64>], r: &[f64], n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut jtj = vec![vec![0.0; n]; n];
    let mut jtr = vec![0.0; n];
    for (row, ri) in jac.iter().zip(r) {
        for a in 0..n {
            jtr[a] += row[a] * ri;
            for b in 0..=a {
                jtj[a][b] += row[a] * row[b];
            }
        }
    }
    for a in 0..n {
        for b in 0..a {
            jtj[b][a] = jtj[a][b];
        }
    }
    (jtj, jtr)
}

#[inline]
fn sum_of_squares(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

/// Solve `A x = b` for symmetric positive definite `A`.
fn solve_cholesky(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let s: f64 = a[i][j] - (0..j).map(|k| l[i][k] * l[j][k]).sum::<f64>();
            if i == j {
                if s <= 0.0 || !s.is_finite() {
                    return None;
                }
                l[i][i] = s.sqrt();
            } else {
                l[i][j] = s / l[j][j];
            }
        }
    }

    let mut y = vec![0.0; n];
    for i in 0..n {
        y[i] = (b[i] - (0..i).map(|k| l[i][k] * y[k]).sum::<f64>()) / l[i][i];
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        x[i] = (y[i] - ((i + 1)..n).map(|k| l[k][i] * x[k]).sum::<f64>()) / l[i][i];
    }
    Some(x)
}
