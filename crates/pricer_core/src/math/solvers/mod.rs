//! Root-finding and optimisation solvers.
//!
//! ## Available Solvers
//!
//! - [`NewtonBisectionSolver`]: Newton-Raphson confined to a bracket, used for
//!   implied-volatility inversion
//! - [`LevenbergMarquardtSolver`]: box-constrained nonlinear least squares, used
//!   for stochastic-volatility calibration
//!
//! ## Configuration
//!
//! Root finders use [`SolverConfig`] (`tolerance` default 1e-10,
//! `max_iterations` default 100). The least-squares solver uses [`LMConfig`].

mod config;
mod levenberg_marquardt;
mod newton_bisection;

pub use config::SolverConfig;
pub use levenberg_marquardt::{LMConfig, LMResult, LevenbergMarquardtSolver};
pub use newton_bisection::NewtonBisectionSolver;
