//! Numerical Greeks.
//!
//! Models without closed-form sensitivities (binomial lattice, Heston)
//! compute Greeks by bump-and-revalue through [`finite_difference_greeks`].

pub mod finite_difference;

pub use finite_difference::{finite_difference_greeks, FiniteDifferenceBumps};
