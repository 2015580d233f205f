//! Lattice methods.
//!
//! [`BinomialTree`] prices European and American vanillas on a
//! recombining binomial lattice.

pub mod binomial;

pub use binomial::{BinomialTree, LatticeScheme, DEFAULT_STEPS};
