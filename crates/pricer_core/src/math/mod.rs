//! Numerical routines shared by every pricing layer.
//!
//! - `distributions`: standard normal density and distribution function
//! - `solvers`: root finders and a bounded least-squares optimiser
//! - `interpolators`: one-dimensional interpolation schemes

pub mod distributions;
pub mod interpolators;
pub mod solvers;
