//! # pricer_core: Foundation for the Options Analytics Core
//!
//! ## Layer 1 (Foundation) Role
//!
//! pricer_core is the bottom layer of the workspace, providing:
//! - Option types, exercise styles, Greeks and pricing inputs (`types`)
//! - Market snapshots, option contracts and data quality reports (`market_data`)
//! - Normal distribution, root finders, least squares and interpolation (`math`)
//! - Error types: `PricingError`, `SolverError`, `InterpolationError`, `CalibrationError`
//!
//! ## Minimal Dependencies
//!
//! Layer 1 has no dependencies on other pricer_* crates:
//! - num-traits: generic floating-point interpolators
//! - statrs: double-precision error function
//! - chrono: expiry dates and day counting
//! - serde: serialisable value objects
//! - thiserror: error derives
//!
//! ## Usage Examples
//!
//! ```rust
//! use pricer_core::math::distributions::norm_cdf;
//! use pricer_core::types::{OptionType, PricingInputs};
//!
//! let inputs = PricingInputs::new(100.0, 100.0, 0.5, 0.05, 0.0, 0.2, OptionType::Call);
//! inputs.validate().unwrap();
//! assert!((norm_cdf(0.0) - 0.5).abs() < 1e-15);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod market_data;
pub mod math;
pub mod types;
