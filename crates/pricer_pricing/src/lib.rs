//! # Pricer Pricing (Layer 3: Engines)
//!
//! ## Layer 3 Role
//!
//! pricer_pricing turns the single-contract models of Layer 2 into one
//! dispatchable capability:
//! - Monte Carlo engine with deterministic per-block random streams
//! - [`PricingModel`] enum over Black-Scholes, binomial lattice, Monte Carlo
//!   and Heston, with Black-Scholes fallback on recoverable failures
//! - [`PricingResult`] value objects and serialisable [`ModelConfig`]
//!
//! ## Usage Example
//!
//! ```rust
//! use pricer_core::types::{OptionType, PricingInputs};
//! use pricer_pricing::{ModelConfig, ModelId};
//!
//! let config: ModelConfig = toml::from_str(
//!     r#"
//!     model = "monte_carlo"
//!     n_paths = 20000
//!     seed = 42
//!     "#,
//! )
//! .unwrap();
//! let model = config.build().unwrap();
//!
//! let inputs = PricingInputs::new(100.0, 100.0, 0.5, 0.03, 0.0, 0.2, OptionType::Call);
//! let result = model.evaluate_with_fallback(&inputs).unwrap();
//!
//! assert_eq!(result.model, ModelId::MonteCarlo);
//! assert!(result.confidence_interval.is_some());
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod mc;
pub mod model;
pub mod result;
pub mod rng;

pub use model::{ModelConfig, PricingModel};
pub use result::{ModelId, PricingResult};
