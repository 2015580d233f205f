//! Monte Carlo pricing.
//!
//! # Architecture
//!
//! ```text
//! MonteCarloPricer
//! ├── MonteCarloConfig  (paths, steps, seed, block size, variance reduction)
//! ├── Dynamics          (GBM or Heston full-truncation Euler)
//! └── Orchestration
//!     ├── per-block PricerRng streams (rayon)
//!     ├── antithetic pairs + terminal-asset control variate
//!     └── ordered merge → McEstimate (price, std error, 95% CI)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use pricer_core::types::{OptionType, PricingInputs};
//! use pricer_pricing::mc::{MonteCarloConfig, MonteCarloPricer};
//!
//! let config = MonteCarloConfig::builder()
//!     .n_paths(10_000)
//!     .n_steps(12)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//! let pricer = MonteCarloPricer::new(config).unwrap();
//!
//! let inputs = PricingInputs::new(100.0, 105.0, 1.0, 0.03, 0.0, 0.25, OptionType::Put);
//! let estimate = pricer.estimate(&inputs).unwrap();
//! assert!(estimate.confidence_interval.0 <= estimate.price);
//! ```

mod config;
mod error;
mod paths;
mod pricer;

pub use config::{
    Dynamics, MonteCarloConfig, MonteCarloConfigBuilder, DEFAULT_BLOCK_SIZE, MAX_PATHS, MAX_STEPS,
};
pub use error::ConfigError;
pub use paths::{GbmParams, HestonPathParams};
pub use pricer::{McEstimate, MonteCarloPricer, Z_95};
