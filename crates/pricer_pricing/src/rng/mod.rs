//! # Random Number Generation Infrastructure
//!
//! Seeded pseudo-random number generation for Monte Carlo simulations.
//!
//! ## Design Rationale
//!
//! - **Reproducibility**: All generators support seeding for deterministic sequences
//! - **Independent streams**: [`PricerRng::for_stream`] derives one generator
//!   per block of paths from a master seed
//! - **Efficiency**: Zero-allocation batch operations via `&mut [f64]` slices
//!
//! ## Usage Example
//!
//! ```rust
//! use pricer_pricing::rng::PricerRng;
//!
//! // Create a seeded RNG for reproducible simulations
//! let mut rng = PricerRng::from_seed(12345);
//!
//! // Generate standard normal variates (mean=0, std=1)
//! let normal_value = rng.gen_normal();
//!
//! // Generator for the third block of a run seeded with 12345
//! let mut block = PricerRng::for_stream(12345, 2);
//! let mut buffer = vec![0.0; 1000];
//! block.fill_normal(&mut buffer);
//! ```

mod prng;

pub use prng::{stream_seed, PricerRng};
