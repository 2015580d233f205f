//! # Pricer Models (L2: Business Logic)
//!
//! Single-contract pricing models for equity options.
//!
//! This crate provides:
//! - Black-Scholes-Merton prices, analytic Greeks and implied volatility
//! - Binomial lattice (Cox-Ross-Rubinstein, Leisen-Reimer) with early exercise
//! - Heston characteristic-function pricing and calibration
//! - Bump-and-revalue Greeks for models without closed forms
//!
//! ## Design Principles
//!
//! - **Stateless models**: every call receives its [`PricingInputs`](pricer_core::types::PricingInputs)
//! - **Explicit edge cases**: expiry, zero volatility and deep strikes
//!   never produce NaN; failures are [`PricingError`](pricer_core::types::PricingError)s
//! - **Builder pattern** for model settings with sensible defaults

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod analytical;
pub mod greeks;
pub mod heston;
pub mod lattice;
