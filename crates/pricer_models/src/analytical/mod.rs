//! Closed-form pricing for European options.
//!
//! - [`BlackScholes`]: Black-Scholes-Merton price and analytic Greeks
//! - [`implied_volatility`]: inversion of the Black-Scholes price
//!
//! Both work in `f64` on [`PricingInputs`](pricer_core::types::PricingInputs)
//! and report failures as [`PricingError`](pricer_core::types::PricingError).

pub mod black_scholes;
pub mod implied_vol;

pub use black_scholes::{d1_d2, BlackScholes, MIN_TOTAL_VOL};
pub use implied_vol::{implied_volatility, price_bounds, ImpliedVolConfig};
