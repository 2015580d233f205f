//! # Pricer Surface (Layer 3: Volatility Surfaces)
//!
//! Turns a quoted option chain into an arbitrage-checked implied volatility
//! surface:
//! - [`SurfaceBuilder`]: quote screening, parallel implied-vol inversion,
//!   per-expiry strike interpolation and clamped wings
//! - [`VolatilitySurface`]: serialisable grid with strike/expiry interpolation,
//!   cubic spline in strike by default ([`StrikeInterpolation`])
//! - [`arbitrage`]: calendar, butterfly and monotonicity checks on a dense
//!   strike grid with a single repair pass
//!
//! ## Usage Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use pricer_core::market_data::{MarketData, OptionsContract};
//! use pricer_core::types::{OptionType, PricingInputs};
//! use pricer_models::analytical::BlackScholes;
//! use pricer_surface::{SurfaceBuilder, SurfaceConfig};
//!
//! let timestamp = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(16, 0, 0).unwrap();
//! let expiry = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
//! let t = (expiry - timestamp.date()).num_days() as f64 / 365.0;
//!
//! let chain: Vec<OptionsContract> = [480.0, 500.0, 520.0, 540.0]
//!     .iter()
//!     .map(|&strike| {
//!         let inputs = PricingInputs::new(510.0, strike, t, 0.05, 0.013, 0.18, OptionType::Put);
//!         let mid = BlackScholes.price(&inputs).unwrap();
//!         OptionsContract::new(format!("P{}", strike), "SPY", strike, expiry, OptionType::Put)
//!             .with_quote(mid - 0.01, mid + 0.01)
//!     })
//!     .collect();
//! let snapshot = MarketData::new("SPY", timestamp, 510.0, 0.05, 0.013, chain).unwrap();
//!
//! let build = SurfaceBuilder::new(SurfaceConfig::default())
//!     .unwrap()
//!     .build_from_snapshot(&snapshot)
//!     .unwrap();
//!
//! assert!(build.anomalies.is_empty());
//! let vol = build.surface.interpolate(510.0, t).unwrap();
//! assert!((vol - 0.18).abs() < 1e-4);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod arbitrage;
mod builder;
mod config;
mod error;
mod surface;

pub use arbitrage::{ArbitrageKind, ArbitrageViolation};
pub use builder::{AnomalyReason, QuoteAnomaly, SurfaceBuild, SurfaceBuilder};
pub use config::{SurfaceConfig, LEE_SLOPE_BOUND, MAX_GRID_DENSITY};
pub use error::SurfaceError;
pub use surface::{
    StrikeInterpolation, VolatilitySurface, WingParams, DEFAULT_GRID_DENSITY, MIN_TOTAL_VARIANCE,
};
