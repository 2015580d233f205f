//! Holdings and aggregated valuations.
//!
//! - [`Leg`]: a signed quantity of an option or of the underlying
//! - [`LegRisk`]: value and Greeks of one leg
//! - [`PortfolioRisk`]: index-ordered sum over legs

mod leg;

pub use leg::{Instrument, Leg, LegRisk, PortfolioRisk};
