//! Market data records consumed by the analytics core.
//!
//! - [`OptionsContract`]: one listed option and its quote
//! - [`MarketData`]: an immutable snapshot (spot, rates, chain) for one date
//! - [`DataQualityReport`]: missing dates and anomalies condensed into a score
//! - [`MarketDataError`]: validation failures

mod contract;
mod error;
mod quality;
mod snapshot;

pub use contract::{OptionsContract, DEFAULT_CONTRACT_MULTIPLIER};
pub use error::MarketDataError;
pub use quality::{DataQualityReport, DataType, DEFAULT_QUALITY_THRESHOLD};
pub use snapshot::MarketData;
