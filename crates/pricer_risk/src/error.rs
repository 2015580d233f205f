//! Risk error types.

use pricer_core::types::PricingError;
use pricer_pricing::ModelId;
use pricer_surface::SurfaceError;
use thiserror::Error;

/// Errors raised while valuing legs or running scenarios.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    /// Every model tried for a contract failed.
    #[error("Pricing failed for {symbol} (tried {}): {source}", format_models(.attempted))]
    Pricing {
        /// Contract symbol
        symbol: String,
        /// Models tried, in order
        attempted: Vec<ModelId>,
        /// Last model error
        source: PricingError,
    },

    /// The surface could not supply a volatility for a contract.
    #[error("No volatility for {symbol}: {source}")]
    Volatility {
        /// Contract symbol
        symbol: String,
        /// Surface error
        source: SurfaceError,
    },

    /// Market state outside the model domain.
    #[error("Invalid market state: {0}")]
    InvalidMarket(String),

    /// Scenario shifts outside their valid range.
    #[error("Invalid scenario '{name}': {reason}")]
    InvalidScenario {
        /// Scenario name
        name: String,
        /// Reason for rejection
        reason: String,
    },
}

fn format_models(models: &[ModelId]) -> String {
    models
        .iter()
        .map(ModelId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl RiskError {
    /// Returns true when no model could value a contract.
    pub fn is_model_failure(&self) -> bool {
        matches!(self, RiskError::Pricing { .. })
    }
}
