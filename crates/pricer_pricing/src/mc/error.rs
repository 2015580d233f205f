//! Error types for the Monte Carlo engine configuration.

use pricer_core::types::PricingError;
use thiserror::Error;

/// Configuration error for the Monte Carlo pricer.
///
/// These errors occur during construction when invalid parameters are provided.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// Path count outside valid range [1, 10_000_000].
    #[error("Invalid path count {0}: must be in range [1, 10_000_000]")]
    InvalidPathCount(usize),
    /// Step count outside valid range [1, 10_000].
    #[error("Invalid step count {0}: must be in range [1, 10_000]")]
    InvalidStepCount(usize),
    /// Invalid parameter value with name and description.
    #[error("Invalid parameter '{name}': {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Description of the invalid value.
        value: String,
    },
}

impl From<ConfigError> for PricingError {
    fn from(err: ConfigError) -> Self {
        PricingError::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidPathCount(0);
        assert!(err.to_string().contains("Invalid path count 0"));

        let err = ConfigError::InvalidStepCount(20_000);
        assert!(err.to_string().contains("Invalid step count 20000"));

        let err = ConfigError::InvalidParameter {
            name: "block_size",
            value: "must be positive".to_string(),
        };
        assert!(err.to_string().contains("block_size"));
    }

    #[test]
    fn test_converts_to_domain_error() {
        let err: PricingError = ConfigError::InvalidStepCount(0).into();
        assert!(err.is_domain_error());
    }
}
