//! Monte Carlo simulation configuration.
//!
//! This module provides configuration types and builders for Monte Carlo
//! pricing simulations.

use pricer_models::greeks::FiniteDifferenceBumps;
use pricer_models::heston::{HestonParams, VarianceSource};
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Maximum number of simulation paths allowed.
pub const MAX_PATHS: usize = 10_000_000;

/// Maximum number of time steps allowed per path.
pub const MAX_STEPS: usize = 10_000;

/// Default number of paths per parallel block.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Risk-neutral dynamics of the underlying.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dynamics {
    /// Geometric Brownian motion, simulated exactly in log space.
    #[default]
    Gbm,
    /// Heston stochastic volatility with full-truncation Euler.
    Heston {
        /// Model parameters.
        params: HestonParams,
        /// Source of the initial variance.
        #[serde(default)]
        variance_source: VarianceSource,
    },
}

/// Monte Carlo simulation configuration.
///
/// Use [`MonteCarloConfigBuilder`] to construct instances.
///
/// # Default Values
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `n_paths` | 100,000 | Number of simulated paths |
/// | `n_steps` | 1 | Time steps per path |
/// | `seed` | 42 | Master seed |
/// | `block_size` | 4096 | Paths per parallel block |
/// | `antithetic` | true | Pair each draw with its negation |
/// | `control_variate` | true | Regress on the discounted terminal asset |
/// | `max_relative_error` | None | Reject estimates with a wider 95% CI |
///
/// # Examples
///
/// ```rust
/// use pricer_pricing::mc::MonteCarloConfig;
///
/// let config = MonteCarloConfig::builder()
///     .n_paths(10_000)
///     .n_steps(52)
///     .seed(42)
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(config.n_paths(), 10_000);
/// assert_eq!(config.n_steps(), 52);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    n_paths: usize,
    n_steps: usize,
    seed: u64,
    block_size: usize,
    antithetic: bool,
    control_variate: bool,
    dynamics: Dynamics,
    max_relative_error: Option<f64>,
    bumps: FiniteDifferenceBumps,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_paths: 100_000,
            n_steps: 1,
            seed: 42,
            block_size: DEFAULT_BLOCK_SIZE,
            antithetic: true,
            control_variate: true,
            dynamics: Dynamics::Gbm,
            max_relative_error: None,
            bumps: FiniteDifferenceBumps::default(),
        }
    }
}

impl MonteCarloConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> MonteCarloConfigBuilder {
        MonteCarloConfigBuilder::default()
    }

    /// Returns the number of simulation paths.
    #[inline]
    pub fn n_paths(&self) -> usize {
        self.n_paths
    }

    /// Returns the number of time steps per path.
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Returns the master seed.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the number of paths per parallel block.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whether antithetic variates are used.
    #[inline]
    pub fn antithetic(&self) -> bool {
        self.antithetic
    }

    /// Whether the terminal-asset control variate is used.
    #[inline]
    pub fn control_variate(&self) -> bool {
        self.control_variate
    }

    /// Returns the simulated dynamics.
    #[inline]
    pub fn dynamics(&self) -> &Dynamics {
        &self.dynamics
    }

    /// Returns the CI gating threshold, if any.
    #[inline]
    pub fn max_relative_error(&self) -> Option<f64> {
        self.max_relative_error
    }

    /// Returns the Greeks bump widths.
    #[inline]
    pub fn bumps(&self) -> &FiniteDifferenceBumps {
        &self.bumps
    }

    /// Copy with a different seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Copy with different dynamics.
    pub fn with_dynamics(mut self, dynamics: Dynamics) -> Self {
        self.dynamics = dynamics;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `n_paths` is 0 or greater than 10,000,000
    /// - `n_steps` is 0 or greater than 10,000
    /// - `block_size` is 0
    /// - `max_relative_error` is set but not positive
    /// - Heston dynamics carry invalid parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_paths == 0 || self.n_paths > MAX_PATHS {
            return Err(ConfigError::InvalidPathCount(self.n_paths));
        }
        if self.n_steps == 0 || self.n_steps > MAX_STEPS {
            return Err(ConfigError::InvalidStepCount(self.n_steps));
        }
        if self.block_size == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "block_size",
                value: "must be positive".to_string(),
            });
        }
        if let Some(limit) = self.max_relative_error {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name: "max_relative_error",
                    value: format!("must be positive, got {}", limit),
                });
            }
        }
        if let Dynamics::Heston { params, .. } = &self.dynamics {
            params
                .validate()
                .map_err(|err| ConfigError::InvalidParameter {
                    name: "dynamics",
                    value: err.to_string(),
                })?;
        }
        self.bumps
            .validate()
            .map_err(|err| ConfigError::InvalidParameter {
                name: "bumps",
                value: err.to_string(),
            })
    }
}

/// Builder for [`MonteCarloConfig`].
///
/// Starts from the defaults and validates at build time.
///
/// # Examples
///
/// ```rust
/// use pricer_pricing::mc::MonteCarloConfig;
///
/// let config = MonteCarloConfig::builder()
///     .n_paths(50_000)
///     .antithetic(false)
///     .max_relative_error(0.01)
///     .build()
///     .expect("valid config");
/// assert!(!config.antithetic());
/// ```
#[derive(Clone, Debug, Default)]
pub struct MonteCarloConfigBuilder {
    config: MonteCarloConfig,
}

impl MonteCarloConfigBuilder {
    /// Sets the number of simulation paths.
    #[inline]
    pub fn n_paths(mut self, n_paths: usize) -> Self {
        self.config.n_paths = n_paths;
        self
    }

    /// Sets the number of time steps per path.
    #[inline]
    pub fn n_steps(mut self, n_steps: usize) -> Self {
        self.config.n_steps = n_steps;
        self
    }

    /// Sets the master seed.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Sets the number of paths per parallel block.
    #[inline]
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.config.block_size = block_size;
        self
    }

    /// Enables or disables antithetic variates.
    #[inline]
    pub fn antithetic(mut self, enabled: bool) -> Self {
        self.config.antithetic = enabled;
        self
    }

    /// Enables or disables the control variate.
    #[inline]
    pub fn control_variate(mut self, enabled: bool) -> Self {
        self.config.control_variate = enabled;
        self
    }

    /// Sets the simulated dynamics.
    #[inline]
    pub fn dynamics(mut self, dynamics: Dynamics) -> Self {
        self.config.dynamics = dynamics;
        self
    }

    /// Rejects estimates whose 95% CI half-width exceeds this fraction of the price.
    #[inline]
    pub fn max_relative_error(mut self, limit: f64) -> Self {
        self.config.max_relative_error = Some(limit);
        self
    }

    /// Sets the Greeks bump widths.
    #[inline]
    pub fn bumps(mut self, bumps: FiniteDifferenceBumps) -> Self {
        self.config.bumps = bumps;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if [`MonteCarloConfig::validate`] fails.
    pub fn build(self) -> Result<MonteCarloConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
