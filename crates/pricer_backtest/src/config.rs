//! Backtest run configuration.
//!
//! Loaded from TOML; every field except the ticker and the date range has
//! a default.
//!
//! ```toml
//! ticker = "SPY"
//! start_date = "2024-01-02"
//! end_date = "2024-06-28"
//! initial_cash = 250000.0
//! settlement = "physical"
//! prefetch_window = 5
//!
//! [model]
//! model = "binomial_tree"
//! steps = 201
//!
//! [surface]
//! max_wing_slope = 1.0
//!
//! [costs]
//! spread_fraction = 0.25
//! ```

use std::path::Path;

use chrono::NaiveDate;
use pricer_pricing::{ModelConfig, PricingModel};
use pricer_surface::SurfaceConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::execution::TransactionCostModel;

/// Default starting cash.
pub const DEFAULT_INITIAL_CASH: f64 = 100_000.0;
/// Default confidence of VaR and expected shortfall.
pub const DEFAULT_VAR_CONFIDENCE: f64 = 0.95;

/// How in-the-money options settle at expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// Intrinsic value paid in cash.
    #[default]
    Cash,
    /// Underlying delivered at the strike.
    Physical,
}

/// Settings of one backtest run.
///
/// # Default Values
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `initial_cash` | 100,000 | Starting cash |
/// | `model` | Black-Scholes | Model marking every option |
/// | `surface` | builder defaults | Surface construction settings |
/// | `costs` | see [`TransactionCostModel`] | Spread and commissions |
/// | `settlement` | cash | Expiry settlement of in-the-money options |
/// | `prefetch_window` | 0 | Dates whose surfaces are built ahead in parallel |
/// | `var_confidence` | 0.95 | VaR and expected shortfall confidence |
/// | `risk_free_rate` | 0.0 | Annual rate used by Sharpe and Sortino |
///
/// # Examples
/// ```
/// use pricer_backtest::{BacktestConfig, Settlement};
/// use pricer_pricing::ModelId;
///
/// let config = BacktestConfig::from_toml_str(
///     r#"
///     ticker = "SPY"
///     start_date = "2024-01-02"
///     end_date = "2024-03-28"
///     settlement = "physical"
///
///     [model]
///     model = "binomial_tree"
///     steps = 101
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.settlement, Settlement::Physical);
/// assert_eq!(config.model.id(), ModelId::BinomialTree);
/// assert_eq!(config.initial_cash, 100_000.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Underlying ticker
    pub ticker: String,
    /// First simulated date
    pub start_date: NaiveDate,
    /// Last simulated date
    pub end_date: NaiveDate,
    /// Starting cash
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,
    /// Pricing model settings
    #[serde(default)]
    pub model: ModelConfig,
    /// Surface builder settings
    #[serde(default)]
    pub surface: SurfaceConfig,
    /// Execution costs
    #[serde(default)]
    pub costs: TransactionCostModel,
    /// Expiry settlement
    #[serde(default)]
    pub settlement: Settlement,
    /// Number of upcoming dates prepared in parallel; 0 disables prefetch
    #[serde(default)]
    pub prefetch_window: usize,
    /// Confidence of VaR and expected shortfall
    #[serde(default = "default_var_confidence")]
    pub var_confidence: f64,
    /// Annual risk-free rate for risk-adjusted ratios
    #[serde(default)]
    pub risk_free_rate: f64,
}

fn default_initial_cash() -> f64 {
    DEFAULT_INITIAL_CASH
}

fn default_var_confidence() -> f64 {
    DEFAULT_VAR_CONFIDENCE
}

impl BacktestConfig {
    /// Configuration with defaults for everything but the ticker and range.
    pub fn new(ticker: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            start_date,
            end_date,
            initial_cash: DEFAULT_INITIAL_CASH,
            model: ModelConfig::default(),
            surface: SurfaceConfig::default(),
            costs: TransactionCostModel::default(),
            settlement: Settlement::default(),
            prefetch_window: 0,
            var_confidence: DEFAULT_VAR_CONFIDENCE,
            risk_free_rate: 0.0,
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// * `ConfigError::Parse` - Malformed TOML or missing required fields
    /// * `ConfigError::InvalidParameter` - See [`validate`](Self::validate)
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// `ConfigError::Io` when the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks every setting.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidParameter` naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticker.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "ticker",
                reason: "must be non-empty".to_string(),
            });
        }
        if self.start_date > self.end_date {
            return Err(ConfigError::InvalidParameter {
                name: "start_date",
                reason: format!("{} is after end_date {}", self.start_date, self.end_date),
            });
        }
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "initial_cash",
                reason: format!("must be positive, got {}", self.initial_cash),
            });
        }
        if !(self.var_confidence > 0.0 && self.var_confidence < 1.0) {
            return Err(ConfigError::InvalidParameter {
                name: "var_confidence",
                reason: format!("must lie in (0, 1), got {}", self.var_confidence),
            });
        }
        if !self.risk_free_rate.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "risk_free_rate",
                reason: "must be finite".to_string(),
            });
        }
        self.costs.validate()?;
        self.surface
            .validate()
            .map_err(|e| ConfigError::InvalidParameter {
                name: "surface",
                reason: e.to_string(),
            })?;
        self.pricing_model()?;
        Ok(())
    }

    /// Builds the configured pricing model.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidParameter` for invalid model settings.
    pub fn pricing_model(&self) -> Result<PricingModel, ConfigError> {
        self.model
            .build()
            .map_err(|e| ConfigError::InvalidParameter {
                name: "model",
                reason: e.to_string(),
            })
    }
}
