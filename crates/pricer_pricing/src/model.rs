//! Enum dispatch over the pricing model variants.
//!
//! [`PricingModel`] is the single capability interface used by the risk and
//! backtest layers: `price`, `greeks` and `evaluate` route to the concrete
//! model with a static `match`, so no trait objects are involved.
//!
//! [`ModelConfig`] is the serialisable description of a model, tagged by
//! `model = "..."` in TOML or JSON, and is turned into a [`PricingModel`]
//! by [`ModelConfig::build`].

use pricer_core::types::{GreeksSet, PricingError, PricingInputs};
use pricer_models::analytical::BlackScholes;
use pricer_models::heston::HestonModel;
use pricer_models::lattice::BinomialTree;
use serde::{Deserialize, Serialize};

use crate::mc::{MonteCarloConfig, MonteCarloPricer};
use crate::result::{ModelId, PricingResult};

/// Closed set of pricing models.
///
/// # Examples
///
/// ```rust
/// use pricer_core::types::{OptionType, PricingInputs};
/// use pricer_pricing::{ModelId, PricingModel};
///
/// let inputs = PricingInputs::new(100.0, 100.0, 1.0, 0.05, 0.0, 0.2, OptionType::Call);
/// let result = PricingModel::BlackScholes.evaluate(&inputs).unwrap();
///
/// assert_eq!(result.model, ModelId::BlackScholes);
/// assert!((result.price - 10.450583572185565).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum PricingModel {
    /// Closed-form Black-Scholes-Merton.
    #[default]
    BlackScholes,
    /// Binomial lattice (European and American).
    BinomialTree(BinomialTree),
    /// Monte Carlo simulation.
    MonteCarlo(MonteCarloPricer),
    /// Heston stochastic volatility.
    Heston(HestonModel),
}

impl PricingModel {
    /// Identifier of this variant.
    pub fn id(&self) -> ModelId {
        match self {
            PricingModel::BlackScholes => ModelId::BlackScholes,
            PricingModel::BinomialTree(_) => ModelId::BinomialTree,
            PricingModel::MonteCarlo(_) => ModelId::MonteCarlo,
            PricingModel::Heston(_) => ModelId::Heston,
        }
    }

    /// Theoretical price.
    ///
    /// # Errors
    ///
    /// Returns the underlying model's `PricingError`.
    pub fn price(&self, inputs: &PricingInputs) -> Result<f64, PricingError> {
        match self {
            PricingModel::BlackScholes => BlackScholes.price(inputs),
            PricingModel::BinomialTree(tree) => tree.price(inputs),
            PricingModel::MonteCarlo(mc) => mc.price(inputs),
            PricingModel::Heston(heston) => heston.price(inputs),
        }
    }

    /// Full set of Greeks.
    ///
    /// # Errors
    ///
    /// Returns the underlying model's `PricingError`.
    pub fn greeks(&self, inputs: &PricingInputs) -> Result<GreeksSet, PricingError> {
        match self {
            PricingModel::BlackScholes => BlackScholes.greeks(inputs),
            PricingModel::BinomialTree(tree) => tree.greeks(inputs),
            PricingModel::MonteCarlo(mc) => mc.greeks(inputs),
            PricingModel::Heston(heston) => heston.greeks(inputs),
        }
    }

    /// Price and Greeks in one result.
    ///
    /// # Errors
    ///
    /// Returns the first error from pricing or the Greeks.
    pub fn evaluate(&self, inputs: &PricingInputs) -> Result<PricingResult, PricingError> {
        match self {
            PricingModel::BlackScholes => {
                let (price, greeks) = BlackScholes.price_and_greeks(inputs)?;
                Ok(PricingResult::exact(price, self.id(), greeks))
            }
            PricingModel::MonteCarlo(mc) => {
                let estimate = mc.estimate(inputs)?;
                let greeks = mc.greeks(inputs)?;
                Ok(PricingResult {
                    price: estimate.price,
                    model: self.id(),
                    greeks,
                    std_error: Some(estimate.std_error),
                    confidence_interval: Some(estimate.confidence_interval),
                    fallback: false,
                })
            }
            _ => {
                let price = self.price(inputs)?;
                let greeks = self.greeks(inputs)?;
                Ok(PricingResult::exact(price, self.id(), greeks))
            }
        }
    }

    /// Evaluates, falling back to Black-Scholes on recoverable failures.
    ///
    /// Domain errors are returned unchanged since no model can price
    /// malformed inputs. Convergence and numerical failures are logged and
    /// replaced by a Black-Scholes valuation flagged with `fallback = true`.
    ///
    /// # Errors
    ///
    /// * The original error when it is a domain error
    /// * `PricingError::ModelFailure` when every model in
    ///   [`attempted_models`](Self::attempted_models) fails; the message
    ///   names each model with its error
    pub fn evaluate_with_fallback(
        &self,
        inputs: &PricingInputs,
    ) -> Result<PricingResult, PricingError> {
        let err = match self.evaluate(inputs) {
            Ok(result) => return Ok(result),
            Err(err) if err.is_domain_error() => return Err(err),
            Err(err) => err,
        };
        if matches!(self, PricingModel::BlackScholes) {
            return Err(PricingError::ModelFailure(format!("{}: {}", self.id(), err)));
        }

        tracing::warn!(
            model = %self.id(),
            error = %err,
            spot = inputs.spot,
            strike = inputs.strike,
            "model failed, falling back to Black-Scholes"
        );
        match PricingModel::BlackScholes.evaluate(inputs) {
            Ok(mut result) => {
                result.fallback = true;
                Ok(result)
            }
            Err(fallback) => Err(PricingError::ModelFailure(format!(
                "{}: {}; {}: {}",
                self.id(),
                err,
                ModelId::BlackScholes,
                fallback
            ))),
        }
    }

    /// Models tried by [`evaluate_with_fallback`](Self::evaluate_with_fallback), in order.
    pub fn attempted_models(&self) -> Vec<ModelId> {
        match self {
            PricingModel::BlackScholes => vec![ModelId::BlackScholes],
            _ => vec![self.id(), ModelId::BlackScholes],
        }
    }
}

/// Serialisable model selection.
///
/// # Examples
///
/// ```rust
/// use pricer_pricing::{ModelConfig, ModelId};
///
/// let config: ModelConfig = toml::from_str(
///     r#"
///     model = "binomial_tree"
///     steps = 101
///     scheme = "cox_ross_rubinstein"
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.build().unwrap().id(), ModelId::BinomialTree);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelConfig {
    /// Black-Scholes.
    #[default]
    BlackScholes,
    /// Binomial lattice settings.
    BinomialTree(BinomialTree),
    /// Monte Carlo settings.
    MonteCarlo(MonteCarloConfig),
    /// Heston model settings.
    Heston(HestonModel),
}

impl ModelConfig {
    /// Identifier of the configured model.
    pub fn id(&self) -> ModelId {
        match self {
            ModelConfig::BlackScholes => ModelId::BlackScholes,
            ModelConfig::BinomialTree(_) => ModelId::BinomialTree,
            ModelConfig::MonteCarlo(_) => ModelId::MonteCarlo,
            ModelConfig::Heston(_) => ModelId::Heston,
        }
    }

    /// Validates the settings and builds the model.
    ///
    /// # Errors
    ///
    /// Returns `PricingError::InvalidInput` for invalid settings.
    pub fn build(&self) -> Result<PricingModel, PricingError> {
        match self {
            ModelConfig::BlackScholes => Ok(PricingModel::BlackScholes),
            ModelConfig::BinomialTree(tree) => {
                if tree.steps == 0 {
                    return Err(PricingError::InvalidInput(
                        "binomial tree needs at least one step".to_string(),
                    ));
                }
                tree.bumps.validate()?;
                Ok(PricingModel::BinomialTree(*tree))
            }
            ModelConfig::MonteCarlo(config) => {
                Ok(PricingModel::MonteCarlo(MonteCarloPricer::new(*config)?))
            }
            ModelConfig::Heston(heston) => {
                heston.params.validate()?;
                heston.bumps.validate()?;
                Ok(PricingModel::Heston(*heston))
            }
        }
    }
}
