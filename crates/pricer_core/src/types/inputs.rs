//! Single-contract pricing inputs.

use super::error::PricingError;
use super::option::{ExerciseStyle, OptionType};
use serde::{Deserialize, Serialize};

/// Remaining life below which a contract is treated as expired.
pub const EXPIRY_EPSILON: f64 = 1e-10;

/// Everything a pricing model needs to value one vanilla contract.
///
/// All rates are continuously compounded and annualised; `time_to_expiry`
/// is in years. Every model calls [`PricingInputs::validate`] before doing
/// any work, so malformed inputs surface as `PricingError::InvalidInput`.
///
/// # Examples
/// ```
/// use pricer_core::types::{OptionType, PricingInputs};
///
/// let inputs = PricingInputs::new(100.0, 105.0, 0.5, 0.05, 0.01, 0.2, OptionType::Call);
/// assert!(inputs.validate().is_ok());
/// assert!(inputs.with_volatility(-0.1).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingInputs {
    /// Spot price of the underlying.
    pub spot: f64,
    /// Strike price.
    pub strike: f64,
    /// Time to expiry in years.
    pub time_to_expiry: f64,
    /// Risk-free rate.
    pub rate: f64,
    /// Continuous dividend yield.
    pub dividend_yield: f64,
    /// Volatility (annualised).
    pub volatility: f64,
    /// Call or put.
    pub option_type: OptionType,
    /// Exercise style.
    pub exercise: ExerciseStyle,
}

impl PricingInputs {
    /// Creates European pricing inputs.
    pub fn new(
        spot: f64,
        strike: f64,
        time_to_expiry: f64,
        rate: f64,
        dividend_yield: f64,
        volatility: f64,
        option_type: OptionType,
    ) -> Self {
        Self {
            spot,
            strike,
            time_to_expiry,
            rate,
            dividend_yield,
            volatility,
            option_type,
            exercise: ExerciseStyle::European,
        }
    }

    /// Sets the exercise style.
    pub fn with_exercise(mut self, exercise: ExerciseStyle) -> Self {
        self.exercise = exercise;
        self
    }

    /// Replaces the spot price.
    pub fn with_spot(mut self, spot: f64) -> Self {
        self.spot = spot;
        self
    }

    /// Replaces the volatility.
    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    /// Replaces the risk-free rate.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Replaces the time to expiry.
    pub fn with_time_to_expiry(mut self, time_to_expiry: f64) -> Self {
        self.time_to_expiry = time_to_expiry;
        self
    }

    /// Replaces the option type.
    pub fn with_option_type(mut self, option_type: OptionType) -> Self {
        self.option_type = option_type;
        self
    }

    /// Checks the domain of every input.
    ///
    /// # Errors
    ///
    /// `PricingError::InvalidInput` if spot or strike is not strictly positive,
    /// time or volatility is negative, or any field is non-finite.
    pub fn validate(&self) -> Result<(), PricingError> {
        let fields = [
            ("spot", self.spot),
            ("strike", self.strike),
            ("time_to_expiry", self.time_to_expiry),
            ("rate", self.rate),
            ("dividend_yield", self.dividend_yield),
            ("volatility", self.volatility),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PricingError::InvalidInput(format!(
                "{} must be finite, got {}",
                name, value
            )));
        }
        if self.spot <= 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "spot must be positive, got {}",
                self.spot
            )));
        }
        if self.strike <= 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "strike must be positive, got {}",
                self.strike
            )));
        }
        if self.time_to_expiry < 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "time to expiry must be non-negative, got {}",
                self.time_to_expiry
            )));
        }
        if self.volatility < 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "volatility must be non-negative, got {}",
                self.volatility
            )));
        }
        Ok(())
    }

    /// Returns true when the contract has no remaining life.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.time_to_expiry <= EXPIRY_EPSILON
    }

    /// Forward price `S e^{(r-q)T}`.
    #[inline]
    pub fn forward(&self) -> f64 {
        self.spot * ((self.rate - self.dividend_yield) * self.time_to_expiry).exp()
    }

    /// Discount factor `e^{-rT}`.
    #[inline]
    pub fn discount_factor(&self) -> f64 {
        (-self.rate * self.time_to_expiry).exp()
    }

    /// Immediate exercise value.
    #[inline]
    pub fn intrinsic(&self) -> f64 {
        self.option_type.intrinsic(self.spot, self.strike)
    }

    /// Value when volatility is zero: the discounted payoff on the forward.
    ///
    /// For American contracts the immediate exercise value is a floor.
    pub fn deterministic_value(&self) -> f64 {
        let df = self.discount_factor();
        let european = self.option_type.intrinsic(self.forward(), self.strike) * df;
        match self.exercise {
            ExerciseStyle::European => european,
            ExerciseStyle::American => european.max(self.intrinsic()),
        }
    }
}
