//! Semi-analytic Heston pricing.
//!
//! ## Lewis Single-Integral Form
//!
//! With F the forward and k = ln(F/K):
//!
//! ```text
//! C = e^(-rT) · (F - √(FK)/π · ∫₀^∞ Re[e^(iuk) ψ(u - i/2)] / (u² + 1/4) du)
//! ```
//!
//! where ψ is the characteristic function of ln(S_T/F). ψ uses the
//! "little trap" formulation (Albrecher et al., 2007), which keeps the
//! complex logarithm on its principal branch for long maturities.
//!
//! ## Quadrature
//!
//! Composite Simpson on blocks of fixed width. Blocks are appended until
//! the integrand envelope |ψ(u - i/2)| / (u² + 1/4) drops below a
//! tolerance or the upper limit cap is reached. The envelope does not
//! depend on strike, so one [`HestonSlice`] prices every strike of an
//! expiry.

use num_complex::Complex64;
use pricer_core::types::{GreeksSet, OptionType, PricingError, PricingInputs};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::params::HestonParams;
use crate::analytical::MIN_TOTAL_VOL;
use crate::greeks::{finite_difference_greeks, FiniteDifferenceBumps};

/// Quadrature settings for the Lewis integral.
///
/// # Default Values
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `step` | 0.05 | Simpson node spacing |
/// | `block_width` | 10.0 | Width of each integration block |
/// | `envelope_tolerance` | 1e-12 | Stop once the integrand envelope falls below this |
/// | `max_upper_limit` | 5000.0 | Hard cap on the upper integration limit |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HestonIntegration {
    /// Simpson node spacing.
    pub step: f64,
    /// Width of each integration block.
    pub block_width: f64,
    /// Envelope level at which the integral is truncated.
    pub envelope_tolerance: f64,
    /// Hard cap on the upper integration limit.
    pub max_upper_limit: f64,
}

impl Default for HestonIntegration {
    fn default() -> Self {
        Self {
            step: 0.05,
            block_width: 10.0,
            envelope_tolerance: 1e-12,
            max_upper_limit: 5000.0,
        }
    }
}

impl HestonIntegration {
    fn validate(&self) -> Result<(), PricingError> {
        let ok = self.step > 0.0
            && self.block_width >= self.step
            && self.envelope_tolerance > 0.0
            && self.max_upper_limit >= self.block_width
            && [self.step, self.block_width, self.envelope_tolerance, self.max_upper_limit]
                .iter()
                .all(|x| x.is_finite());
        if ok {
            Ok(())
        } else {
            Err(PricingError::InvalidInput(format!(
                "invalid heston integration settings: {:?}",
                self
            )))
        }
    }
}

/// Characteristic function of ln(S_T / F) at complex argument `z`.
pub fn characteristic_function(params: &HestonParams, z: Complex64, t: f64) -> Complex64 {
    let i = Complex64::i();
    let one = Complex64::new(1.0, 0.0);
    let xi2 = params.xi * params.xi;

    let beta = params.kappa - params.rho * params.xi * i * z;
    let d = (beta * beta + xi2 * (z * z + i * z)).sqrt();
    let g = (beta - d) / (beta + d);
    let exp_dt = (-d * t).exp();

    let c = params.kappa * params.theta / xi2
        * ((beta - d) * t - 2.0 * ((one - g * exp_dt) / (one - g)).ln());
    let dd = (beta - d) / xi2 * ((one - exp_dt) / (one - g * exp_dt));
    (c + dd * params.v0).exp()
}

/// Precomputed quadrature for one expiry.
///
/// Holds Simpson-weighted values of ψ(u - i/2) / (u² + 1/4) on the nodes,
/// so pricing a strike costs one complex exponential per node.
#[derive(Debug, Clone)]
pub struct HestonSlice {
    expiry: f64,
    nodes: Vec<f64>,
    weighted: Vec<Complex64>,
}

impl HestonSlice {
    /// Builds the quadrature for `expiry`.
    ///
    /// # Errors
    ///
    /// * `PricingError::InvalidInput` - Invalid parameters, settings or expiry
    /// * `PricingError::NumericalInstability` - Non-finite characteristic function
    pub fn new(
        params: &HestonParams,
        expiry: f64,
        integration: &HestonIntegration,
    ) -> Result<Self, PricingError> {
        params.validate()?;
        integration.validate()?;
        if !(expiry.is_finite() && expiry > 0.0) {
            return Err(PricingError::InvalidInput(format!(
                "heston expiry must be positive, got {}",
                expiry
            )));
        }

        let mut intervals = (integration.block_width / integration.step).ceil() as usize;
        if intervals % 2 == 1 {
            intervals += 1;
        }
        let h = integration.block_width / intervals as f64;
        let shift = Complex64::new(0.0, -0.5);

        let mut nodes = Vec::new();
        let mut weighted = Vec::new();
        let mut start = 0.0;
        while start < integration.max_upper_limit {
            let mut envelope: f64 = 0.0;
            for j in 0..=intervals {
                let u = start + j as f64 * h;
                let value = characteristic_function(params, Complex64::new(u, 0.0) + shift, expiry)
                    / (u * u + 0.25);
                if !(value.re.is_finite() && value.im.is_finite()) {
                    return Err(PricingError::NumericalInstability(format!(
                        "heston characteristic function not finite at u = {}",
                        u
                    )));
                }
                envelope = envelope.max(value.norm());
                let simpson = if j == 0 || j == intervals {
                    1.0
                } else if j % 2 == 1 {
                    4.0
                } else {
                    2.0
                };
                nodes.push(u);
                weighted.push(value * (simpson * h / 3.0));
            }
            start += integration.block_width;
            if envelope < integration.envelope_tolerance {
                break;
            }
        }

        Ok(Self {
            expiry,
            nodes,
            weighted,
        })
    }

    /// Expiry this slice was built for.
    pub fn expiry(&self) -> f64 {
        self.expiry
    }

    /// Upper integration limit that was reached.
    pub fn upper_limit(&self) -> f64 {
        self.nodes.last().copied().unwrap_or(0.0)
    }

    /// European price of a strike on this expiry.
    ///
    /// Puts come from put-call parity. The result is clamped to the
    /// no-arbitrage band so quadrature noise cannot produce a negative price.
    pub fn price(
        &self,
        spot: f64,
        strike: f64,
        rate: f64,
        dividend_yield: f64,
        option_type: OptionType,
    ) -> f64 {
        let t = self.expiry;
        let df = (-rate * t).exp();
        let forward = spot * ((rate - dividend_yield) * t).exp();
        let k = (forward / strike).ln();

        let integral: f64 = self
            .nodes
            .iter()
            .zip(&self.weighted)
            .map(|(&u, w)| (Complex64::new(0.0, u * k).exp() * w).re)
            .sum();
        let call = df * (forward - (forward * strike).sqrt() * integral / PI);
        let call = call.clamp(df * (forward - strike).max(0.0), df * forward);

        match option_type {
            OptionType::Call => call,
            OptionType::Put => (call - df * (forward - strike)).max(0.0),
        }
    }
}

/// Where the initial variance comes from when pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceSource {
    /// v₀ = σ² from the volatility in the pricing inputs.
    #[default]
    InputVolatility,
    /// v₀ from the stored (calibrated) parameters; input volatility ignored.
    Calibrated,
}

/// Heston model pricer.
///
/// American contracts are priced as their European equivalent.
///
/// # Examples
///
/// ```
/// use pricer_core::types::{OptionType, PricingInputs};
/// use pricer_models::heston::{HestonModel, HestonParams};
///
/// let model = HestonModel::new(HestonParams::new(0.04, 0.04, 1.5, 0.3, -0.7));
/// let inputs = PricingInputs::new(100.0, 100.0, 0.5, 0.03, 0.0, 0.2, OptionType::Call);
/// let price = model.price(&inputs).unwrap();
/// assert!(price > 0.0 && price < 100.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HestonModel {
    /// Model parameters.
    pub params: HestonParams,
    /// Source of v₀.
    #[serde(default)]
    pub variance_source: VarianceSource,
    /// Quadrature settings.
    #[serde(default)]
    pub integration: HestonIntegration,
    /// Bump widths for Greeks.
    #[serde(default)]
    pub bumps: FiniteDifferenceBumps,
}

impl Default for HestonModel {
    fn default() -> Self {
        Self::new(HestonParams::default())
    }
}

impl HestonModel {
    /// Model driven by the input volatility, with default quadrature.
    pub fn new(params: HestonParams) -> Self {
        Self {
            params,
            variance_source: VarianceSource::default(),
            integration: HestonIntegration::default(),
            bumps: FiniteDifferenceBumps::default(),
        }
    }

    /// Sets the variance source.
    pub fn with_variance_source(mut self, source: VarianceSource) -> Self {
        self.variance_source = source;
        self
    }

    /// Sets the quadrature settings.
    pub fn with_integration(mut self, integration: HestonIntegration) -> Self {
        self.integration = integration;
        self
    }

    /// Parameters used for `inputs`, with v₀ resolved.
    pub fn effective_params(&self, inputs: &PricingInputs) -> HestonParams {
        match self.variance_source {
            VarianceSource::InputVolatility => {
                self.params.with_v0(inputs.volatility * inputs.volatility)
            }
            VarianceSource::Calibrated => self.params,
        }
    }

    /// Theoretical price.
    ///
    /// # Errors
    ///
    /// * `PricingError::InvalidInput` - Invalid inputs or parameters
    /// * `PricingError::NumericalInstability` - Quadrature produced non-finite values
    pub fn price(&self, inputs: &PricingInputs) -> Result<f64, PricingError> {
        inputs.validate()?;
        self.params.validate()?;
        if inputs.is_expired() {
            return Ok(inputs.intrinsic());
        }
        if self.variance_source == VarianceSource::InputVolatility
            && inputs.volatility * inputs.time_to_expiry.sqrt() < MIN_TOTAL_VOL
        {
            return Ok(inputs.deterministic_value());
        }

        let slice = HestonSlice::new(
            &self.effective_params(inputs),
            inputs.time_to_expiry,
            &self.integration,
        )?;
        PricingError::check_finite(
            slice.price(
                inputs.spot,
                inputs.strike,
                inputs.rate,
                inputs.dividend_yield,
                inputs.option_type,
            ),
            "heston price",
        )
    }

    /// Prices several strikes of one expiry from a single quadrature.
    pub fn price_strip(
        &self,
        inputs: &PricingInputs,
        strikes: &[(f64, OptionType)],
    ) -> Result<Vec<f64>, PricingError> {
        strikes
            .iter()
            .map(|&(strike, option_type)| {
                let leg = PricingInputs {
                    strike,
                    option_type,
                    ..*inputs
                };
                leg.validate()
            })
            .collect::<Result<Vec<_>, _>>()?;
        if inputs.is_expired() {
            return Ok(strikes
                .iter()
                .map(|&(strike, option_type)| option_type.intrinsic(inputs.spot, strike))
                .collect());
        }

        let slice = HestonSlice::new(
            &self.effective_params(inputs),
            inputs.time_to_expiry,
            &self.integration,
        )?;
        strikes
            .iter()
            .map(|&(strike, option_type)| {
                PricingError::check_finite(
                    slice.price(
                        inputs.spot,
                        strike,
                        inputs.rate,
                        inputs.dividend_yield,
                        option_type,
                    ),
                    "heston price",
                )
            })
            .collect()
    }

    /// Greeks by finite differences.
    ///
    /// With calibrated variance the volatility bump is applied to √v₀, so
    /// vega measures sensitivity to the initial instantaneous volatility.
    pub fn greeks(&self, inputs: &PricingInputs) -> Result<GreeksSet, PricingError> {
        let (model, base) = match self.variance_source {
            VarianceSource::InputVolatility => (*self, *inputs),
            VarianceSource::Calibrated => (
                self.with_variance_source(VarianceSource::InputVolatility),
                inputs.with_volatility(self.params.v0.sqrt()),
            ),
        };
        finite_difference_greeks(|bumped| model.price(bumped), &base, &self.bumps)
    }
}
