//! Bump-and-revalue Greeks for models without closed-form sensitivities.

use pricer_core::types::{GreeksSet, PricingError, PricingInputs, DAYS_PER_YEAR};
use serde::{Deserialize, Serialize};

/// Bump widths for finite-difference Greeks.
///
/// # Default Values
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `spot_relative` | 0.01 | Spot bump as a fraction of spot |
/// | `vol_absolute` | 0.01 | Volatility bump (1 vol point) |
/// | `rate_absolute` | 0.0001 | Rate bump (1bp) |
/// | `time_absolute` | 1/365 | Time decay step (one calendar day) |
///
/// # Examples
///
/// ```
/// use pricer_models::greeks::FiniteDifferenceBumps;
///
/// let bumps = FiniteDifferenceBumps::default().with_spot_relative(0.001);
/// assert!(bumps.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiniteDifferenceBumps {
    /// Relative spot bump.
    pub spot_relative: f64,
    /// Absolute volatility bump.
    pub vol_absolute: f64,
    /// Absolute rate bump.
    pub rate_absolute: f64,
    /// Time step for theta, in years.
    pub time_absolute: f64,
}

impl Default for FiniteDifferenceBumps {
    fn default() -> Self {
        Self {
            spot_relative: 0.01,
            vol_absolute: 0.01,
            rate_absolute: 1e-4,
            time_absolute: 1.0 / DAYS_PER_YEAR,
        }
    }
}

impl FiniteDifferenceBumps {
    /// Sets the relative spot bump.
    pub fn with_spot_relative(mut self, bump: f64) -> Self {
        self.spot_relative = bump;
        self
    }

    /// Sets the absolute volatility bump.
    pub fn with_vol_absolute(mut self, bump: f64) -> Self {
        self.vol_absolute = bump;
        self
    }

    /// Validates the bump widths.
    pub fn validate(&self) -> Result<(), PricingError> {
        let widths = [
            ("spot_relative", self.spot_relative),
            ("vol_absolute", self.vol_absolute),
            ("rate_absolute", self.rate_absolute),
            ("time_absolute", self.time_absolute),
        ];
        match widths.iter().find(|(_, w)| !(w.is_finite() && *w > 0.0)) {
            Some((name, w)) => Err(PricingError::InvalidInput(format!(
                "bump {} must be positive, got {}",
                name, w
            ))),
            None => Ok(()),
        }
    }
}

/// Greeks of `price_fn` around `inputs` by bump-and-revalue.
///
/// Spot and rate use centred differences. Volatility uses centred
/// differences unless the bump would push σ below zero, in which case it
/// switches to forward differences. Theta is the one-step forward decay
/// `(V(T - h) - V(T)) / h` with the step truncated at expiry; an expired
/// contract has zero theta.
///
/// # Arguments
///
/// * `price_fn` - Pricing function, called on bumped copies of `inputs`
/// * `inputs` - Base point
/// * `bumps` - Bump widths
///
/// # Errors
///
/// Propagates the first error returned by `price_fn`, or
/// `PricingError::NumericalInstability` if a Greek is not finite.
pub fn finite_difference_greeks<F>(
    price_fn: F,
    inputs: &PricingInputs,
    bumps: &FiniteDifferenceBumps,
) -> Result<GreeksSet, PricingError>
where
    F: Fn(&PricingInputs) -> Result<f64, PricingError>,
{
    bumps.validate()?;
    inputs.validate()?;

    let base = price_fn(inputs)?;
    let s = inputs.spot;
    let h_s = s * bumps.spot_relative;
    let up = price_fn(&inputs.with_spot(s + h_s))?;
    let down = price_fn(&inputs.with_spot(s - h_s))?;
    let delta = (up - down) / (2.0 * h_s);
    let gamma = (up - 2.0 * base + down) / (h_s * h_s);

    let sigma = inputs.volatility;
    let h_v = bumps.vol_absolute;
    let at = |spot: f64, vol: f64| price_fn(&inputs.with_spot(spot).with_volatility(vol));

    let (vega, volga, vanna) = if sigma >= h_v {
        let v_up = at(s, sigma + h_v)?;
        let v_down = at(s, sigma - h_v)?;
        let cross = at(s + h_s, sigma + h_v)? - at(s + h_s, sigma - h_v)?
            - at(s - h_s, sigma + h_v)?
            + at(s - h_s, sigma - h_v)?;
        (
            (v_up - v_down) / (2.0 * h_v),
            (v_up - 2.0 * base + v_down) / (h_v * h_v),
            cross / (4.0 * h_s * h_v),
        )
    } else {
        let v1 = at(s, sigma + h_v)?;
        let v2 = at(s, sigma + 2.0 * h_v)?;
        let cross = (at(s + h_s, sigma + h_v)? - at(s - h_s, sigma + h_v)?) - (up - down);
        (
            (v1 - base) / h_v,
            (v2 - 2.0 * v1 + base) / (h_v * h_v),
            cross / (2.0 * h_s * h_v),
        )
    };

    let h_r = bumps.rate_absolute;
    let rho = (price_fn(&inputs.with_rate(inputs.rate + h_r))?
        - price_fn(&inputs.with_rate(inputs.rate - h_r))?)
        / (2.0 * h_r);

    let theta = if inputs.is_expired() {
        0.0
    } else {
        let h_t = bumps.time_absolute.min(inputs.time_to_expiry);
        let decayed = price_fn(&inputs.with_time_to_expiry(inputs.time_to_expiry - h_t))?;
        (decayed - base) / h_t
    };

    let greeks = GreeksSet {
        delta,
        gamma,
        theta,
        vega,
        rho,
        vanna,
        volga,
    };
    if greeks.is_finite() {
        Ok(greeks)
    } else {
        Err(PricingError::NumericalInstability(
            "finite-difference Greeks are not finite".to_string(),
        ))
    }
}
