//! Black-Scholes-Merton pricing for European options.
//!
//! ## Mathematical Formulas
//!
//! **Call Price**: C = S·e^(-qT)·N(d₁) - K·e^(-rT)·N(d₂)
//! **Put Price**: P = K·e^(-rT)·N(-d₂) - S·e^(-qT)·N(-d₁)
//!
//! Where:
//! - d₁ = (ln(S/K) + (r - q + σ²/2)T) / (σ√T)
//! - d₂ = d₁ - σ√T
//!
//! ## Degenerate Cases
//!
//! - T = 0: intrinsic value, Greeks of the payoff
//! - σ√T below [`MIN_TOTAL_VOL`]: discounted payoff on the forward
//!
//! d₁ and d₂ are formed from the log-moneyness, so deep out-of-the-money
//! strikes produce large finite arguments to N(·) rather than overflow.

use pricer_core::math::distributions::{norm_cdf, norm_pdf};
use pricer_core::types::{GreeksSet, PricingError, PricingInputs};
use serde::{Deserialize, Serialize};

/// Total volatility σ√T below which the deterministic limit is used.
pub const MIN_TOTAL_VOL: f64 = 1e-12;

/// Closed-form Black-Scholes-Merton model with continuous dividend yield.
///
/// Stateless: every call receives its inputs explicitly. American contracts
/// are priced as their European equivalent.
///
/// # Examples
/// ```
/// use pricer_core::types::{OptionType, PricingInputs};
/// use pricer_models::analytical::BlackScholes;
///
/// let call = PricingInputs::new(100.0, 100.0, 1.0, 0.05, 0.0, 0.2, OptionType::Call);
/// let put = call.with_option_type(OptionType::Put);
///
/// let c = BlackScholes.price(&call).unwrap();
/// let p = BlackScholes.price(&put).unwrap();
///
/// // Put-call parity: C - P = S - K·e^(-rT)
/// let parity = c - p - (100.0 - 100.0 * (-0.05_f64).exp());
/// assert!(parity.abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackScholes;

/// d₁ and d₂ for non-degenerate inputs.
#[inline]
pub fn d1_d2(inputs: &PricingInputs) -> (f64, f64) {
    let total_vol = inputs.volatility * inputs.time_to_expiry.sqrt();
    let log_moneyness = (inputs.spot / inputs.strike).ln();
    let drift = (inputs.rate - inputs.dividend_yield) * inputs.time_to_expiry;
    let d1 = (log_moneyness + drift) / total_vol + 0.5 * total_vol;
    (d1, d1 - total_vol)
}

impl BlackScholes {
    /// Theoretical price.
    ///
    /// # Errors
    ///
    /// `PricingError::InvalidInput` when [`PricingInputs::validate`] fails.
    pub fn price(&self, inputs: &PricingInputs) -> Result<f64, PricingError> {
        inputs.validate()?;
        PricingError::check_finite(Self::price_unchecked(inputs), "Black-Scholes price")
    }

    /// Analytic Greeks including vanna and volga.
    pub fn greeks(&self, inputs: &PricingInputs) -> Result<GreeksSet, PricingError> {
        inputs.validate()?;
        let greeks = Self::greeks_unchecked(inputs);
        if greeks.is_finite() {
            Ok(greeks)
        } else {
            Err(PricingError::NumericalInstability(
                "Black-Scholes Greeks are not finite".to_string(),
            ))
        }
    }

    /// Price and Greeks from a single validation pass.
    pub fn price_and_greeks(
        &self,
        inputs: &PricingInputs,
    ) -> Result<(f64, GreeksSet), PricingError> {
        let greeks = self.greeks(inputs)?;
        let price =
            PricingError::check_finite(Self::price_unchecked(inputs), "Black-Scholes price")?;
        Ok((price, greeks))
    }

    /// Price without input validation, for inner loops such as
    /// implied-volatility inversion that have already validated.
    pub fn price_unchecked(inputs: &PricingInputs) -> f64 {
        if inputs.is_expired() {
            return inputs.intrinsic();
        }
        let total_vol = inputs.volatility * inputs.time_to_expiry.sqrt();
        if total_vol < MIN_TOTAL_VOL {
            return inputs
                .option_type
                .intrinsic(inputs.forward(), inputs.strike)
                * inputs.discount_factor();
        }

        let (d1, d2) = d1_d2(inputs);
        let w = inputs.option_type.sign();
        let spot_df = inputs.spot * (-inputs.dividend_yield * inputs.time_to_expiry).exp();
        let strike_df = inputs.strike * inputs.discount_factor();
        (w * (spot_df * norm_cdf(w * d1) - strike_df * norm_cdf(w * d2))).max(0.0)
    }

    /// ∂V/∂σ without validation.
    pub fn vega_unchecked(inputs: &PricingInputs) -> f64 {
        if inputs.is_expired() {
            return 0.0;
        }
        let total_vol = inputs.volatility * inputs.time_to_expiry.sqrt();
        if total_vol < MIN_TOTAL_VOL {
            return 0.0;
        }
        let (d1, _) = d1_d2(inputs);
        inputs.spot
            * (-inputs.dividend_yield * inputs.time_to_expiry).exp()
            * norm_pdf(d1)
            * inputs.time_to_expiry.sqrt()
    }

    fn greeks_unchecked(inputs: &PricingInputs) -> GreeksSet {
        let w = inputs.option_type.sign();
        let t = inputs.time_to_expiry;

        if inputs.is_expired() {
            let delta = if inputs.option_type.is_in_the_money(inputs.spot, inputs.strike) {
                w
            } else {
                0.0
            };
            return GreeksSet {
                delta,
                ..GreeksSet::zero()
            };
        }

        let div_df = (-inputs.dividend_yield * t).exp();
        let df = inputs.discount_factor();
        let total_vol = inputs.volatility * t.sqrt();

        if total_vol < MIN_TOTAL_VOL {
            let in_the_money = inputs.option_type.is_in_the_money(inputs.forward(), inputs.strike);
            if !in_the_money {
                return GreeksSet::zero();
            }
            return GreeksSet {
                delta: w * div_df,
                theta: w
                    * (inputs.dividend_yield * inputs.spot * div_df
                        - inputs.rate * inputs.strike * df),
                rho: w * inputs.strike * t * df,
                ..GreeksSet::zero()
            };
        }

        let (d1, d2) = d1_d2(inputs);
        let pdf_d1 = norm_pdf(d1);
        let sqrt_t = t.sqrt();
        let sigma = inputs.volatility;
        let s = inputs.spot;
        let k = inputs.strike;

        let vega = s * div_df * pdf_d1 * sqrt_t;
        GreeksSet {
            delta: w * div_df * norm_cdf(w * d1),
            gamma: div_df * pdf_d1 / (s * total_vol),
            theta: -s * div_df * pdf_d1 * sigma / (2.0 * sqrt_t)
                - w * inputs.rate * k * df * norm_cdf(w * d2)
                + w * inputs.dividend_yield * s * div_df * norm_cdf(w * d1),
            vega,
            rho: w * k * t * df * norm_cdf(w * d2),
            vanna: -div_df * pdf_d1 * d2 / sigma,
            volga: vega * d1 * d2 / sigma,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pricer_core::types::OptionType;
    use proptest::prelude::*;

    fn inputs(option_type: OptionType) -> PricingInputs {
        PricingInputs::new(100.0, 100.0, 1.0, 0.05, 0.0, 0.2, option_type)
    }

    // ==========================================================
    // Prices
    // ==========================================================

    #[test]
    fn test_reference_prices() {
        // Hull, 10th ed. reference: S=K=100, r=5%, σ=20%, T=1
        let call = BlackScholes.price(&inputs(OptionType::Call)).unwrap();
        let put = BlackScholes.price(&inputs(OptionType::Put)).unwrap();
        assert_relative_eq!(call, 10.450_583_572_185_565, epsilon = 1e-9);
        assert_relative_eq!(put, 5.573_526_022_256_971, epsilon = 1e-9);
    }

    #[test]
    fn test_dividend_reduces_call_value() {
        let base = inputs(OptionType::Call);
        let with_div = PricingInputs {
            dividend_yield: 0.03,
            ..base
        };
        assert!(BlackScholes.price(&with_div).unwrap() < BlackScholes.price(&base).unwrap());
    }

    #[test]
    fn test_expired_returns_intrinsic() {
        let expired = inputs(OptionType::Put)
            .with_spot(90.0)
            .with_time_to_expiry(0.0);
        assert_eq!(BlackScholes.price(&expired).unwrap(), 10.0);
        let g = BlackScholes.greeks(&expired).unwrap();
        assert_eq!(g.delta, -1.0);
        assert_eq!(g.gamma, 0.0);
    }

    #[test]
    fn test_zero_volatility_prices_forward_payoff() {
        let call = inputs(OptionType::Call).with_volatility(0.0);
        let expected = (100.0 * 0.05_f64.exp() - 100.0) * (-0.05_f64).exp();
        assert_relative_eq!(BlackScholes.price(&call).unwrap(), expected, epsilon = 1e-12);
        let g = BlackScholes.greeks(&call).unwrap();
        assert_relative_eq!(g.delta, 1.0);
        assert_eq!(g.vega, 0.0);
    }

    #[test]
    fn test_negative_cost_of_carry() {
        // q > r: forward below spot
        let put = PricingInputs::new(100.0, 100.0, 2.0, 0.01, 0.08, 0.25, OptionType::Put);
        let call = put.with_option_type(OptionType::Call);
        let c = BlackScholes.price(&call).unwrap();
        let p = BlackScholes.price(&put).unwrap();
        let parity = 100.0 * (-0.16_f64).exp() - 100.0 * (-0.02_f64).exp();
        assert_relative_eq!(c - p, parity, epsilon = 1e-10);
        assert!(p > c);
    }

    #[test]
    fn test_deep_out_of_the_money_is_finite_and_non_negative() {
        let call = PricingInputs::new(100.0, 1e6, 0.1, 0.05, 0.0, 0.1, OptionType::Call);
        let price = BlackScholes.price(&call).unwrap();
        assert!(price >= 0.0 && price < 1e-12);
        let g = BlackScholes.greeks(&call).unwrap();
        assert!(g.is_finite());
    }

    #[test]
    fn test_rejects_domain_errors() {
        let bad = inputs(OptionType::Call).with_volatility(-0.2);
        assert!(BlackScholes.price(&bad).unwrap_err().is_domain_error());
        let bad = inputs(OptionType::Call).with_spot(-1.0);
        assert!(BlackScholes.greeks(&bad).unwrap_err().is_domain_error());
    }

    // ==========================================================
    // Greeks against bump-and-revalue
    // ==========================================================

    #[test]
    fn test_delta_matches_centred_difference() {
        for option_type in [OptionType::Call, OptionType::Put] {
            let base = PricingInputs {
                dividend_yield: 0.02,
                ..inputs(option_type)
            };
            let h = base.spot * 1e-4;
            let up = BlackScholes.price(&base.with_spot(base.spot + h)).unwrap();
            let down = BlackScholes.price(&base.with_spot(base.spot - h)).unwrap();
            let fd = (up - down) / (2.0 * h);
            let analytic = BlackScholes.greeks(&base).unwrap().delta;
            assert_relative_eq!(analytic, fd, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_second_order_greeks_match_differences() {
        let base = PricingInputs::new(105.0, 95.0, 0.75, 0.03, 0.01, 0.25, OptionType::Call);
        let g = BlackScholes.greeks(&base).unwrap();
        let h = 1e-4;

        let delta_at = |vol: f64| BlackScholes.greeks(&base.with_volatility(vol)).unwrap().delta;
        let vanna_fd = (delta_at(0.25 + h) - delta_at(0.25 - h)) / (2.0 * h);
        assert_relative_eq!(g.vanna, vanna_fd, max_relative = 1e-5);

        let vega_at = |vol: f64| BlackScholes.greeks(&base.with_volatility(vol)).unwrap().vega;
        let volga_fd = (vega_at(0.25 + h) - vega_at(0.25 - h)) / (2.0 * h);
        assert_relative_eq!(g.volga, volga_fd, max_relative = 1e-5);

        let rate_h = 1e-5;
        let rho_fd = (BlackScholes.price(&base.with_rate(0.03 + rate_h)).unwrap()
            - BlackScholes.price(&base.with_rate(0.03 - rate_h)).unwrap())
            / (2.0 * rate_h);
        assert_relative_eq!(g.rho, rho_fd, max_relative = 1e-5);

        // Theta is the derivative with respect to calendar time, i.e. -∂V/∂T.
        let t_h = 1e-5;
        let theta_fd = -(BlackScholes.price(&base.with_time_to_expiry(0.75 + t_h)).unwrap()
            - BlackScholes.price(&base.with_time_to_expiry(0.75 - t_h)).unwrap())
            / (2.0 * t_h);
        assert_relative_eq!(g.theta, theta_fd, max_relative = 1e-5);
    }

    proptest! {
        #[test]
        fn prop_put_call_parity(
            spot in 20.0f64..300.0,
            strike in 20.0f64..300.0,
            t in 0.01f64..3.0,
            r in -0.01f64..0.1,
            q in 0.0f64..0.06,
            vol in 0.05f64..1.0,
        ) {
            let call = PricingInputs::new(spot, strike, t, r, q, vol, OptionType::Call);
            let put = call.with_option_type(OptionType::Put);
            let c = BlackScholes.price(&call).unwrap();
            let p = BlackScholes.price(&put).unwrap();
            let forward_value = spot * (-q * t).exp() - strike * (-r * t).exp();
            prop_assert!((c - p - forward_value).abs() < 1e-9 * spot.max(strike));
        }

        #[test]
        fn prop_price_within_no_arbitrage_bounds(
            spot in 50.0f64..150.0,
            strike in 50.0f64..150.0,
            t in 0.01f64..2.0,
            vol in 0.01f64..1.5,
        ) {
            let call = PricingInputs::new(spot, strike, t, 0.03, 0.01, vol, OptionType::Call);
            let c = BlackScholes.price(&call).unwrap();
            let lower = call.deterministic_value();
            prop_assert!(c >= lower - 1e-10);
            prop_assert!(c <= spot * (-0.01 * t).exp() + 1e-10);
        }
    }
}
