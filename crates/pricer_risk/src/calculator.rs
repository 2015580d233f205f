//! Contract and portfolio Greeks.
//!
//! Every option leg is valued by one [`PricingModel`] with the volatility
//! read off the surface at the leg's strike and remaining life. Legs are
//! valued in parallel and summed in input order, so a portfolio total does
//! not depend on the number of worker threads.

use pricer_core::market_data::OptionsContract;
use pricer_core::types::{GreeksSet, PricingInputs};
use pricer_pricing::{PricingModel, PricingResult};
use pricer_surface::VolatilitySurface;
use rayon::prelude::*;
use tracing::debug;

use crate::error::RiskError;
use crate::market::MarketState;
use crate::portfolio::{Instrument, Leg, LegRisk, PortfolioRisk};

/// Per-contract and portfolio sensitivities from one pricing model.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use pricer_core::market_data::OptionsContract;
/// use pricer_core::types::{OptionType, PricingInputs};
/// use pricer_models::analytical::BlackScholes;
/// use pricer_pricing::PricingModel;
/// use pricer_risk::{GreeksCalculator, Leg, MarketState};
/// use pricer_surface::{SurfaceBuilder, SurfaceConfig};
///
/// let now = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(16, 0, 0).unwrap();
/// let expiry = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
/// let t = 91.0 / 365.0;
/// let chain: Vec<OptionsContract> = [90.0, 100.0, 110.0]
///     .iter()
///     .map(|&k| {
///         let mid = BlackScholes
///             .price(&PricingInputs::new(100.0, k, t, 0.03, 0.0, 0.2, OptionType::Call))
///             .unwrap();
///         OptionsContract::new(format!("C{}", k), "SPY", k, expiry, OptionType::Call)
///             .with_quote(mid, mid)
///     })
///     .collect();
/// let surface = SurfaceBuilder::new(SurfaceConfig::default())
///     .unwrap()
///     .build(&chain, 100.0, now, 0.03, 0.0)
///     .unwrap()
///     .into_surface();
///
/// let market = MarketState::new(100.0, 0.03, 0.0, now);
/// let legs = vec![Leg::underlying(100.0), Leg::option(chain[1].clone(), -1.0)];
/// let risk = GreeksCalculator::new(PricingModel::BlackScholes)
///     .portfolio_risk(&legs, &market, &surface)
///     .unwrap();
///
/// // Covered call: long 100 shares, short one ATM call
/// assert!(risk.greeks.delta > 0.0 && risk.greeks.delta < 100.0);
/// assert!(risk.greeks.vega < 0.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GreeksCalculator {
    model: PricingModel,
}

impl GreeksCalculator {
    /// Creates a calculator around `model`.
    pub fn new(model: PricingModel) -> Self {
        Self { model }
    }

    /// Returns the pricing model.
    #[inline]
    pub fn model(&self) -> &PricingModel {
        &self.model
    }

    /// Model inputs for `contract`, with the surface volatility shifted by
    /// `vol_shift` and floored at zero.
    ///
    /// # Errors
    ///
    /// `RiskError::Volatility` when the surface cannot be queried at the
    /// contract's strike and remaining life.
    pub fn contract_inputs(
        contract: &OptionsContract,
        market: &MarketState,
        surface: &VolatilitySurface,
        vol_shift: f64,
    ) -> Result<PricingInputs, RiskError> {
        let t = contract.time_to_expiry(market.valuation);
        let vol = surface
            .interpolate(contract.strike, t)
            .map_err(|source| RiskError::Volatility {
                symbol: contract.symbol.clone(),
                source,
            })?;
        Ok(PricingInputs::new(
            market.spot,
            contract.strike,
            t,
            market.rate,
            market.dividend_yield,
            (vol + vol_shift).max(0.0),
            contract.option_type,
        )
        .with_exercise(contract.exercise))
    }

    /// Price and Greeks of one contract.
    ///
    /// Recoverable model failures fall back to Black-Scholes; the result
    /// then carries `fallback = true`.
    ///
    /// # Errors
    ///
    /// * `RiskError::Volatility` - No surface volatility for the contract
    /// * `RiskError::Pricing` - Invalid inputs, or every model failed
    ///   (`PricingError::ModelFailure`)
    pub fn contract_greeks(
        &self,
        contract: &OptionsContract,
        market: &MarketState,
        surface: &VolatilitySurface,
    ) -> Result<PricingResult, RiskError> {
        self.evaluate(contract, market, surface, 0.0)
    }

    fn evaluate(
        &self,
        contract: &OptionsContract,
        market: &MarketState,
        surface: &VolatilitySurface,
        vol_shift: f64,
    ) -> Result<PricingResult, RiskError> {
        let inputs = Self::contract_inputs(contract, market, surface, vol_shift)?;
        self.model
            .evaluate_with_fallback(&inputs)
            .map_err(|source| {
                let attempted = if source.is_domain_error() {
                    vec![self.model.id()]
                } else {
                    self.model.attempted_models()
                };
                RiskError::Pricing {
                    symbol: contract.symbol.clone(),
                    attempted,
                    source,
                }
            })
    }

    /// Value and Greeks of one leg.
    ///
    /// Underlying legs are worth the spot and carry a delta of one per share.
    pub fn leg_risk(
        &self,
        leg: &Leg,
        market: &MarketState,
        surface: &VolatilitySurface,
    ) -> Result<LegRisk, RiskError> {
        self.leg_risk_shifted(leg, market, surface, 0.0)
    }

    pub(crate) fn leg_risk_shifted(
        &self,
        leg: &Leg,
        market: &MarketState,
        surface: &VolatilitySurface,
        vol_shift: f64,
    ) -> Result<LegRisk, RiskError> {
        let units = leg.quantity * leg.multiplier();
        match &leg.instrument {
            Instrument::Underlying => Ok(LegRisk {
                unit_price: market.spot,
                unit_greeks: GreeksSet::underlying(),
                value: units * market.spot,
                greeks: GreeksSet::underlying().scale(units),
                model: None,
                fallback: false,
            }),
            Instrument::Option { contract } => {
                let result = self.evaluate(contract, market, surface, vol_shift)?;
                Ok(LegRisk {
                    unit_price: result.price,
                    unit_greeks: result.greeks,
                    value: units * result.price,
                    greeks: result.greeks.scale(units),
                    model: Some(result.model),
                    fallback: result.fallback,
                })
            }
        }
    }

    /// Values every leg in parallel and sums them in input order.
    ///
    /// # Errors
    ///
    /// * `RiskError::InvalidMarket` - Invalid spot or carry
    /// * Any leg error; the remaining legs are discarded
    pub fn portfolio_risk(
        &self,
        legs: &[Leg],
        market: &MarketState,
        surface: &VolatilitySurface,
    ) -> Result<PortfolioRisk, RiskError> {
        self.portfolio_risk_shifted(legs, market, surface, 0.0)
    }

    pub(crate) fn portfolio_risk_shifted(
        &self,
        legs: &[Leg],
        market: &MarketState,
        surface: &VolatilitySurface,
        vol_shift: f64,
    ) -> Result<PortfolioRisk, RiskError> {
        market.validate()?;
        let valued = legs
            .par_iter()
            .map(|leg| self.leg_risk_shifted(leg, market, surface, vol_shift))
            .collect::<Result<Vec<LegRisk>, RiskError>>()?;

        let risk = PortfolioRisk::from_legs(valued);
        debug!(
            legs = legs.len(),
            value = risk.value,
            delta = risk.greeks.delta,
            fallbacks = risk.fallback_count(),
            "portfolio valued"
        );
        Ok(risk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime};
    use pricer_core::types::OptionType;
    use pricer_models::analytical::BlackScholes;
    use pricer_pricing::mc::{MonteCarloConfig, MonteCarloPricer};
    use pricer_pricing::ModelId;
    use pricer_surface::{SurfaceBuilder, SurfaceConfig};

    const SPOT: f64 = 100.0;
    const RATE: f64 = 0.03;
    const VOL: f64 = 0.2;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap()
    }

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 2).unwrap()
    }

    fn contract(strike: f64, option_type: OptionType) -> OptionsContract {
        let t = 91.0 / 365.0;
        let mid = BlackScholes
            .price(&PricingInputs::new(SPOT, strike, t, RATE, 0.0, VOL, option_type))
            .unwrap();
        OptionsContract::new(
            format!("{:?}{}", option_type, strike),
            "SPY",
            strike,
            expiry(),
            option_type,
        )
        .with_quote(mid, mid)
    }

    fn flat_surface() -> VolatilitySurface {
        let chain: Vec<OptionsContract> = [90.0, 95.0, 100.0, 105.0, 110.0]
            .iter()
            .map(|&k| contract(k, OptionType::Call))
            .collect();
        SurfaceBuilder::new(SurfaceConfig::default())
            .unwrap()
            .build(&chain, SPOT, now(), RATE, 0.0)
            .unwrap()
            .into_surface()
    }

    fn market() -> MarketState {
        MarketState::new(SPOT, RATE, 0.0, now())
    }

    #[test]
    fn test_contract_greeks_use_surface_vol() {
        let surface = flat_surface();
        let call = contract(100.0, OptionType::Call);
        let result = GreeksCalculator::default()
            .contract_greeks(&call, &market(), &surface)
            .unwrap();

        let inputs = PricingInputs::new(SPOT, 100.0, 91.0 / 365.0, RATE, 0.0, VOL, OptionType::Call);
        let (price, greeks) = BlackScholes.price_and_greeks(&inputs).unwrap();
        assert_relative_eq!(result.price, price, epsilon = 1e-6);
        assert_relative_eq!(result.greeks.delta, greeks.delta, epsilon = 1e-6);
        assert_relative_eq!(result.greeks.vega, greeks.vega, epsilon = 1e-5);
    }

    #[test]
    fn test_portfolio_is_quantity_weighted_sum() {
        let surface = flat_surface();
        let calc = GreeksCalculator::default();
        let call = contract(105.0, OptionType::Call);
        let put = contract(95.0, OptionType::Put);
        let legs = vec![
            Leg::option(call.clone(), 3.0),
            Leg::option(put.clone(), -2.0),
            Leg::underlying(-50.0),
        ];

        let risk = calc.portfolio_risk(&legs, &market(), &surface).unwrap();
        let c = calc.contract_greeks(&call, &market(), &surface).unwrap();
        let p = calc.contract_greeks(&put, &market(), &surface).unwrap();

        let delta = 300.0 * c.greeks.delta - 200.0 * p.greeks.delta - 50.0;
        let gamma = 300.0 * c.greeks.gamma - 200.0 * p.greeks.gamma;
        let value = 300.0 * c.price - 200.0 * p.price - 50.0 * SPOT;
        assert_relative_eq!(risk.greeks.delta, delta, epsilon = 1e-10);
        assert_relative_eq!(risk.greeks.gamma, gamma, epsilon = 1e-12);
        assert_relative_eq!(risk.value, value, epsilon = 1e-9);
        assert_eq!(risk.legs.len(), 3);
        assert_eq!(risk.legs[2].model, None);
        assert_eq!(risk.legs[0].model, Some(ModelId::BlackScholes));
    }

    #[test]
    fn test_underlying_leg_has_unit_delta() {
        let risk = GreeksCalculator::default()
            .leg_risk(&Leg::underlying(250.0), &market(), &flat_surface())
            .unwrap();
        assert_eq!(risk.greeks.delta, 250.0);
        assert_eq!(risk.greeks.gamma, 0.0);
        assert_eq!(risk.value, 250.0 * SPOT);
    }

    #[test]
    fn test_empty_portfolio_is_zero() {
        let risk = GreeksCalculator::default()
            .portfolio_risk(&[], &market(), &flat_surface())
            .unwrap();
        assert_eq!(risk.value, 0.0);
        assert_eq!(risk.greeks, GreeksSet::zero());
    }

    #[test]
    fn test_expired_contract_valued_at_intrinsic() {
        let surface = flat_surface();
        let call = contract(90.0, OptionType::Call);
        let at_expiry = MarketState::new(104.0, RATE, 0.0, expiry().and_hms_opt(16, 0, 0).unwrap());
        let result = GreeksCalculator::default()
            .contract_greeks(&call, &at_expiry, &surface)
            .unwrap();
        assert_relative_eq!(result.price, 14.0, epsilon = 1e-12);
        assert_eq!(result.greeks.delta, 1.0);
    }

    #[test]
    fn test_convergence_failure_falls_back() {
        let config = MonteCarloConfig::builder()
            .n_paths(1_000)
            .max_relative_error(1e-6)
            .build()
            .unwrap();
        let calc = GreeksCalculator::new(PricingModel::MonteCarlo(
            MonteCarloPricer::new(config).unwrap(),
        ));
        let legs = vec![Leg::option(contract(100.0, OptionType::Call), 1.0)];
        let risk = calc.portfolio_risk(&legs, &market(), &flat_surface()).unwrap();
        assert_eq!(risk.fallback_count(), 1);
        assert_eq!(risk.legs[0].model, Some(ModelId::BlackScholes));
    }

    #[test]
    fn test_invalid_contract_reports_symbol() {
        let mut bad = contract(100.0, OptionType::Call);
        bad.strike = -5.0;
        let err = GreeksCalculator::default()
            .contract_greeks(&bad, &market(), &flat_surface())
            .unwrap_err();
        match err {
            RiskError::Volatility { symbol, .. } | RiskError::Pricing { symbol, .. } => {
                assert_eq!(symbol, bad.symbol)
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_invalid_market_rejected() {
        let market = MarketState::new(-1.0, RATE, 0.0, now());
        let err = GreeksCalculator::default()
            .portfolio_risk(&[Leg::underlying(1.0)], &market, &flat_surface())
            .unwrap_err();
        assert!(matches!(err, RiskError::InvalidMarket(_)));
    }
}
