//! Analytical comparison tests for the model dispatch layer.
//!
//! # Test Categories
//!
//! 1. **Monte Carlo vs Black-Scholes**: estimates cover the closed form
//! 2. **Convergence**: standard error shrinks with path count
//! 3. **Put-call parity**: deterministic models, across random contracts
//! 4. **Heston vs Monte Carlo**: the two Heston engines agree

use approx::assert_relative_eq;
use pricer_core::types::{OptionType, PricingInputs};
use pricer_models::analytical::BlackScholes;
use pricer_models::heston::{HestonModel, HestonParams, VarianceSource};
use pricer_models::lattice::BinomialTree;
use pricer_pricing::mc::{Dynamics, MonteCarloConfig, MonteCarloPricer};
use pricer_pricing::PricingModel;
use proptest::prelude::*;

fn mc(n_paths: usize, seed: u64) -> MonteCarloPricer {
    MonteCarloPricer::new(
        MonteCarloConfig::builder()
            .n_paths(n_paths)
            .seed(seed)
            .build()
            .unwrap(),
    )
    .unwrap()
}

// ============================================================================
// Monte Carlo vs Black-Scholes
// ============================================================================

#[test]
fn test_mc_interval_covers_black_scholes_across_strikes() {
    let pricer = mc(100_000, 42);
    for strike in [80.0, 90.0, 100.0, 110.0, 120.0] {
        for option_type in [OptionType::Call, OptionType::Put] {
            let inputs = PricingInputs::new(100.0, strike, 0.75, 0.04, 0.01, 0.25, option_type);
            let estimate = pricer.estimate(&inputs).unwrap();
            let exact = BlackScholes.price(&inputs).unwrap();
            let error = (estimate.price - exact).abs();
            assert!(
                error < 4.0 * estimate.std_error + 1e-6,
                "K={} {:?}: MC={:.5} BS={:.5} se={:.5}",
                strike,
                option_type,
                estimate.price,
                exact,
                estimate.std_error
            );
        }
    }
}

// ============================================================================
// Convergence Tests
// ============================================================================

#[test]
fn test_standard_error_shrinks_with_paths() {
    let inputs = PricingInputs::new(100.0, 105.0, 1.0, 0.05, 0.0, 0.3, OptionType::Call);
    let small = mc(10_000, 1).estimate(&inputs).unwrap();
    let large = mc(160_000, 1).estimate(&inputs).unwrap();

    // Sixteen times the paths, a quarter of the error
    let ratio = large.std_error / small.std_error;
    assert!(ratio > 0.15 && ratio < 0.35, "ratio {}", ratio);
}

// ============================================================================
// Heston Engines
// ============================================================================

#[test]
fn test_heston_simulation_matches_characteristic_function() {
    let params = HestonParams::new(0.05, 0.04, 2.0, 0.4, -0.5);
    let config = MonteCarloConfig::builder()
        .n_paths(60_000)
        .n_steps(64)
        .seed(2024)
        .dynamics(Dynamics::Heston {
            params,
            variance_source: VarianceSource::InputVolatility,
        })
        .build()
        .unwrap();
    let simulated = MonteCarloPricer::new(config).unwrap();
    let analytic = PricingModel::Heston(HestonModel::new(params));

    let inputs = PricingInputs::new(100.0, 95.0, 1.0, 0.02, 0.0, 0.05f64.sqrt(), OptionType::Put);
    let mc = simulated.estimate(&inputs).unwrap();
    let cf = analytic.price(&inputs).unwrap();

    let se = mc.std_error;
    assert!(
        (mc.price - cf).abs() < 4.0 * se + 0.05,
        "MC={:.4} CF={:.4} se={:.4}",
        mc.price,
        cf,
        se
    );
}

// ============================================================================
// Put-Call Parity
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_put_call_parity_deterministic_models(
        spot in 60.0f64..140.0,
        strike in 70.0f64..130.0,
        expiry in 0.1f64..2.0,
        rate in -0.01f64..0.08,
        dividend in 0.0f64..0.04,
        vol in 0.1f64..0.5,
    ) {
        let call = PricingInputs::new(spot, strike, expiry, rate, dividend, vol, OptionType::Call);
        let put = call.with_option_type(OptionType::Put);
        let parity = spot * (-dividend * expiry).exp() - strike * call.discount_factor();

        let models = [
            (PricingModel::BlackScholes, 1e-9),
            (PricingModel::BinomialTree(BinomialTree::new(101)), 1e-8),
            (PricingModel::Heston(HestonModel::new(HestonParams::new(0.04, 0.05, 1.2, 0.4, -0.6))), 1e-6),
        ];
        for (model, tolerance) in models {
            let c = model.price(&call).unwrap();
            let p = model.price(&put).unwrap();
            prop_assert!(
                (c - p - parity).abs() < tolerance * spot.max(strike),
                "{}: C-P={} parity={}",
                model.id(),
                c - p,
                parity
            );
        }
    }
}

#[test]
fn test_fallback_result_matches_black_scholes_exactly() {
    let config = MonteCarloConfig::builder()
        .n_paths(1_000)
        .max_relative_error(1e-5)
        .build()
        .unwrap();
    let model = PricingModel::MonteCarlo(MonteCarloPricer::new(config).unwrap());
    let inputs = PricingInputs::new(100.0, 100.0, 0.5, 0.03, 0.0, 0.2, OptionType::Put);

    let result = model.evaluate_with_fallback(&inputs).unwrap();
    let (price, greeks) = BlackScholes.price_and_greeks(&inputs).unwrap();
    assert!(result.fallback);
    assert_relative_eq!(result.price, price, epsilon = 1e-14);
    assert_relative_eq!(result.greeks.delta, greeks.delta, epsilon = 1e-14);
}
