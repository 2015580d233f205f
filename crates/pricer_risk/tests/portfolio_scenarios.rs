//! Integration tests for aggregation and scenario analysis.

use approx::assert_relative_eq;
use chrono::{NaiveDate, NaiveDateTime};
use pricer_core::market_data::OptionsContract;
use pricer_core::types::{GreeksSet, OptionType, PricingInputs};
use pricer_models::analytical::BlackScholes;
use pricer_models::lattice::BinomialTree;
use pricer_pricing::PricingModel;
use pricer_risk::{
    standard_scenarios, GreeksCalculator, Leg, MarketState, PresetScenarioType, Scenario,
    ScenarioEngine,
};
use pricer_surface::{SurfaceBuilder, VolatilitySurface};
use proptest::prelude::*;

const SPOT: f64 = 100.0;
const RATE: f64 = 0.03;
const STRIKES: [f64; 7] = [85.0, 90.0, 95.0, 100.0, 105.0, 110.0, 115.0];

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn valuation() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(16, 0, 0)
        .unwrap()
}

fn expiry() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 2).unwrap()
}

fn smile_vol(strike: f64) -> f64 {
    0.2 - 0.08 * (strike / SPOT).ln()
}

fn contract(strike: f64, option_type: OptionType) -> OptionsContract {
    let t = 182.0 / 365.0;
    let inputs = PricingInputs::new(SPOT, strike, t, RATE, 0.0, smile_vol(strike), option_type);
    let mid = BlackScholes.price(&inputs).unwrap();
    OptionsContract::new(
        format!("{:?}{}", option_type, strike),
        "XYZ",
        strike,
        expiry(),
        option_type,
    )
    .with_quote(mid, mid)
}

fn surface() -> VolatilitySurface {
    let chain: Vec<OptionsContract> = STRIKES
        .iter()
        .map(|&k| contract(k, OptionType::Call))
        .collect();
    SurfaceBuilder::default()
        .build(&chain, SPOT, valuation(), RATE, 0.0)
        .unwrap()
        .into_surface()
}

fn market() -> MarketState {
    MarketState::new(SPOT, RATE, 0.0, valuation())
}

// ==========================================================
// Aggregation
// ==========================================================

fn leg_strategy() -> impl Strategy<Value = Leg> {
    prop_oneof![
        (0..STRIKES.len(), any::<bool>(), -5i32..=5).prop_map(|(i, call, qty)| {
            let option_type = if call { OptionType::Call } else { OptionType::Put };
            Leg::option(contract(STRIKES[i], option_type), f64::from(qty))
        }),
        (-500i32..=500).prop_map(|qty| Leg::underlying(f64::from(qty))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_portfolio_greeks_are_leg_sums(legs in prop::collection::vec(leg_strategy(), 0..12)) {
        let surface = surface();
        let calc = GreeksCalculator::default();
        let risk = calc.portfolio_risk(&legs, &market(), &surface).unwrap();

        let mut greeks = GreeksSet::zero();
        let mut value = 0.0;
        for leg in &legs {
            let leg_risk = calc.leg_risk(leg, &market(), &surface).unwrap();
            greeks += leg_risk.greeks;
            value += leg_risk.value;
        }
        prop_assert!((risk.value - value).abs() <= 1e-9 * (1.0 + value.abs()));
        prop_assert!((risk.greeks.delta - greeks.delta).abs() <= 1e-9 * (1.0 + greeks.delta.abs()));
        prop_assert!((risk.greeks.vega - greeks.vega).abs() <= 1e-9 * (1.0 + greeks.vega.abs()));
        prop_assert_eq!(risk.legs.len(), legs.len());
    }
}

#[test]
fn test_covered_call_greeks() {
    init_tracing();
    let surface = surface();
    let call = contract(105.0, OptionType::Call);
    let book = vec![Leg::underlying(100.0), Leg::option(call.clone(), -1.0)];
    let risk = GreeksCalculator::default()
        .portfolio_risk(&book, &market(), &surface)
        .unwrap();

    let unit = GreeksCalculator::default()
        .contract_greeks(&call, &market(), &surface)
        .unwrap();
    assert_relative_eq!(risk.greeks.delta, 100.0 * (1.0 - unit.greeks.delta), epsilon = 1e-9);
    assert!(risk.greeks.gamma < 0.0);
    assert!(risk.greeks.theta > 0.0);
    assert_relative_eq!(risk.value, 100.0 * (SPOT - unit.price), epsilon = 1e-9);
}

#[test]
fn test_lattice_and_closed_form_agree_on_book() {
    let surface = surface();
    let book = vec![
        Leg::option(contract(95.0, OptionType::Put), 2.0),
        Leg::option(contract(105.0, OptionType::Call), -1.0),
    ];
    let closed = GreeksCalculator::default()
        .portfolio_risk(&book, &market(), &surface)
        .unwrap();
    let lattice = GreeksCalculator::new(PricingModel::BinomialTree(BinomialTree::default()))
        .portfolio_risk(&book, &market(), &surface)
        .unwrap();
    assert_relative_eq!(lattice.value, closed.value, epsilon = 2.0);
    assert_relative_eq!(lattice.greeks.delta, closed.greeks.delta, epsilon = 1.0);
}

// ==========================================================
// Scenarios
// ==========================================================

#[test]
fn test_scenario_does_not_mutate_book() {
    let surface = surface();
    let book = vec![
        Leg::option(contract(100.0, OptionType::Call), 1.0),
        Leg::underlying(-50.0),
    ];
    let before = book.clone();
    let base_market = market();
    let engine = ScenarioEngine::default();

    let base = GreeksCalculator::default()
        .portfolio_risk(&book, &base_market, &surface)
        .unwrap();
    engine
        .run_scenarios(&book, &base_market, &surface, &standard_scenarios())
        .unwrap();
    let again = GreeksCalculator::default()
        .portfolio_risk(&book, &base_market, &surface)
        .unwrap();

    assert_eq!(book, before);
    assert_eq!(base_market, market());
    assert_eq!(base, again);
}

#[test]
fn test_base_scenario_has_zero_pnl() {
    let surface = surface();
    let book = vec![Leg::option(contract(95.0, OptionType::Put), 3.0)];
    let result = ScenarioEngine::default()
        .run_scenario(&book, &market(), &surface, &Scenario::default())
        .unwrap();
    assert_eq!(result.pnl, 0.0);
    assert_eq!(result.value, result.base_value);
}

#[test]
fn test_vol_shift_pnl_matches_vega() {
    let surface = surface();
    let book = vec![Leg::option(contract(100.0, OptionType::Call), 1.0)];
    let engine = ScenarioEngine::default();
    let base = GreeksCalculator::default()
        .portfolio_risk(&book, &market(), &surface)
        .unwrap();

    let bump = 0.001;
    let result = engine
        .run_scenario(&book, &market(), &surface, &Scenario::new("vega").with_vol_shift(bump))
        .unwrap();
    assert_relative_eq!(result.pnl, base.greeks.vega * bump, max_relative = 1e-2);
}

#[test]
fn test_ladder_signs_for_long_call() {
    let surface = surface();
    let book = vec![Leg::option(contract(100.0, OptionType::Call), 1.0)];
    let results = ScenarioEngine::default()
        .run_scenarios(&book, &market(), &surface, &standard_scenarios())
        .unwrap();

    let pnl = |preset: PresetScenarioType| {
        results
            .iter()
            .find(|r| r.scenario.name == preset.name())
            .map(|r| r.pnl)
            .unwrap()
    };
    assert!(pnl(PresetScenarioType::SpotUp10Pct) > 0.0);
    assert!(pnl(PresetScenarioType::SpotDown10Pct) < 0.0);
    assert!(pnl(PresetScenarioType::VolUp5Pts) > 0.0);
    assert!(pnl(PresetScenarioType::VolDown5Pts) < 0.0);
    assert!(pnl(PresetScenarioType::RateUp100bp) > 0.0);
    assert!(pnl(PresetScenarioType::DecayOneWeek) < pnl(PresetScenarioType::DecayOneDay));
    assert!(pnl(PresetScenarioType::DecayOneDay) < 0.0);
    assert_eq!(results.len(), standard_scenarios().len());
}

#[test]
fn test_invalid_scenario_rejected() {
    let surface = surface();
    let book = vec![Leg::underlying(1.0)];
    let err = ScenarioEngine::default()
        .run_scenario(
            &book,
            &market(),
            &surface,
            &Scenario::new("wipeout").with_spot_shift(-1.5),
        )
        .unwrap_err();
    assert!(err.to_string().contains("wipeout"));
}

#[test]
fn test_scenario_results_independent_of_thread_count() {
    let surface = surface();
    let book: Vec<Leg> = STRIKES
        .iter()
        .map(|&k| Leg::option(contract(k, OptionType::Put), 1.0))
        .collect();
    let engine = ScenarioEngine::default();
    let parallel = engine
        .run_scenarios(&book, &market(), &surface, &standard_scenarios())
        .unwrap();

    let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let serial = pool
        .install(|| engine.run_scenarios(&book, &market(), &surface, &standard_scenarios()))
        .unwrap();
    assert_eq!(parallel, serial);
}
