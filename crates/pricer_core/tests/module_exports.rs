//! Integration tests for module exports.
//!
//! Verifies that public types are reachable via absolute paths and that the
//! market data value objects survive serialisation.

use chrono::NaiveDate;

#[test]
fn test_types_module_exports() {
    use pricer_core::types::{
        year_fraction, ExerciseStyle, GreeksSet, OptionType, PricingError, PricingInputs,
    };

    let inputs = PricingInputs::new(100.0, 95.0, 0.25, 0.03, 0.01, 0.3, OptionType::Put)
        .with_exercise(ExerciseStyle::American);
    assert!(inputs.validate().is_ok());
    assert_eq!(GreeksSet::zero(), GreeksSet::default());

    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    assert!((year_fraction(start, end) - 30.0 / 365.0).abs() < 1e-15);

    let _: &dyn std::error::Error = &PricingError::ModelFailure("x".into());
}

#[test]
fn test_math_module_exports() {
    use pricer_core::math::distributions::{norm_cdf, norm_pdf};
    use pricer_core::math::interpolators::{CubicSplineInterpolator, Interpolator};
    use pricer_core::math::solvers::{NewtonBisectionSolver, SolverConfig};

    assert!(norm_pdf(0.0) > norm_pdf(1.0));
    assert!(norm_cdf(3.0) > 0.99);

    let spline = CubicSplineInterpolator::<f64>::new(&[0.0, 1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap();
    assert!((spline.interpolate(0.5).unwrap() - 1.5).abs() < 1e-12);

    let solver = NewtonBisectionSolver::new(SolverConfig::default());
    let root = solver.find_root(|x| (x - 0.25, 1.0), 0.0, 1.0, 0.9).unwrap();
    assert!((root - 0.25).abs() < 1e-12);
}

#[test]
fn test_market_data_serialisation_round_trip() {
    use pricer_core::market_data::{DataQualityReport, DataType, MarketData, OptionsContract};
    use pricer_core::types::OptionType;

    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let expiry = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
    let contract = OptionsContract::new("XYZ240621C00100000", "XYZ", 100.0, expiry, OptionType::Call)
        .with_quote(3.0, 3.5)
        .with_activity(1_200, 340);
    let snapshot = MarketData::new(
        "XYZ",
        date.and_hms_opt(16, 0, 0).unwrap(),
        101.0,
        0.05,
        0.0,
        vec![contract],
    )
    .unwrap()
    .with_vol_index(14.5);

    let json = serde_json::to_string(&snapshot).unwrap();
    let back: MarketData = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snapshot);

    let report = DataQualityReport::new("XYZ", DataType::Options, date, expiry).unwrap();
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"options\""));
}
