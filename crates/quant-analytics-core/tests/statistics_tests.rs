use proptest::prelude::*;
use quant_analytics_core::numerical::ols;
use quant_analytics_core::statistics::StatisticsEngine;
use quant_analytics_core::EngineConfig;

// ===========================================================================
// Hypothesis-test and regression properties
// ===========================================================================

fn engine() -> StatisticsEngine {
    StatisticsEngine::with_config(EngineConfig::default()).unwrap()
}

proptest! {
    #[test]
    fn prop_swapping_samples_negates_difference(
        a in prop::collection::vec(-5.0f64..5.0, 3..25),
        b in prop::collection::vec(-5.0f64..5.0, 3..25),
        pooled in any::<bool>(),
    ) {
        let eng = engine();
        let ab = &eng.t_test_two_sample(&a, &b, pooled).unwrap().result;
        let ba = &eng.t_test_two_sample(&b, &a, pooled).unwrap().result;
        prop_assert_eq!(ab.difference, -ba.difference);
        prop_assert_eq!(ab.t_statistic, -ba.t_statistic);
        prop_assert_eq!(ab.p_value, ba.p_value);
        prop_assert_eq!(ab.degrees_of_freedom, ba.degrees_of_freedom);
    }

    #[test]
    fn prop_r_squared_is_bounded(
        rows in prop::collection::vec((-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0), 8..40),
    ) {
        let y: Vec<f64> = rows.iter().map(|r| r.0).collect();
        let x1: Vec<f64> = rows.iter().map(|r| r.1).collect();
        let x2: Vec<f64> = rows.iter().map(|r| r.2).collect();
        let fit = ols(&y, &[x1, x2], &["x1", "x2"], true);
        prop_assume!(fit.is_ok());
        let model = fit.unwrap();
        prop_assert!(model.r_squared >= 0.0 && model.r_squared <= 1.0);
        prop_assert!(model.adjusted_r_squared <= model.r_squared + 1e-12);
    }
}

#[test]
fn test_one_sample_rejects_shifted_mean() {
    let sample: Vec<f64> = (0..40).map(|i| 1.0 + ((i * 13 % 7) as f64 - 3.0) * 0.1).collect();
    let r = &engine().t_test_one_sample(&sample, 0.0).unwrap().result;
    assert!(r.decision.reject_null);
    assert!(r.confidence_interval.0 > 0.0);
}

#[test]
fn test_equal_constant_samples_are_not_different() {
    let r = &engine()
        .t_test_two_sample(&[2.0; 5], &[2.0; 6], false)
        .unwrap()
        .result;
    assert_eq!(r.t_statistic, 0.0);
    assert_eq!(r.p_value, 1.0);
}
