use pretty_assertions::assert_eq;
use quant_analytics_core::forecasting::{
    ArimaOrder, ForecastingEngine, ForestParams, SmoothingMethod, SmoothingParams,
};
use quant_analytics_core::EngineConfig;
use std::rc::Rc;

// ===========================================================================
// Forecasting engine: horizons, memoization and reproducibility
// ===========================================================================

fn engine() -> ForecastingEngine {
    let config = EngineConfig {
        forecast_horizon: 6,
        ..EngineConfig::default().with_seed(17)
    };
    ForecastingEngine::with_config(config).unwrap()
}

fn seasonal(n: usize) -> Vec<f64> {
    let pattern = [3.0, 5.0, 4.0, 8.0];
    (0..n).map(|i| 50.0 + 0.5 * i as f64 + pattern[i % 4]).collect()
}

#[test]
fn test_configured_horizon_applies_to_every_model() {
    let eng = engine();
    let y = seasonal(32);
    let arima = eng.arima(&y, ArimaOrder::default(), None).unwrap();
    assert_eq!(arima.result.forecasts.len(), 6);
    let holt = eng
        .exponential_smoothing(&y, SmoothingMethod::Double, SmoothingParams::default(), None)
        .unwrap();
    assert_eq!(holt.result.forecasts.len(), 6);
    let steps: Vec<usize> = holt.result.forecasts.iter().map(|p| p.step).collect();
    assert_eq!(steps, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_holt_winters_tracks_trend_and_season() {
    let eng = engine();
    let y = seasonal(40);
    let out = eng
        .exponential_smoothing(
            &y,
            SmoothingMethod::Triple { season_length: 4 },
            SmoothingParams::default(),
            Some(4),
        )
        .unwrap();
    let truth: Vec<f64> = seasonal(44)[40..].to_vec();
    for (point, expected) in out.result.forecasts.iter().zip(&truth) {
        // Initial seasonals absorb part of the trend, so the fit lags slightly
        assert!((point.value - expected).abs() < 1.0, "{} vs {}", point.value, expected);
        assert!(point.lower <= point.value && point.value <= point.upper);
    }
}

#[test]
fn test_regression_forecast_is_memoized() {
    let eng = engine();
    let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
    let y: Vec<f64> = x.iter().map(|v| 2.0 + 0.5 * v + (v * 2.3).sin() * 0.1).collect();
    let future = vec![vec![21.0], vec![22.0]];
    let a = eng.regression_forecast(&y, &[x.clone()], &["t"], &future).unwrap();
    let b = eng.regression_forecast(&y, &[x], &["t"], &future).unwrap();
    assert!(Rc::ptr_eq(&a, &b));
    assert_eq!(a.result.forecasts.len(), 2);
}

#[test]
fn test_engine_seed_drives_forest_bootstrap() {
    let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
    let target: Vec<f64> = (0..40).map(|i| if i < 20 { 1.0 } else { 5.0 }).collect();
    let params = ForestParams {
        n_trees: 15,
        ..Default::default()
    };
    let a = engine()
        .random_forest(&rows, &target, &[vec![5.0, 1.0]], params)
        .unwrap();
    let b = engine()
        .random_forest(&rows, &target, &[vec![5.0, 1.0]], params)
        .unwrap();
    assert_eq!(a.result, b.result);
    assert!(a.result.feature_importance[0] > a.result.feature_importance[1]);
}
