use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::ForecastPoint;
use crate::error::AnalyticsError;
use crate::numerical::special::student_t_inv;
use crate::numerical::{ols, Coefficient, NumericalCore};
use crate::types::{with_metadata, ComputationOutput};
use crate::AnalyticsResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionForecast {
    pub coefficients: Vec<Coefficient>,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub residual_std_error: f64,
    pub aic: f64,
    pub bic: f64,
    pub observations: usize,
    pub degrees_of_freedom: usize,
    pub fitted_values: Vec<f64>,
    pub confidence_level: f64,
    /// One point per row of future regressors; `step` is the row index + 1
    pub forecasts: Vec<ForecastPoint>,
}

/// Multiple regression with an intercept, forecasting each row of `future`.
///
/// Intervals are prediction intervals for a new observation:
/// `y_hat +/- t(1 - a/2, dof) * sqrt(s^2 (1 + x'(X'X)^-1 x))`.
pub fn regression_forecast(
    core: &NumericalCore,
    target: &[f64],
    regressors: &[Vec<f64>],
    names: &[&str],
    future: &[Vec<f64>],
) -> AnalyticsResult<ComputationOutput<RegressionForecast>> {
    const METHOD: &str = "regression_forecast";
    let start = Instant::now();

    if regressors.is_empty() {
        return Err(AnalyticsError::invalid(
            METHOD,
            "regressors",
            "At least one regressor is required",
        ));
    }
    let model = ols(target, regressors, names, true)?;

    let confidence = core.config().confidence_level;
    let t_crit = student_t_inv(0.5 + confidence / 2.0, model.degrees_of_freedom as f64)?;
    let mut forecasts = Vec::with_capacity(future.len());
    for (i, row) in future.iter().enumerate() {
        if row.len() != regressors.len() {
            return Err(AnalyticsError::invalid(
                METHOD,
                &format!("future[{i}]"),
                format!(
                    "Expected {} regressor values, got {}",
                    regressors.len(),
                    row.len()
                ),
            ));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::invalid(
                METHOD,
                &format!("future[{i}]"),
                "Future regressors must be finite",
            ));
        }
        let value = model.predict(row)?;
        let half_width = t_crit * model.prediction_variance(row)?.sqrt();
        forecasts.push(ForecastPoint {
            step: i + 1,
            value: core.round(value),
            lower: core.round(value - half_width),
            upper: core.round(value + half_width),
        });
    }

    let coefficients = model
        .coefficients
        .iter()
        .map(|c| Coefficient {
            name: c.name.clone(),
            value: core.round(c.value),
            std_error: core.round(c.std_error),
            t_statistic: core.round(c.t_statistic),
            p_value: c.p_value,
        })
        .collect();
    let result = RegressionForecast {
        coefficients,
        r_squared: core.round(model.r_squared),
        adjusted_r_squared: core.round(model.adjusted_r_squared),
        f_statistic: core.round(model.f_statistic),
        f_p_value: model.f_p_value,
        residual_std_error: core.round(model.residual_std_error),
        aic: core.round(model.aic),
        bic: core.round(model.bic),
        observations: model.observations,
        degrees_of_freedom: model.degrees_of_freedom,
        fitted_values: core.round_all(&model.fitted_values),
        confidence_level: confidence,
        forecasts,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "estimator": "OLS via normal equations",
            "intercept": true,
            "regressors": regressors.len(),
            "interval": "prediction interval, Student t",
        }),
        Vec::new(),
        elapsed,
        core.config().precision,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::test_noise;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_recovers_coefficients_and_forecasts() {
        let core = NumericalCore::default();
        let x1: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let x2: Vec<f64> = (0..50).map(|i| ((i * 7) % 11) as f64).collect();
        let y: Vec<f64> = x1
            .iter()
            .zip(&x2)
            .map(|(a, b)| 1.0 + 2.0 * a - 0.5 * b)
            .collect();
        let out = regression_forecast(
            &core,
            &y,
            &[x1, x2],
            &["trend", "cycle"],
            &[vec![50.0, 3.0]],
        )
        .unwrap();
        let r = &out.result;
        assert_abs_diff_eq!(r.coefficients[0].value, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(r.coefficients[1].value, 2.0, epsilon = 1e-6);
        assert_eq!(r.coefficients[2].name, "cycle");
        assert_abs_diff_eq!(r.forecasts[0].value, 99.5, epsilon = 1e-6);
        assert_abs_diff_eq!(r.r_squared, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_interval_wider_away_from_data() {
        let core = NumericalCore::default();
        let x: Vec<f64> = (0..40).map(|i| i as f64 / 4.0).collect();
        let e = test_noise(71, 40);
        let y: Vec<f64> = x.iter().zip(&e).map(|(a, n)| 3.0 + a + n).collect();
        let r = regression_forecast(&core, &y, &[x], &[], &[vec![5.0], vec![30.0]])
            .unwrap()
            .result;
        let near = r.forecasts[0].upper - r.forecasts[0].lower;
        let far = r.forecasts[1].upper - r.forecasts[1].lower;
        assert!(far > near);
        assert!(r.forecasts[0].lower < r.forecasts[0].value);
        assert!(r.adjusted_r_squared <= r.r_squared);
    }

    #[test]
    fn test_future_row_width_mismatch() {
        let core = NumericalCore::default();
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| v * 2.0 + 1.0 + (v * 1.3).sin()).collect();
        assert!(matches!(
            regression_forecast(&core, &y, &[x], &[], &[vec![1.0, 2.0]]),
            Err(AnalyticsError::InvalidInput { .. })
        ));
    }
}
