use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use super::{gaussian_bands, horizon_or_default, ForecastPoint};
use crate::error::AnalyticsError;
use crate::numerical::descriptive::{difference, ensure_finite, mean};
use crate::numerical::{ols, NumericalCore};
use crate::types::{with_metadata, ComputationOutput};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        ArimaOrder { p, d, q }
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        ArimaOrder { p: 1, d: 1, q: 0 }
    }
}

impl std::fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaResult {
    pub order: ArimaOrder,
    pub intercept: f64,
    pub ar_coefficients: Vec<f64>,
    /// Constant standing in for the q MA terms: the mean residual of the AR
    /// fit without intercept. Present only when q > 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma_proxy: Option<f64>,
    /// True when q > 0 and the MA part used the intercept-only proxy
    pub simplified: bool,
    pub residual_std: f64,
    pub aic: f64,
    pub bic: f64,
    /// Length of the differenced series used in the fit
    pub observations: usize,
    pub confidence_level: f64,
    pub forecasts: Vec<ForecastPoint>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// ARIMA(p, d, q) fit and forecast.
///
/// The series is differenced `d` times and an AR(p) model is fit by least
/// squares. MA terms are not estimated: when `q > 0` the AR part is fit
/// without intercept, the mean of its residuals is carried as a constant
/// proxy in place of the intercept and the result is marked `simplified`.
/// With `p = 0` the proxy is the mean of the differenced series. Forecasts are produced recursively on the differenced scale
/// and integrated back; bands are `+/- z sigma sqrt(h)`.
pub fn arima(
    core: &NumericalCore,
    series: &[f64],
    order: ArimaOrder,
    horizon: Option<usize>,
) -> AnalyticsResult<ComputationOutput<ArimaResult>> {
    const METHOD: &str = "arima";
    let start = Instant::now();
    let mut warnings = Vec::new();
    ensure_finite(METHOD, "series", series)?;
    let horizon = horizon_or_default(core, METHOD, horizon)?;

    let ArimaOrder { p, d, q } = order;
    let w = difference(series, d);
    let rows = w.len().saturating_sub(p);
    if rows <= p + 2 {
        return Err(AnalyticsError::insufficient(
            METHOD,
            format!(
                "{} observations is too few for {order}; need at least {}",
                series.len(),
                d + 2 * p + 3
            ),
        ));
    }

    let target = w[p..].to_vec();
    let lagged: Vec<Vec<f64>> = (1..=p).map(|i| w[p - i..w.len() - i].to_vec()).collect();
    let names: Vec<String> = (1..=p).map(|i| format!("ar{i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    // The intercept would centre the residuals and leave the proxy at zero
    let fit_intercept = q == 0 || p == 0;
    let model = ols(&target, &lagged, &names, fit_intercept)?;

    let phi: Vec<f64> = model.slopes().iter().map(|c| c.value).collect();
    let (intercept, ma_proxy) = if q > 0 {
        warn!(q, "ARIMA MA terms approximated by an intercept-only proxy");
        warnings.push(format!(
            "Simplified MA: {q} MA term(s) approximated by the mean residual of the AR fit without intercept, not estimated by maximum likelihood"
        ));
        let proxy = if p == 0 {
            model.intercept()
        } else {
            mean(&model.residuals)
        };
        (0.0, Some(proxy))
    } else {
        (model.intercept(), None)
    };
    let sigma = model.residual_std_error;

    // Recursive forecast on the differenced scale
    let mut history = w.clone();
    let mut diffs = Vec::with_capacity(horizon);
    for _ in 0..horizon {
        let len = history.len();
        let next = intercept
            + phi
                .iter()
                .enumerate()
                .map(|(i, c)| c * history[len - 1 - i])
                .sum::<f64>()
            + ma_proxy.unwrap_or(0.0);
        history.push(next);
        diffs.push(next);
    }
    let levels = integrate(series, d, &diffs);

    let (forecasts, confidence_level) = gaussian_bands(core, &levels, sigma)?;
    let result = ArimaResult {
        order,
        intercept: core.round(intercept),
        ar_coefficients: core.round_all(&phi),
        ma_proxy: ma_proxy.map(|m| core.round(m)),
        simplified: q > 0,
        residual_std: core.round(sigma),
        aic: core.round(model.aic),
        bic: core.round(model.bic),
        observations: w.len(),
        confidence_level,
        forecasts,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "order": order.to_string(),
            "estimator": "OLS on differenced series",
            "ma_handling": if q > 0 { "simplified intercept-only proxy" } else { "none" },
            "horizon": horizon,
            "bands": "z * sigma * sqrt(h)",
        }),
        warnings,
        elapsed,
        core.config().precision,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal logic
// ---------------------------------------------------------------------------

/// Undo `d` rounds of differencing for forecasts that continue `series`.
fn integrate(series: &[f64], d: usize, diffs: &[f64]) -> Vec<f64> {
    // last[k] is the final observed value of the k-times differenced series
    let mut last: Vec<f64> = (0..d)
        .map(|k| difference(series, k).last().copied().unwrap_or(0.0))
        .collect();
    diffs
        .iter()
        .map(|&w| {
            let mut current = w;
            for k in (0..d).rev() {
                last[k] += current;
                current = last[k];
            }
            current
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::test_noise;
    use approx::assert_abs_diff_eq;

    fn wiggle(n: usize) -> Vec<f64> {
        (0..n).map(|i| ((i as f64) * 1.9).sin() * 0.5).collect()
    }

    #[test]
    fn test_ar1_recovers_coefficient() {
        let core = NumericalCore::default();
        let e = test_noise(61, 300);
        let mut y = vec![0.0; 300];
        for t in 1..300 {
            y[t] = 0.6 * y[t - 1] + e[t];
        }
        let out = arima(&core, &y, ArimaOrder::new(1, 0, 0), Some(5)).unwrap();
        let r = &out.result;
        assert_abs_diff_eq!(r.ar_coefficients[0], 0.6, epsilon = 0.1);
        assert_eq!(r.forecasts.len(), 5);
        assert!(!r.simplified);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_linear_trend_with_one_difference() {
        let core = NumericalCore::default();
        let y: Vec<f64> = (0..40)
            .map(|i| 100.0 + 2.0 * i as f64 + wiggle(40)[i] * 0.01)
            .collect();
        let r = arima(&core, &y, ArimaOrder::new(0, 1, 0), Some(3))
            .unwrap()
            .result;
        let last = y[39];
        assert_abs_diff_eq!(r.forecasts[0].value, last + 2.0, epsilon = 0.05);
        assert_abs_diff_eq!(r.forecasts[2].value, last + 6.0, epsilon = 0.1);
    }

    #[test]
    fn test_bands_widen_with_sqrt_horizon() {
        let core = NumericalCore::default();
        let r = arima(&core, &test_noise(62, 80), ArimaOrder::new(2, 0, 0), Some(4))
            .unwrap()
            .result;
        let w1 = r.forecasts[0].upper - r.forecasts[0].lower;
        let w4 = r.forecasts[3].upper - r.forecasts[3].lower;
        assert_abs_diff_eq!(w4 / w1, 2.0, epsilon = 1e-3);
        assert_eq!(r.confidence_level, 0.95);
    }

    #[test]
    fn test_ma_terms_are_flagged_simplified() {
        let core = NumericalCore::default();
        let out = arima(&core, &wiggle(60), ArimaOrder::new(1, 0, 1), None).unwrap();
        assert!(out.result.simplified);
        assert!(out.result.ma_proxy.is_some());
        assert_eq!(out.result.forecasts.len(), 12);
        assert!(out.warnings[0].contains("Simplified MA"));
    }

    #[test]
    fn test_ma_proxy_carries_level_without_intercept() {
        let core = NumericalCore::default();
        let e = test_noise(63, 200);
        let mut y = vec![2.0; 200];
        for t in 1..200 {
            y[t] = 0.5 + 0.5 * y[t - 1] + e[t];
        }
        let with_ma = arima(&core, &y, ArimaOrder::new(1, 0, 1), Some(3))
            .unwrap()
            .result;
        assert_eq!(with_ma.intercept, 0.0);
        let proxy = with_ma.ma_proxy.unwrap();
        assert!(proxy > 0.1, "proxy {proxy}");

        let ar_only = arima(&core, &y, ArimaOrder::new(1, 0, 0), Some(3))
            .unwrap()
            .result;
        assert!(ar_only.ma_proxy.is_none());
        assert!(ar_only.intercept > 0.1);
    }

    #[test]
    fn test_ma_proxy_without_ar_terms_is_series_mean() {
        let core = NumericalCore::default();
        let y = test_noise(64, 50);
        let r = arima(&core, &y, ArimaOrder::new(0, 0, 1), Some(2))
            .unwrap()
            .result;
        assert_eq!(r.intercept, 0.0);
        assert_abs_diff_eq!(r.ma_proxy.unwrap(), mean(&y), epsilon = 1e-6);
        assert_abs_diff_eq!(r.forecasts[0].value, mean(&y), epsilon = 1e-6);
    }

    #[test]
    fn test_integrate_second_order() {
        // y = t^2: second differences are 2
        let y: Vec<f64> = (0..6).map(|t| (t * t) as f64).collect();
        let out = integrate(&y, 2, &[2.0, 2.0]);
        assert_eq!(out, vec![36.0, 49.0]);
    }

    #[test]
    fn test_too_short_series() {
        let core = NumericalCore::default();
        assert!(matches!(
            arima(&core, &[1.0, 2.0, 3.0], ArimaOrder::default(), None),
            Err(AnalyticsError::InsufficientData { .. })
        ));
    }
}
