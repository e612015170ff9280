//! Unit-root and cointegration tests.
//!
//! Critical values use the MacKinnon (2010) response surfaces and p-values the
//! MacKinnon (1994) normal-CDF polynomials, both for a regression with a
//! constant. The ADF statistic uses the single-series tables; Engle-Granger
//! applies the two-variable tables to the residual statistic.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use super::{significance, TestDecision};
use crate::error::AnalyticsError;
use crate::numerical::descriptive::{
    correlation, difference, ensure_finite, ensure_same_length, variance, VARIANCE_EPSILON,
};
use crate::numerical::special::normal_cdf;
use crate::numerical::{ols, NumericalCore};
use crate::types::{with_metadata, ComputationOutput};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Below this many observations Engle-Granger takes the simplified path.
pub const MIN_ENGLE_GRANGER_OBSERVATIONS: usize = 10;

const SIMPLIFIED_MIN_CORRELATION: f64 = 0.8;
const SIMPLIFIED_MAX_VARIANCE_RATIO: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_percent: f64,
    pub five_percent: f64,
    pub ten_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdfResult {
    /// t-statistic on the lagged level
    pub statistic: f64,
    pub p_value: f64,
    /// Coefficient on the lagged level
    pub gamma: f64,
    pub lags: usize,
    /// Rows in the auxiliary regression
    pub observations: usize,
    pub critical_values: CriticalValues,
    pub decision: TestDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngleGrangerResult {
    /// True when the sample was too short for the residual ADF test and the
    /// correlation / residual-variance heuristic was used instead
    pub simplified: bool,
    pub hedge_ratio: f64,
    pub intercept: f64,
    pub correlation: f64,
    /// var(residual) / var(y)
    pub residual_variance_ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_values: Option<CriticalValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lags: Option<usize>,
    pub cointegrated: bool,
    pub decision: TestDecision,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Augmented Dickey-Fuller test with a constant:
/// `dy_t = a + g y_{t-1} + sum_i d_i dy_{t-i} + e_t`, null `g = 0`.
///
/// `lags` defaults to `floor((n - 1)^(1/3))`.
pub fn adf(
    core: &NumericalCore,
    series: &[f64],
    lags: Option<usize>,
) -> AnalyticsResult<ComputationOutput<AdfResult>> {
    const METHOD: &str = "adf";
    let start = Instant::now();
    ensure_finite(METHOD, "series", series)?;
    let mut warnings = Vec::new();
    let p = lags.unwrap_or_else(|| default_adf_lags(series.len()));
    let (fit, p_value) = if variance(series) <= VARIANCE_EPSILON {
        // No variation to test: report no evidence against the unit root
        let observations = adf_rows(METHOD, series.len(), p, true)?;
        warn!(observations, "ADF on a constant series; returning neutral result");
        warnings.push(
            "Series is constant: the ADF regression is undefined, statistic set to 0 and p-value to 1"
                .to_string(),
        );
        let fit = AdfFit {
            statistic: 0.0,
            gamma: 0.0,
            observations,
        };
        (fit, 1.0)
    } else {
        let fit = adf_regression(METHOD, series, p, true)?;
        let p_value = mackinnon_p(fit.statistic, 1);
        (fit, p_value)
    };

    let result = AdfResult {
        statistic: core.round(fit.statistic),
        p_value,
        gamma: core.round(fit.gamma),
        lags: p,
        observations: fit.observations,
        critical_values: critical_values(1, fit.observations),
        decision: TestDecision::new(
            p_value,
            significance(core),
            "Unit root rejected: series is stationary",
            "Unit root not rejected: series may be non-stationary",
        ),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "null_hypothesis": "series has a unit root",
            "regression": "constant",
            "lags": p,
            "lag_rule": if lags.is_some() { "caller" } else { "floor((n-1)^(1/3))" },
            "p_value": "MacKinnon (1994)",
            "critical_values": "MacKinnon (2010)",
        }),
        warnings,
        elapsed,
        core.config().precision,
        result,
    ))
}

/// Engle-Granger two-step cointegration test of `y` on `x`.
pub fn engle_granger(
    core: &NumericalCore,
    y: &[f64],
    x: &[f64],
    lags: Option<usize>,
) -> AnalyticsResult<ComputationOutput<EngleGrangerResult>> {
    const METHOD: &str = "engle_granger";
    let start = Instant::now();
    let mut warnings = Vec::new();
    let n = y.len();
    ensure_same_length(METHOD, "x", n, x.len())?;
    ensure_finite(METHOD, "y", y)?;
    ensure_finite(METHOD, "x", x)?;
    if n < 3 {
        return Err(AnalyticsError::insufficient(
            METHOD,
            format!("At least 3 observations required, got {n}"),
        ));
    }

    let cointegrating = ols(y, &[x.to_vec()], &["x"], true)?;
    let intercept = cointegrating.intercept();
    let hedge_ratio = cointegrating.slopes().first().map_or(0.0, |c| c.value);
    let residuals = &cointegrating.residuals;
    let rho = correlation(x, y);
    let var_y = variance(y);
    let ratio = if var_y <= VARIANCE_EPSILON {
        0.0
    } else {
        variance(residuals) / var_y
    };
    let alpha = significance(core);

    let result = if n < MIN_ENGLE_GRANGER_OBSERVATIONS {
        warn!(
            observations = n,
            "Engle-Granger sample too short; using simplified correlation heuristic"
        );
        warnings.push(format!(
            "Simplified Engle-Granger: {n} observations is below {MIN_ENGLE_GRANGER_OBSERVATIONS}; \
             cointegration judged from |correlation| > {SIMPLIFIED_MIN_CORRELATION} and residual \
             variance ratio < {SIMPLIFIED_MAX_VARIANCE_RATIO}. This heuristic is unverified."
        ));
        let cointegrated =
            rho.abs() > SIMPLIFIED_MIN_CORRELATION && ratio < SIMPLIFIED_MAX_VARIANCE_RATIO;
        EngleGrangerResult {
            simplified: true,
            hedge_ratio: core.round(hedge_ratio),
            intercept: core.round(intercept),
            correlation: core.round(rho),
            residual_variance_ratio: core.round(ratio),
            statistic: None,
            p_value: None,
            critical_values: None,
            lags: None,
            cointegrated,
            decision: TestDecision {
                significance_level: alpha,
                reject_null: cointegrated,
                conclusion: if cointegrated {
                    "Simplified heuristic suggests cointegration".to_string()
                } else {
                    "Simplified heuristic does not suggest cointegration".to_string()
                },
            },
        }
    } else {
        let p = lags.unwrap_or_else(|| default_adf_lags(n));
        let observations = adf_rows(METHOD, n, p, false)?;
        if variance(residuals) <= VARIANCE_EPSILON {
            // y is an exact linear function of x
            warn!(observations = n, "Engle-Granger residuals are constant; exact cointegration");
            warnings.push(
                "Cointegrating regression residuals are constant: y is an exact linear function \
                 of x, reported as cointegrated without a residual ADF statistic"
                    .to_string(),
            );
            EngleGrangerResult {
                simplified: false,
                hedge_ratio: core.round(hedge_ratio),
                intercept: core.round(intercept),
                correlation: core.round(rho),
                residual_variance_ratio: 0.0,
                statistic: None,
                p_value: Some(0.0),
                critical_values: Some(critical_values(2, observations)),
                lags: Some(p),
                cointegrated: true,
                decision: TestDecision {
                    significance_level: alpha,
                    reject_null: true,
                    conclusion: "Residuals are constant: series are exactly cointegrated"
                        .to_string(),
                },
            }
        } else {
            let fit = adf_regression(METHOD, residuals, p, false)?;
            let p_value = mackinnon_p(fit.statistic, 2);
            let decision = TestDecision::new(
                p_value,
                alpha,
                "No-cointegration rejected: series are cointegrated",
                "No-cointegration not rejected",
            );
            EngleGrangerResult {
                simplified: false,
                hedge_ratio: core.round(hedge_ratio),
                intercept: core.round(intercept),
                correlation: core.round(rho),
                residual_variance_ratio: core.round(ratio),
                statistic: Some(core.round(fit.statistic)),
                p_value: Some(p_value),
                critical_values: Some(critical_values(2, fit.observations)),
                lags: Some(p),
                cointegrated: decision.reject_null,
                decision,
            }
        }
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "null_hypothesis": "no cointegration",
            "cointegrating_regression": "y = a + b x",
            "residual_test": "ADF without constant, two-variable MacKinnon tables",
            "simplified_below": MIN_ENGLE_GRANGER_OBSERVATIONS,
        }),
        warnings,
        elapsed,
        core.config().precision,
        result,
    ))
}

/// MacKinnon (1994) approximate p-value for a tau statistic from a regression
/// with a constant and `n_vars` integrated variables (1 or 2).
pub fn mackinnon_p(statistic: f64, n_vars: usize) -> f64 {
    let idx = n_vars.clamp(1, 2) - 1;
    if statistic.is_nan() {
        return 1.0;
    }
    if statistic > TAU_MAX[idx] {
        return 1.0;
    }
    if statistic < TAU_MIN[idx] {
        return 0.0;
    }
    let z = if statistic <= TAU_STAR[idx] {
        polyval(&TAU_SMALL_P[idx], statistic)
    } else {
        polyval(&TAU_LARGE_P[idx], statistic)
    };
    normal_cdf(z).unwrap_or(1.0)
}

/// MacKinnon (2010) finite-sample critical values at sample size `nobs`.
pub fn critical_values(n_vars: usize, nobs: usize) -> CriticalValues {
    let table = &TAU_2010[n_vars.clamp(1, 2) - 1];
    let t = nobs.max(1) as f64;
    let surface = |c: &[f64; 4]| c[0] + c[1] / t + c[2] / (t * t) + c[3] / (t * t * t);
    CriticalValues {
        one_percent: surface(&table[0]),
        five_percent: surface(&table[1]),
        ten_percent: surface(&table[2]),
    }
}

// ---------------------------------------------------------------------------
// Internal logic
// ---------------------------------------------------------------------------

const TAU_MAX: [f64; 2] = [2.74, 0.92];
const TAU_MIN: [f64; 2] = [-18.83, -18.86];
const TAU_STAR: [f64; 2] = [-1.61, -2.62];
const TAU_SMALL_P: [[f64; 4]; 2] = [
    [2.1659, 1.4412, 0.038269, 0.0],
    [2.92, 1.5012, 0.039796, 0.0],
];
const TAU_LARGE_P: [[f64; 4]; 2] = [
    [1.7339, 0.093202, -0.012745, -0.00010368],
    [2.1945, 0.064695, -0.029198, -0.00042377],
];
/// Rows: 1%, 5%, 10%; columns: tau_inf, c1/T, c2/T^2, c3/T^3
const TAU_2010: [[[f64; 4]; 3]; 2] = [
    [
        [-3.43035, -6.5393, -16.786, -79.433],
        [-2.86154, -2.8903, -4.234, -40.040],
        [-2.56677, -1.5384, -2.809, 0.0],
    ],
    [
        [-3.89644, -10.9519, -22.527, 0.0],
        [-3.33613, -6.1101, -6.823, 0.0],
        [-3.04445, -4.2412, -2.720, 0.0],
    ],
];

fn polyval(coefficients: &[f64; 4], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn default_adf_lags(n: usize) -> usize {
    (n.saturating_sub(1) as f64).cbrt().floor() as usize
}

struct AdfFit {
    statistic: f64,
    gamma: f64,
    observations: usize,
}

/// Rows of the auxiliary regression, or an error when too few remain.
fn adf_rows(method: &str, n: usize, lags: usize, constant: bool) -> AnalyticsResult<usize> {
    let params = 1 + lags + usize::from(constant);
    let rows = n.saturating_sub(lags + 1);
    if rows <= params + 1 {
        return Err(AnalyticsError::insufficient(
            method,
            format!("{n} observations cannot support an ADF regression with {lags} lags"),
        ));
    }
    Ok(rows)
}

fn adf_regression(method: &str, series: &[f64], lags: usize, constant: bool) -> AnalyticsResult<AdfFit> {
    let n = series.len();
    let rows = adf_rows(method, n, lags, constant)?;
    if variance(series) <= VARIANCE_EPSILON {
        return Err(AnalyticsError::degenerate(
            method,
            "Series is constant; the lagged level is collinear with the constant",
        ));
    }

    // dy[j] = y[j + 1] - y[j]; row j regresses dy[j] on y[j] and dy[j-1..j-lags]
    let dy = difference(series, 1);
    let target: Vec<f64> = dy[lags..].to_vec();
    let mut regressors = vec![series[lags..n - 1].to_vec()];
    for i in 1..=lags {
        regressors.push(dy[lags - i..dy.len() - i].to_vec());
    }
    let mut names = vec!["lagged_level".to_string()];
    names.extend((1..=lags).map(|i| format!("diff_lag{i}")));
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    let model = ols(&target, &regressors, &names, constant)?;
    let gamma = model
        .coefficient("lagged_level")
        .ok_or_else(|| AnalyticsError::degenerate(method, "Lagged level coefficient missing"))?;
    Ok(AdfFit {
        statistic: gamma.t_statistic,
        gamma: gamma.value,
        observations: rows,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::test_noise;
    use approx::assert_abs_diff_eq;

    fn random_walk(seed: u64, n: usize) -> Vec<f64> {
        test_noise(seed, n)
            .into_iter()
            .scan(0.0, |level, e| {
                *level += e;
                Some(*level)
            })
            .collect()
    }

    #[test]
    fn test_mackinnon_p_at_tabulated_critical_value() {
        // tau = -2.86 is the asymptotic 5% point for one variable
        assert_abs_diff_eq!(mackinnon_p(-2.8615, 1), 0.05, epsilon = 0.005);
        assert_abs_diff_eq!(mackinnon_p(-3.3361, 2), 0.05, epsilon = 0.006);
        assert_eq!(mackinnon_p(5.0, 1), 1.0);
        assert_eq!(mackinnon_p(-30.0, 1), 0.0);
        assert!(mackinnon_p(-1.0, 1) > mackinnon_p(-2.0, 1));
    }

    #[test]
    fn test_critical_values_order() {
        let cv = critical_values(1, 100);
        assert!(cv.one_percent < cv.five_percent && cv.five_percent < cv.ten_percent);
        assert_abs_diff_eq!(cv.five_percent, -2.8911, epsilon = 1e-3);
        let eg = critical_values(2, 100);
        assert!(eg.five_percent < cv.five_percent);
    }

    #[test]
    fn test_adf_rejects_white_noise() {
        let core = NumericalCore::default();
        let r = adf(&core, &test_noise(11, 200), None).unwrap().result;
        assert_eq!(r.lags, 5);
        assert!(r.decision.reject_null);
        assert!(r.statistic < r.critical_values.one_percent);
    }

    #[test]
    fn test_adf_keeps_unit_root_for_random_walk() {
        let core = NumericalCore::default();
        let r = adf(&core, &random_walk(5, 200), None).unwrap().result;
        assert!(!r.decision.reject_null);
        assert!(r.p_value > 0.05);
    }

    #[test]
    fn test_adf_constant_series_is_neutral() {
        let core = NumericalCore::default();
        let out = adf(&core, &[1.0; 30], None).unwrap();
        assert_eq!(out.result.p_value, 1.0);
        assert_eq!(out.result.statistic, 0.0);
        assert!(!out.result.decision.reject_null);
        assert!(out.warnings[0].contains("constant"));
    }

    #[test]
    fn test_adf_short_series() {
        let core = NumericalCore::default();
        assert!(matches!(
            adf(&core, &[1.0; 4], None),
            Err(AnalyticsError::InsufficientData { .. })
        ));
        assert!(matches!(
            adf(&core, &[1.0, 2.0, 1.5, 2.5], None),
            Err(AnalyticsError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_engle_granger_detects_cointegrated_pair() {
        let core = NumericalCore::default();
        let x = random_walk(21, 150);
        let noise = test_noise(22, 150);
        let y: Vec<f64> = x.iter().zip(&noise).map(|(a, e)| 1.0 + 2.0 * a + 0.5 * e).collect();
        let r = engle_granger(&core, &y, &x, None).unwrap().result;
        assert!(!r.simplified);
        assert!(r.cointegrated);
        assert_abs_diff_eq!(r.hedge_ratio, 2.0, epsilon = 0.1);
    }

    #[test]
    fn test_engle_granger_independent_walks() {
        let core = NumericalCore::default();
        let x = random_walk(31, 150);
        let y = random_walk(32, 150);
        let r = engle_granger(&core, &y, &x, None).unwrap().result;
        assert!(!r.cointegrated);
    }

    #[test]
    fn test_engle_granger_short_sample_is_simplified() {
        let core = NumericalCore::default();
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [2.1, 3.9, 6.2, 7.8, 10.1, 12.0];
        let out = engle_granger(&core, &y, &x, None).unwrap();
        assert!(out.result.simplified);
        assert!(out.result.cointegrated);
        assert!(out.result.p_value.is_none());
        assert!(out.warnings[0].contains("Simplified"));
    }

    #[test]
    fn test_engle_granger_exact_linear_pair() {
        let core = NumericalCore::default();
        let x: Vec<f64> = (0..30).map(|i| i as f64 * 0.5 + (i as f64).sin()).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let out = engle_granger(&core, &y, &x, None).unwrap();
        let r = &out.result;
        assert!(r.cointegrated);
        assert!(r.decision.reject_null);
        assert!(r.statistic.is_none());
        assert_abs_diff_eq!(r.hedge_ratio, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(r.intercept, 1.0, epsilon = 1e-6);
        assert!(out.warnings[0].contains("constant"));
    }
}
