use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{significance, TestDecision};
use crate::error::AnalyticsError;
use crate::numerical::descriptive::{
    autocorrelation, ensure_finite, excess_kurtosis, skewness, variance, VARIANCE_EPSILON,
};
use crate::numerical::special::{chi_square_upper_tail, f_upper_tail};
use crate::numerical::NumericalCore;
use crate::types::{with_metadata, ComputationOutput};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

pub const MIN_JARQUE_BERA_OBSERVATIONS: usize = 3;
pub const MAX_DEFAULT_LJUNG_BOX_LAGS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FTestResult {
    /// var1 / var2
    pub f_statistic: f64,
    pub df1: usize,
    pub df2: usize,
    /// Two-sided
    pub p_value: f64,
    pub variance1: f64,
    pub variance2: f64,
    pub decision: TestDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JarqueBeraResult {
    pub statistic: f64,
    pub p_value: f64,
    pub skewness: f64,
    pub excess_kurtosis: f64,
    pub observations: usize,
    pub decision: TestDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LjungBoxResult {
    pub statistic: f64,
    pub p_value: f64,
    pub lags: usize,
    pub autocorrelations: Vec<f64>,
    pub observations: usize,
    pub decision: TestDecision,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Two-sided F-test for equality of variances.
pub fn f_test(
    core: &NumericalCore,
    sample1: &[f64],
    sample2: &[f64],
) -> AnalyticsResult<ComputationOutput<FTestResult>> {
    const METHOD: &str = "f_test";
    let start = Instant::now();
    let mut warnings = Vec::new();
    for (field, s) in [("sample1", sample1), ("sample2", sample2)] {
        if s.len() < 2 {
            return Err(AnalyticsError::insufficient(
                METHOD,
                format!("{field} needs at least 2 observations, got {}", s.len()),
            ));
        }
        ensure_finite(METHOD, field, s)?;
    }

    let (v1, v2) = (variance(sample1), variance(sample2));
    let df1 = sample1.len() - 1;
    let df2 = sample2.len() - 1;
    let (f, p) = if v2 <= VARIANCE_EPSILON || v1 <= VARIANCE_EPSILON {
        warnings.push("Zero sample variance; F statistic set by the zero-variance rule".into());
        match (v1 <= VARIANCE_EPSILON, v2 <= VARIANCE_EPSILON) {
            (true, true) => (1.0, 1.0),
            (false, true) => (f64::INFINITY, f64::EPSILON),
            _ => (0.0, f64::EPSILON),
        }
    } else {
        let f = v1 / v2;
        let upper = f_upper_tail(f, df1 as f64, df2 as f64)?;
        (f, (2.0 * upper.min(1.0 - upper)).min(1.0))
    };

    let alpha = significance(core);
    let result = FTestResult {
        f_statistic: core.round(f),
        df1,
        df2,
        p_value: p,
        variance1: core.round(v1),
        variance2: core.round(v2),
        decision: TestDecision::new(
            p,
            alpha,
            "Variances differ significantly",
            "No significant difference in variances",
        ),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "null_hypothesis": "var1 = var2",
            "alternative": "two-sided",
        }),
        warnings,
        elapsed,
        core.config().precision,
        result,
    ))
}

/// Jarque-Bera normality test, `n/6 (S^2 + (K - 3)^2 / 4)` against chi-square(2).
pub fn jarque_bera(
    core: &NumericalCore,
    sample: &[f64],
) -> AnalyticsResult<ComputationOutput<JarqueBeraResult>> {
    const METHOD: &str = "jarque_bera";
    let start = Instant::now();
    let n = sample.len();
    if n < MIN_JARQUE_BERA_OBSERVATIONS {
        return Err(AnalyticsError::insufficient(
            METHOD,
            format!("At least {MIN_JARQUE_BERA_OBSERVATIONS} observations required, got {n}"),
        ));
    }
    ensure_finite(METHOD, "sample", sample)?;

    let mut warnings = Vec::new();
    if variance(sample) <= VARIANCE_EPSILON {
        warnings.push("Constant sample; skewness and kurtosis reported as 0".into());
    }
    let s = skewness(sample);
    let k = excess_kurtosis(sample);
    let jb = n as f64 / 6.0 * (s * s + k * k / 4.0);
    let p = chi_square_upper_tail(jb, 2.0)?;
    if n < 30 {
        warnings.push(format!(
            "Jarque-Bera is an asymptotic test; {n} observations make the p-value approximate"
        ));
    }

    let result = JarqueBeraResult {
        statistic: core.round(jb),
        p_value: p,
        skewness: core.round(s),
        excess_kurtosis: core.round(k),
        observations: n,
        decision: TestDecision::new(
            p,
            significance(core),
            "Sample is not normally distributed",
            "Normality not rejected",
        ),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "null_hypothesis": "sample is normally distributed",
            "distribution": "chi-square(2)",
            "moments": "population",
        }),
        warnings,
        elapsed,
        core.config().precision,
        result,
    ))
}

/// Ljung-Box portmanteau test for autocorrelation up to `lags`
/// (default `min(10, n / 5)`, at least 1).
pub fn ljung_box(
    core: &NumericalCore,
    series: &[f64],
    lags: Option<usize>,
) -> AnalyticsResult<ComputationOutput<LjungBoxResult>> {
    const METHOD: &str = "ljung_box";
    let start = Instant::now();
    let n = series.len();
    if n < 3 {
        return Err(AnalyticsError::insufficient(
            METHOD,
            format!("At least 3 observations required, got {n}"),
        ));
    }
    ensure_finite(METHOD, "series", series)?;
    let h = lags.unwrap_or_else(|| default_ljung_box_lags(n));
    if h == 0 || h >= n {
        return Err(AnalyticsError::invalid(
            METHOD,
            "lags",
            format!("Lags must be in [1, {}], got {h}", n - 1),
        ));
    }

    let nf = n as f64;
    let autocorrelations: Vec<f64> = (1..=h).map(|k| autocorrelation(series, k)).collect();
    let q = nf
        * (nf + 2.0)
        * autocorrelations
            .iter()
            .enumerate()
            .map(|(i, r)| r * r / (nf - (i + 1) as f64))
            .sum::<f64>();
    let p = chi_square_upper_tail(q, h as f64)?;

    let result = LjungBoxResult {
        statistic: core.round(q),
        p_value: p,
        lags: h,
        autocorrelations: core.round_all(&autocorrelations),
        observations: n,
        decision: TestDecision::new(
            p,
            significance(core),
            "Significant autocorrelation present",
            "No significant autocorrelation",
        ),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "null_hypothesis": "no autocorrelation up to the tested lag",
            "lags": h,
            "lag_rule": if lags.is_some() { "caller" } else { "min(10, n/5)" },
        }),
        Vec::new(),
        elapsed,
        core.config().precision,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal logic
// ---------------------------------------------------------------------------

fn default_ljung_box_lags(n: usize) -> usize {
    (n / 5).clamp(1, MAX_DEFAULT_LJUNG_BOX_LAGS)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::test_noise;
    use approx::assert_abs_diff_eq;
    use statrs::distribution::{ContinuousCDF, FisherSnedecor};

    #[test]
    fn test_f_test_matches_statrs() {
        let core = NumericalCore::default();
        let a = [1.2, 0.8, 1.9, 2.4, 0.3, 1.1, 1.7];
        let b = [1.0, 1.1, 0.9, 1.05, 0.95, 1.02];
        let r = f_test(&core, &a, &b).unwrap().result;
        let f = variance(&a) / variance(&b);
        let dist = FisherSnedecor::new(6.0, 5.0).unwrap();
        let upper = 1.0 - dist.cdf(f);
        assert_abs_diff_eq!(r.p_value, 2.0 * upper.min(1.0 - upper), epsilon = 1e-9);
        assert!(r.decision.reject_null);
    }

    #[test]
    fn test_f_test_is_symmetric_in_p_value() {
        let core = NumericalCore::default();
        let a = [0.3, 0.1, 0.4, 0.15, 0.9];
        let b = [0.2, 0.7, 0.1, 0.8, 0.3, 0.6];
        let ab = f_test(&core, &a, &b).unwrap().result;
        let ba = f_test(&core, &b, &a).unwrap().result;
        assert_abs_diff_eq!(ab.p_value, ba.p_value, epsilon = 1e-9);
    }

    #[test]
    fn test_jarque_bera_normal_vs_skewed() {
        let core = NumericalCore::default();
        let normal = test_noise(7, 500);
        let r = jarque_bera(&core, &normal).unwrap().result;
        assert!(!r.decision.reject_null);

        let skewed: Vec<f64> = normal.iter().map(|x| x.exp()).collect();
        let s = jarque_bera(&core, &skewed).unwrap().result;
        assert!(s.decision.reject_null);
        assert!(s.skewness > 1.0);
    }

    #[test]
    fn test_jarque_bera_minimum_sample() {
        let core = NumericalCore::default();
        assert!(matches!(
            jarque_bera(&core, &[1.0, 2.0]),
            Err(AnalyticsError::InsufficientData { .. })
        ));
        let constant = jarque_bera(&core, &[0.001; 10]).unwrap();
        assert_eq!(constant.result.statistic, 0.0);
        assert_eq!(constant.result.p_value, 1.0);
    }

    #[test]
    fn test_ljung_box_default_lags_and_detection() {
        let core = NumericalCore::default();
        let noise = test_noise(3, 200);
        let white = ljung_box(&core, &noise, None).unwrap().result;
        assert_eq!(white.lags, 10);
        assert!(!white.decision.reject_null);

        let mut ar = vec![0.0; 200];
        for t in 1..200 {
            ar[t] = 0.8 * ar[t - 1] + noise[t];
        }
        let r = ljung_box(&core, &ar, None).unwrap().result;
        assert!(r.decision.reject_null);
        assert!(r.autocorrelations[0] > 0.6);

        let short = ljung_box(&core, &noise[..12], None).unwrap().result;
        assert_eq!(short.lags, 2);
    }
}
