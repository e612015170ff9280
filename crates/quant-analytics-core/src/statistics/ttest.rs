use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use super::{significance, TestDecision};
use crate::error::AnalyticsError;
use crate::numerical::descriptive::{ensure_finite, ensure_same_length, mean, variance, VARIANCE_EPSILON};
use crate::numerical::special::{student_t_inv, t_two_tailed_p};
use crate::numerical::NumericalCore;
use crate::types::{with_metadata, ComputationOutput};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TTestKind {
    OneSample,
    /// Equal variances, pooled estimator
    TwoSamplePooled,
    /// Unequal variances, Welch-Satterthwaite degrees of freedom
    TwoSampleWelch,
    Paired,
}

impl TTestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TTestKind::OneSample => "one_sample",
            TTestKind::TwoSamplePooled => "two_sample_pooled",
            TTestKind::TwoSampleWelch => "two_sample_welch",
            TTestKind::Paired => "paired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    pub kind: TTestKind,
    /// May be infinite when the standard error is zero and the means differ
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub mean1: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean2: Option<f64>,
    /// mean1 - mean2, or mean - hypothesized mean for the one-sample test
    pub difference: f64,
    pub std_error: f64,
    pub confidence_interval: (f64, f64),
    pub confidence_level: f64,
    pub decision: TestDecision,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn one_sample(
    core: &NumericalCore,
    sample: &[f64],
    hypothesized_mean: f64,
) -> AnalyticsResult<ComputationOutput<TTestResult>> {
    const METHOD: &str = "t_test_one_sample";
    let start = Instant::now();
    check_sample(METHOD, "sample", sample)?;
    if !hypothesized_mean.is_finite() {
        return Err(AnalyticsError::invalid(
            METHOD,
            "hypothesized_mean",
            "Hypothesized mean must be finite",
        ));
    }

    let n = sample.len() as f64;
    let m = mean(sample);
    let se = (variance(sample) / n).sqrt();
    let stat = statistic(METHOD, m - hypothesized_mean, se, n - 1.0)?;
    let result = finish(core, TTestKind::OneSample, stat, m, None)?;

    Ok(envelope(
        core,
        METHOD,
        serde_json::json!({
            "null_hypothesis": format!("mean = {hypothesized_mean}"),
            "alternative": "two-sided",
            "n": sample.len(),
        }),
        stat.warnings(),
        start,
        result,
    ))
}

/// Two-sample test of equal means. `equal_variance` selects the pooled
/// estimator; otherwise Welch's approximation is used.
pub fn two_sample(
    core: &NumericalCore,
    sample1: &[f64],
    sample2: &[f64],
    equal_variance: bool,
) -> AnalyticsResult<ComputationOutput<TTestResult>> {
    const METHOD: &str = "t_test_two_sample";
    let start = Instant::now();
    check_sample(METHOD, "sample1", sample1)?;
    check_sample(METHOD, "sample2", sample2)?;

    let (n1, n2) = (sample1.len() as f64, sample2.len() as f64);
    let (m1, m2) = (mean(sample1), mean(sample2));
    let (v1, v2) = (variance(sample1), variance(sample2));

    let (kind, se, df) = if equal_variance {
        let pooled = ((n1 - 1.0) * v1 + (n2 - 1.0) * v2) / (n1 + n2 - 2.0);
        (
            TTestKind::TwoSamplePooled,
            (pooled * (1.0 / n1 + 1.0 / n2)).sqrt(),
            n1 + n2 - 2.0,
        )
    } else {
        let a = v1 / n1;
        let b = v2 / n2;
        let denom = a * a / (n1 - 1.0) + b * b / (n2 - 1.0);
        let df = if denom > 0.0 {
            (a + b).powi(2) / denom
        } else {
            n1 + n2 - 2.0
        };
        (TTestKind::TwoSampleWelch, (a + b).sqrt(), df)
    };

    let stat = statistic(METHOD, m1 - m2, se, df)?;
    let result = finish(core, kind, stat, m1, Some(m2))?;

    Ok(envelope(
        core,
        METHOD,
        serde_json::json!({
            "null_hypothesis": "mean1 = mean2",
            "alternative": "two-sided",
            "variance": if equal_variance { "pooled" } else { "welch" },
            "n1": sample1.len(),
            "n2": sample2.len(),
        }),
        stat.warnings(),
        start,
        result,
    ))
}

/// Paired test on the element-wise differences `sample1 - sample2`.
pub fn paired(
    core: &NumericalCore,
    sample1: &[f64],
    sample2: &[f64],
) -> AnalyticsResult<ComputationOutput<TTestResult>> {
    const METHOD: &str = "t_test_paired";
    let start = Instant::now();
    check_sample(METHOD, "sample1", sample1)?;
    ensure_same_length(METHOD, "sample2", sample1.len(), sample2.len())?;
    ensure_finite(METHOD, "sample2", sample2)?;

    let diffs: Vec<f64> = sample1.iter().zip(sample2).map(|(a, b)| a - b).collect();
    let n = diffs.len() as f64;
    let se = (variance(&diffs) / n).sqrt();
    let stat = statistic(METHOD, mean(&diffs), se, n - 1.0)?;
    let result = finish(core, TTestKind::Paired, stat, mean(sample1), Some(mean(sample2)))?;

    Ok(envelope(
        core,
        METHOD,
        serde_json::json!({
            "null_hypothesis": "mean difference = 0",
            "alternative": "two-sided",
            "pairs": diffs.len(),
        }),
        stat.warnings(),
        start,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal logic
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Statistic {
    difference: f64,
    std_error: f64,
    df: f64,
    t: f64,
    p: f64,
    degenerate: bool,
}

impl Statistic {
    fn warnings(&self) -> Vec<String> {
        if self.degenerate {
            vec!["Zero standard error; t statistic set by the zero-variance rule".to_string()]
        } else {
            Vec::new()
        }
    }
}

fn check_sample(method: &str, field: &str, sample: &[f64]) -> AnalyticsResult<()> {
    if sample.len() < 2 {
        return Err(AnalyticsError::insufficient(
            method,
            format!("{field} needs at least 2 observations, got {}", sample.len()),
        ));
    }
    ensure_finite(method, field, sample)
}

/// Zero standard error: t = 0, p = 1 when the means match, otherwise
/// t = +/-inf with p = machine epsilon.
fn statistic(method: &str, difference: f64, std_error: f64, df: f64) -> AnalyticsResult<Statistic> {
    if std_error * std_error <= VARIANCE_EPSILON {
        warn!(method, difference, "zero-variance t-test");
        let (t, p) = if difference.abs() <= f64::EPSILON {
            (0.0, 1.0)
        } else {
            (difference.signum() * f64::INFINITY, f64::EPSILON)
        };
        return Ok(Statistic {
            difference,
            std_error: 0.0,
            df,
            t,
            p,
            degenerate: true,
        });
    }
    let t = difference / std_error;
    Ok(Statistic {
        difference,
        std_error,
        df,
        t,
        p: t_two_tailed_p(t, df)?,
        degenerate: false,
    })
}

fn finish(
    core: &NumericalCore,
    kind: TTestKind,
    stat: Statistic,
    mean1: f64,
    mean2: Option<f64>,
) -> AnalyticsResult<TTestResult> {
    let alpha = significance(core);
    let half_width = if stat.degenerate {
        0.0
    } else {
        student_t_inv(1.0 - alpha / 2.0, stat.df)? * stat.std_error
    };
    let decision = TestDecision::new(
        stat.p,
        alpha,
        "Means differ significantly",
        "No significant difference in means",
    );
    Ok(TTestResult {
        kind,
        t_statistic: core.round(stat.t),
        degrees_of_freedom: core.round(stat.df),
        p_value: stat.p,
        mean1: core.round(mean1),
        mean2: mean2.map(|m| core.round(m)),
        difference: core.round(stat.difference),
        std_error: core.round(stat.std_error),
        confidence_interval: (
            core.round(stat.difference - half_width),
            core.round(stat.difference + half_width),
        ),
        confidence_level: 1.0 - alpha,
        decision,
    })
}

fn envelope(
    core: &NumericalCore,
    method: &str,
    assumptions: serde_json::Value,
    warnings: Vec<String>,
    start: Instant,
    result: TTestResult,
) -> ComputationOutput<TTestResult> {
    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        method,
        &assumptions,
        warnings,
        elapsed,
        core.config().precision,
        result,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use statrs::distribution::{ContinuousCDF, StudentsT};

    #[test]
    fn test_one_sample_against_reference() {
        let core = NumericalCore::default();
        let sample = [5.1, 4.9, 5.6, 5.8, 6.0, 5.2, 5.4];
        let r = one_sample(&core, &sample, 5.0).unwrap().result;
        let m = mean(&sample);
        let se = (variance(&sample) / 7.0).sqrt();
        let t = (m - 5.0) / se;
        assert_abs_diff_eq!(r.t_statistic, t, epsilon = 1e-6);
        let dist = StudentsT::new(0.0, 1.0, 6.0).unwrap();
        assert_abs_diff_eq!(r.p_value, 2.0 * (1.0 - dist.cdf(t.abs())), epsilon = 1e-9);
        assert!(r.confidence_interval.0 < r.difference && r.difference < r.confidence_interval.1);
    }

    #[test]
    fn test_two_sample_swap_symmetry() {
        let core = NumericalCore::default();
        let a = [0.012, 0.018, -0.004, 0.021, 0.009, 0.015];
        let b = [0.002, -0.006, 0.004, 0.001, -0.003, 0.005, 0.0];
        for equal in [true, false] {
            let ab = two_sample(&core, &a, &b, equal).unwrap().result;
            let ba = two_sample(&core, &b, &a, equal).unwrap().result;
            assert_eq!(ab.difference, -ba.difference);
            assert_eq!(ab.t_statistic, -ba.t_statistic);
            assert_abs_diff_eq!(ab.p_value, ba.p_value, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_welch_degrees_of_freedom() {
        let core = NumericalCore::default();
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 4.0, 6.0, 8.0, 10.0, 12.0];
        let r = two_sample(&core, &a, &b, false).unwrap().result;
        let (va, vb): (f64, f64) = (2.5 / 5.0, 14.0 / 6.0);
        let df = (va + vb).powi(2) / (va * va / 4.0 + vb * vb / 5.0);
        assert_abs_diff_eq!(r.degrees_of_freedom, df, epsilon = 1e-6);
        assert_eq!(r.kind, TTestKind::TwoSampleWelch);
    }

    #[test]
    fn test_zero_variance_rules() {
        let core = NumericalCore::default();
        let same = two_sample(&core, &[0.5; 4], &[0.5; 5], true).unwrap();
        assert_eq!(same.result.t_statistic, 0.0);
        assert_eq!(same.result.p_value, 1.0);
        assert!(!same.result.decision.reject_null);
        assert_eq!(same.warnings.len(), 1);

        let apart = two_sample(&core, &[0.5; 4], &[0.2; 5], false).unwrap().result;
        assert_eq!(apart.t_statistic, f64::INFINITY);
        assert_eq!(apart.p_value, f64::EPSILON);
        assert!(apart.decision.reject_null);
    }

    #[test]
    fn test_paired_matches_one_sample_on_differences() {
        let core = NumericalCore::default();
        let before = [10.0, 12.0, 9.5, 11.0, 10.5];
        let after = [9.0, 11.5, 9.0, 10.0, 10.4];
        let diffs: Vec<f64> = before.iter().zip(&after).map(|(a, b)| a - b).collect();
        let p = paired(&core, &before, &after).unwrap().result;
        let o = one_sample(&core, &diffs, 0.0).unwrap().result;
        assert_eq!(p.t_statistic, o.t_statistic);
        assert_eq!(p.p_value, o.p_value);
        assert!(paired(&core, &before, &after[..4]).is_err());
    }

    #[test]
    fn test_too_short_sample() {
        let core = NumericalCore::default();
        assert!(matches!(
            one_sample(&core, &[1.0], 0.0),
            Err(AnalyticsError::InsufficientData { .. })
        ));
    }
}
