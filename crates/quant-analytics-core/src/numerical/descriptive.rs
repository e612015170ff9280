//! Descriptive statistics over `f64` slices.
//!
//! Sample statistics use the `n - 1` denominator; moment-based shape
//! statistics (skewness, kurtosis) are population moments, which is what the
//! Jarque-Bera statistic expects.

use crate::error::AnalyticsError;
use crate::AnalyticsResult;

/// Variances below this are treated as zero.
pub const VARIANCE_EPSILON: f64 = 1e-20;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1). Zero for fewer than two observations.
pub fn variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).max(0.0).sqrt()
}

/// Sample covariance over the overlapping prefix of both series.
pub fn covariance(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = mean(x);
    let my = mean(y);
    x.iter()
        .zip(y)
        .map(|(a, b)| (a - mx) * (b - my))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Pearson correlation; 0 when either series is empty or flat.
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let vx = variance(x);
    let vy = variance(y);
    if vx <= VARIANCE_EPSILON || vy <= VARIANCE_EPSILON {
        return 0.0;
    }
    (covariance(x, y) / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0)
}

/// Population skewness m3 / m2^1.5.
pub fn skewness(values: &[f64]) -> f64 {
    let m2 = population_variance(values);
    if m2 <= VARIANCE_EPSILON {
        return 0.0;
    }
    let m = mean(values);
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / values.len() as f64;
    m3 / m2.powf(1.5)
}

/// Population kurtosis m4 / m2^2 (not excess).
pub fn kurtosis(values: &[f64]) -> f64 {
    let m2 = population_variance(values);
    if m2 <= VARIANCE_EPSILON {
        return 0.0;
    }
    let m = mean(values);
    let m4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / values.len() as f64;
    m4 / (m2 * m2)
}

pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let k = kurtosis(values);
    if k == 0.0 {
        0.0
    } else {
        k - 3.0
    }
}

/// Ascending copy; NaNs sort as equal.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Percentile of a **sorted** slice using linear interpolation, `p` in [0, 1].
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Sample autocorrelation at `lag` (biased estimator, as used by Ljung-Box).
pub fn autocorrelation(values: &[f64], lag: usize) -> f64 {
    let n = values.len();
    if lag >= n {
        return 0.0;
    }
    let m = mean(values);
    let denom: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    if denom <= VARIANCE_EPSILON {
        return 0.0;
    }
    let num: f64 = (lag..n)
        .map(|t| (values[t] - m) * (values[t - lag] - m))
        .sum();
    num / denom
}

/// Apply first differences `order` times.
pub fn difference(values: &[f64], order: usize) -> Vec<f64> {
    let mut out = values.to_vec();
    for _ in 0..order {
        if out.len() < 2 {
            return Vec::new();
        }
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    out
}

/// Compounded cumulative return after each period.
pub fn cumulative_returns(returns: &[f64]) -> Vec<f64> {
    let mut wealth = 1.0;
    returns
        .iter()
        .map(|r| {
            wealth *= 1.0 + r;
            wealth - 1.0
        })
        .collect()
}

/// Peak-to-date drawdown (positive magnitude) after each period.
pub fn drawdown_curve(returns: &[f64]) -> Vec<f64> {
    let mut wealth = 1.0_f64;
    let mut peak = 1.0_f64;
    returns
        .iter()
        .map(|r| {
            wealth *= 1.0 + r;
            peak = peak.max(wealth);
            if peak > 0.0 {
                (peak - wealth) / peak
            } else {
                0.0
            }
        })
        .collect()
}

/// Largest peak-to-trough decline of the compounded curve.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    drawdown_curve(returns).into_iter().fold(0.0, f64::max)
}

/// Fail with `InvalidInput` if any value is NaN or infinite.
pub fn ensure_finite(method: &str, field: &str, values: &[f64]) -> AnalyticsResult<()> {
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(AnalyticsError::invalid(
            method,
            field,
            format!("Non-finite value {} at index {pos}", values[pos]),
        ));
    }
    Ok(())
}

pub fn ensure_same_length(
    method: &str,
    field: &str,
    expected: usize,
    actual: usize,
) -> AnalyticsResult<()> {
    if expected != actual {
        return Err(AnalyticsError::invalid(
            method,
            field,
            format!("Length mismatch: expected {expected}, got {actual}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_sample_variance() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&v), 5.0);
        assert_relative_eq!(population_variance(&v), 4.0);
        assert_relative_eq!(variance(&v), 32.0 / 7.0);
    }

    #[test]
    fn test_correlation_perfect_and_flat() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert_relative_eq!(correlation(&x, &y), 1.0, epsilon = 1e-12);
        let neg: Vec<f64> = y.iter().map(|v| -v).collect();
        assert_relative_eq!(correlation(&x, &neg), -1.0, epsilon = 1e-12);
        assert_eq!(correlation(&x, &[3.0; 4]), 0.0);
        assert_eq!(correlation(&x, &[]), 0.0);
    }

    #[test]
    fn test_symmetric_sample_has_zero_skew() {
        let v = [-2.0, -1.0, 0.0, 1.0, 2.0];
        assert_relative_eq!(skewness(&v), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_quantile_interpolates() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile_sorted(&s, 0.5), 3.0);
        assert_relative_eq!(quantile_sorted(&s, 0.25), 2.0);
        assert_relative_eq!(quantile_sorted(&s, 0.1), 1.4);
    }

    #[test]
    fn test_difference_orders() {
        let v = [1.0, 4.0, 9.0, 16.0];
        assert_eq!(difference(&v, 1), vec![3.0, 5.0, 7.0]);
        assert_eq!(difference(&v, 2), vec![2.0, 2.0]);
        assert!(difference(&[1.0], 1).is_empty());
    }

    #[test]
    fn test_max_drawdown_peak_to_trough() {
        // 1.1 -> 0.88 -> 0.924 -> 0.7854: trough 0.7854 vs peak 1.1
        let r = [0.10, -0.20, 0.05, -0.15];
        let expected = (1.1 - 1.1 * 0.8 * 1.05 * 0.85) / 1.1;
        assert_relative_eq!(max_drawdown(&r), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_autocorrelation_of_alternating_series() {
        let v: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(autocorrelation(&v, 1) < -0.9);
        assert!(autocorrelation(&v, 2) > 0.8);
    }

    #[test]
    fn test_ensure_finite_rejects_nan() {
        assert!(ensure_finite("m", "x", &[1.0, f64::NAN]).is_err());
        assert!(ensure_finite("m", "x", &[1.0, f64::INFINITY]).is_err());
        assert!(ensure_finite("m", "x", &[1.0, 2.0]).is_ok());
    }
}
