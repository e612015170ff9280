use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{gaussian_bands, horizon_or_default, ForecastPoint};
use crate::error::AnalyticsError;
use crate::numerical::descriptive::{ensure_finite, mean};
use crate::numerical::NumericalCore;
use crate::types::{with_metadata, ComputationOutput};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

pub const DEFAULT_ALPHA: f64 = 0.3;
pub const DEFAULT_BETA: f64 = 0.1;
pub const DEFAULT_GAMMA: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SmoothingMethod {
    /// Level only
    Simple,
    /// Holt: level and trend
    Double,
    /// Additive Holt-Winters: level, trend and seasonal
    Triple { season_length: usize },
}

impl SmoothingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmoothingMethod::Simple => "simple",
            SmoothingMethod::Double => "double",
            SmoothingMethod::Triple { .. } => "triple",
        }
    }
}

/// Smoothing constants; unset values take the defaults 0.3 / 0.1 / 0.1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SmoothingParams {
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingResult {
    pub method: SmoothingMethod,
    pub alpha: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
    pub level: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasonals: Option<Vec<f64>>,
    /// One-step-ahead fitted values, aligned with the observations they predict
    pub fitted: Vec<f64>,
    pub sse: f64,
    pub residual_std: f64,
    pub confidence_level: f64,
    pub forecasts: Vec<ForecastPoint>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn exponential_smoothing(
    core: &NumericalCore,
    series: &[f64],
    method: SmoothingMethod,
    params: SmoothingParams,
    horizon: Option<usize>,
) -> AnalyticsResult<ComputationOutput<SmoothingResult>> {
    const METHOD: &str = "exponential_smoothing";
    let start = Instant::now();
    ensure_finite(METHOD, "series", series)?;
    let horizon = horizon_or_default(core, METHOD, horizon)?;
    let alpha = constant(METHOD, "alpha", params.alpha, DEFAULT_ALPHA)?;
    let beta = constant(METHOD, "beta", params.beta, DEFAULT_BETA)?;
    let gamma = constant(METHOD, "gamma", params.gamma, DEFAULT_GAMMA)?;

    let fit = match method {
        SmoothingMethod::Simple => simple(METHOD, series, alpha, horizon)?,
        SmoothingMethod::Double => holt(METHOD, series, alpha, beta, horizon)?,
        SmoothingMethod::Triple { season_length } => {
            holt_winters(METHOD, series, season_length, alpha, beta, gamma, horizon)?
        }
    };

    let residuals: Vec<f64> = fit
        .fitted
        .iter()
        .zip(&series[series.len() - fit.fitted.len()..])
        .map(|(f, y)| y - f)
        .collect();
    let sse: f64 = residuals.iter().map(|e| e * e).sum();
    let residual_std = if residuals.len() > 1 {
        (sse / (residuals.len() - 1) as f64).sqrt()
    } else {
        0.0
    };
    let (forecasts, confidence_level) = gaussian_bands(core, &fit.forecast, residual_std)?;

    let uses_trend = !matches!(method, SmoothingMethod::Simple);
    let uses_season = matches!(method, SmoothingMethod::Triple { .. });
    let result = SmoothingResult {
        method,
        alpha,
        beta: uses_trend.then_some(beta),
        gamma: uses_season.then_some(gamma),
        level: core.round(fit.level),
        trend: fit.trend.map(|b| core.round(b)),
        seasonals: fit.seasonals.map(|s| core.round_all(&s)),
        fitted: core.round_all(&fit.fitted),
        sse: core.round(sse),
        residual_std: core.round(residual_std),
        confidence_level,
        forecasts,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "method": method.as_str(),
            "alpha": alpha,
            "beta": result.beta,
            "gamma": result.gamma,
            "seasonality": if uses_season { "additive" } else { "none" },
            "horizon": horizon,
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

struct Fit {
    level: f64,
    trend: Option<f64>,
    seasonals: Option<Vec<f64>>,
    fitted: Vec<f64>,
    forecast: Vec<f64>,
}

fn constant(method: &str, field: &str, value: Option<f64>, default: f64) -> AnalyticsResult<f64> {
    let v = value.unwrap_or(default);
    if !(v > 0.0 && v < 1.0) {
        return Err(AnalyticsError::invalid(
            method,
            field,
            format!("Smoothing constant must be in (0, 1), got {v}"),
        ));
    }
    Ok(v)
}

fn require(method: &str, series: &[f64], min: usize, what: &str) -> AnalyticsResult<()> {
    if series.len() < min {
        return Err(AnalyticsError::insufficient(
            method,
            format!("{what} needs at least {min} observations, got {}", series.len()),
        ));
    }
    Ok(())
}

fn simple(method: &str, y: &[f64], alpha: f64, horizon: usize) -> AnalyticsResult<Fit> {
    require(method, y, 2, "Simple exponential smoothing")?;
    let mut level = y[0];
    let mut fitted = Vec::with_capacity(y.len() - 1);
    for &obs in &y[1..] {
        fitted.push(level);
        level = alpha * obs + (1.0 - alpha) * level;
    }
    Ok(Fit {
        level,
        trend: None,
        seasonals: None,
        fitted,
        forecast: vec![level; horizon],
    })
}

fn holt(method: &str, y: &[f64], alpha: f64, beta: f64, horizon: usize) -> AnalyticsResult<Fit> {
    require(method, y, 3, "Holt smoothing")?;
    let mut level = y[0];
    let mut trend = y[1] - y[0];
    let mut fitted = Vec::with_capacity(y.len() - 1);
    for &obs in &y[1..] {
        fitted.push(level + trend);
        let previous = level;
        level = alpha * obs + (1.0 - alpha) * (level + trend);
        trend = beta * (level - previous) + (1.0 - beta) * trend;
    }
    Ok(Fit {
        level,
        trend: Some(trend),
        seasonals: None,
        fitted,
        forecast: (1..=horizon).map(|h| level + h as f64 * trend).collect(),
    })
}

fn holt_winters(
    method: &str,
    y: &[f64],
    m: usize,
    alpha: f64,
    beta: f64,
    gamma: f64,
    horizon: usize,
) -> AnalyticsResult<Fit> {
    if m < 2 {
        return Err(AnalyticsError::invalid(
            method,
            "season_length",
            format!("Season length must be at least 2, got {m}"),
        ));
    }
    require(method, y, 2 * m, "Holt-Winters (two full seasons)")?;

    let first = mean(&y[..m]);
    let second = mean(&y[m..2 * m]);
    let mut level = first;
    let mut trend = (second - first) / m as f64;
    let mut seasonals: Vec<f64> = y[..m].iter().map(|v| v - first).collect();

    let mut fitted = Vec::with_capacity(y.len() - m);
    for t in m..y.len() {
        let s = seasonals[t - m];
        fitted.push(level + trend + s);
        let previous = level;
        level = alpha * (y[t] - s) + (1.0 - alpha) * (level + trend);
        trend = beta * (level - previous) + (1.0 - beta) * trend;
        seasonals.push(gamma * (y[t] - level) + (1.0 - gamma) * s);
    }

    let n = y.len();
    let last_season = seasonals[n - m..n].to_vec();
    let forecast = (1..=horizon)
        .map(|h| level + h as f64 * trend + last_season[(h - 1) % m])
        .collect();
    Ok(Fit {
        level,
        trend: Some(trend),
        seasonals: Some(last_season),
        fitted,
        forecast,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_simple_smoothing_recursion() {
        let core = NumericalCore::default();
        let y = [10.0, 12.0, 11.0];
        let params = SmoothingParams {
            alpha: Some(0.5),
            ..Default::default()
        };
        let r = exponential_smoothing(&core, &y, SmoothingMethod::Simple, params, Some(2))
            .unwrap()
            .result;
        // l1 = 11, l2 = 11
        assert_eq!(r.fitted, vec![10.0, 11.0]);
        assert_abs_diff_eq!(r.level, 11.0);
        assert_eq!(r.forecasts[1].value, 11.0);
        assert!(r.beta.is_none());
    }

    #[test]
    fn test_holt_follows_linear_trend() {
        let core = NumericalCore::default();
        let y: Vec<f64> = (0..20).map(|i| 5.0 + 3.0 * i as f64).collect();
        let r = exponential_smoothing(
            &core,
            &y,
            SmoothingMethod::Double,
            SmoothingParams::default(),
            Some(3),
        )
        .unwrap()
        .result;
        assert_abs_diff_eq!(r.trend.unwrap(), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r.forecasts[2].value, 5.0 + 3.0 * 22.0, epsilon = 1e-6);
        assert_abs_diff_eq!(r.sse, 0.0, epsilon = 1e-9);
        assert_eq!(r.alpha, DEFAULT_ALPHA);
    }

    #[test]
    fn test_holt_winters_reproduces_pure_seasonal_pattern() {
        let core = NumericalCore::default();
        let pattern = [10.0, 12.0, 8.0, 14.0];
        let y: Vec<f64> = pattern.iter().cycle().take(16).copied().collect();
        let r = exponential_smoothing(
            &core,
            &y,
            SmoothingMethod::Triple { season_length: 4 },
            SmoothingParams::default(),
            Some(8),
        )
        .unwrap()
        .result;
        for (h, point) in r.forecasts.iter().enumerate() {
            assert_abs_diff_eq!(point.value, pattern[h % 4], epsilon = 1e-9);
        }
        assert_eq!(r.seasonals.as_ref().unwrap().len(), 4);
        assert_eq!(r.gamma, Some(DEFAULT_GAMMA));
    }

    #[test]
    fn test_holt_winters_needs_two_seasons() {
        let core = NumericalCore::default();
        let y = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert!(matches!(
            exponential_smoothing(
                &core,
                &y,
                SmoothingMethod::Triple { season_length: 4 },
                SmoothingParams::default(),
                None,
            ),
            Err(AnalyticsError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_invalid_constant() {
        let core = NumericalCore::default();
        let params = SmoothingParams {
            alpha: Some(1.5),
            ..Default::default()
        };
        assert!(matches!(
            exponential_smoothing(&core, &[1.0, 2.0, 3.0], SmoothingMethod::Simple, params, None),
            Err(AnalyticsError::InvalidInput { .. })
        ));
    }
}
