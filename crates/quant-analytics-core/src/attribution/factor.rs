use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::AnalyticsError;
use crate::numerical::descriptive::{ensure_same_length, mean};
use crate::numerical::{ols, NumericalCore};
use crate::types::{with_metadata, ComputationOutput};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

pub const CARHART_FACTORS: [&str; 4] = ["market", "size", "value", "momentum"];

/// Periodic factor returns aligned with the portfolio series. `market` is the
/// market excess return (MKT - RF); `size`, `value` and `momentum` are the
/// SMB, HML and UMD long-short returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarhartInput {
    pub portfolio_returns: Vec<f64>,
    pub market: Vec<f64>,
    pub size: Vec<f64>,
    pub value: Vec<f64>,
    pub momentum: Vec<f64>,
    /// Per-period risk-free rate; when present the regressand is the
    /// portfolio excess return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_free: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorLoading {
    pub factor: String,
    pub beta: f64,
    pub std_error: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub mean_factor_return: f64,
    /// beta x mean factor return
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarhartResult {
    /// Intercept per period
    pub alpha: f64,
    pub alpha_annualized: f64,
    pub alpha_std_error: f64,
    pub alpha_p_value: f64,
    pub loadings: Vec<FactorLoading>,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub residual_std_error: f64,
    pub mean_return: f64,
    /// Sum of factor contributions
    pub explained_return: f64,
    pub observations: usize,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Carhart four-factor regression of portfolio (excess) returns on market,
/// size, value and momentum.
pub fn carhart(
    core: &NumericalCore,
    input: &CarhartInput,
) -> AnalyticsResult<ComputationOutput<CarhartResult>> {
    const METHOD: &str = "carhart_attribution";
    let start = Instant::now();
    let mut warnings = Vec::new();

    let n = input.portfolio_returns.len();
    if n <= CARHART_FACTORS.len() + 1 {
        return Err(AnalyticsError::insufficient(
            METHOD,
            format!("{n} observations; at least 6 required for a five-parameter fit"),
        ));
    }
    let columns = [&input.market, &input.size, &input.value, &input.momentum];
    for (name, col) in CARHART_FACTORS.iter().zip(columns) {
        ensure_same_length(METHOD, name, n, col.len())?;
    }

    let y: Vec<f64> = match &input.risk_free {
        Some(rf) => {
            ensure_same_length(METHOD, "risk_free", n, rf.len())?;
            input
                .portfolio_returns
                .iter()
                .zip(rf)
                .map(|(r, f)| r - f)
                .collect()
        }
        None => {
            warnings.push(
                "No risk-free series supplied; regressing raw portfolio returns".to_string(),
            );
            input.portfolio_returns.clone()
        }
    };

    let regressors: Vec<Vec<f64>> = columns.iter().map(|c| c.to_vec()).collect();
    let model = ols(&y, &regressors, &CARHART_FACTORS, true)?;
    if n < 36 {
        warnings.push(format!(
            "Only {n} observations; factor loadings are imprecise below 36"
        ));
    }

    let ppy = core.config().frequency.periods_per_year();
    let alpha = model.intercept();
    let (alpha_std_error, alpha_p_value) = model
        .coefficient("intercept")
        .map_or((0.0, 1.0), |c| (c.std_error, c.p_value));

    let loadings: Vec<FactorLoading> = model
        .slopes()
        .iter()
        .zip(columns)
        .map(|(c, col)| {
            let mean_factor_return = mean(col);
            FactorLoading {
                factor: c.name.clone(),
                beta: core.round(c.value),
                std_error: core.round(c.std_error),
                t_statistic: core.round(c.t_statistic),
                p_value: c.p_value,
                mean_factor_return: core.round(mean_factor_return),
                contribution: core.round(c.value * mean_factor_return),
            }
        })
        .collect();
    let explained: f64 = model
        .slopes()
        .iter()
        .zip(columns)
        .map(|(c, col)| c.value * mean(col))
        .sum();

    let result = CarhartResult {
        alpha: core.round(alpha),
        alpha_annualized: core.round(alpha * ppy),
        alpha_std_error: core.round(alpha_std_error),
        alpha_p_value,
        loadings,
        r_squared: core.round(model.r_squared),
        adjusted_r_squared: core.round(model.adjusted_r_squared),
        residual_std_error: core.round(model.residual_std_error),
        mean_return: core.round(mean(&y)),
        explained_return: core.round(explained),
        observations: n,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "model": "Carhart four-factor",
            "factors": CARHART_FACTORS,
            "excess_returns": input.risk_free.is_some(),
            "periods_per_year": ppy,
            "estimator": "OLS",
        }),
        warnings,
        elapsed,
        core.config().precision,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn factor(seed: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| ((i as f64 + 1.0) * seed).sin() * 0.03).collect()
    }

    fn synthetic(n: usize) -> CarhartInput {
        let market = factor(0.7, n);
        let size = factor(1.3, n);
        let value = factor(2.9, n);
        let momentum = factor(4.1, n);
        let noise = factor(7.7, n);
        let portfolio_returns = (0..n)
            .map(|i| {
                0.002 + 1.1 * market[i] + 0.3 * size[i] - 0.2 * value[i]
                    + 0.1 * momentum[i]
                    + 0.01 * noise[i]
            })
            .collect();
        CarhartInput {
            portfolio_returns,
            market,
            size,
            value,
            momentum,
            risk_free: None,
        }
    }

    #[test]
    fn test_recovers_known_loadings() {
        let core = NumericalCore::default();
        let out = carhart(&core, &synthetic(120)).unwrap();
        let r = &out.result;
        assert_eq!(r.loadings.len(), 4);
        assert_abs_diff_eq!(r.loadings[0].beta, 1.1, epsilon = 0.02);
        assert_abs_diff_eq!(r.loadings[1].beta, 0.3, epsilon = 0.02);
        assert_abs_diff_eq!(r.loadings[2].beta, -0.2, epsilon = 0.02);
        assert_abs_diff_eq!(r.loadings[3].beta, 0.1, epsilon = 0.02);
        assert_abs_diff_eq!(r.alpha, 0.002, epsilon = 0.001);
        assert!(r.r_squared > 0.95 && r.r_squared <= 1.0);
        assert!(r.adjusted_r_squared <= r.r_squared);
        assert_eq!(r.loadings[0].factor, "market");
    }

    #[test]
    fn test_risk_free_series_shifts_alpha() {
        let core = NumericalCore::default();
        let mut input = synthetic(60);
        input.risk_free = Some(vec![0.001; 60]);
        let out = carhart(&core, &input).unwrap();
        assert_abs_diff_eq!(out.result.alpha, 0.001, epsilon = 0.001);
        assert!(out.warnings.iter().all(|w| !w.contains("risk-free")));
    }

    #[test]
    fn test_short_or_mismatched_input() {
        let core = NumericalCore::default();
        assert!(matches!(
            carhart(&core, &synthetic(5)),
            Err(AnalyticsError::InsufficientData { .. })
        ));
        let mut input = synthetic(40);
        input.momentum.pop();
        assert!(matches!(
            carhart(&core, &input),
            Err(AnalyticsError::InvalidInput { .. })
        ));
    }
}
