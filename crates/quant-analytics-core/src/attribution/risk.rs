use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::AnalyticsError;
use crate::numerical::descriptive::{
    correlation, covariance, ensure_finite, ensure_same_length, mean, std_dev, variance,
    VARIANCE_EPSILON,
};
use crate::numerical::NumericalCore;
use crate::risk::portfolio::{correlation_matrix, portfolio_volatility_with, validate_assets};
use crate::types::{with_metadata, ComputationOutput, Portfolio};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Weight bump used for the finite-difference marginal contribution.
pub const WEIGHT_PERTURBATION: f64 = 0.001;

pub const UNASSIGNED_FACTOR: &str = "unassigned";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRiskAttribution {
    pub symbol: String,
    pub weight: f64,
    /// d(sigma_p) / d(w_i), forward difference
    pub marginal_contribution: f64,
    /// w_i x marginal
    pub contribution: f64,
    /// |contribution| / sigma_p
    pub risk_budget: f64,
    pub factor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorRiskAttribution {
    pub factor: String,
    pub weight: f64,
    pub contribution: f64,
    pub risk_budget: f64,
    pub assets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAttribution {
    pub portfolio_volatility: f64,
    pub assets: Vec<AssetRiskAttribution>,
    pub factors: Vec<FactorRiskAttribution>,
    /// Sum of contributions; close to the volatility for a homogeneous model
    pub total_contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkAttribution {
    pub portfolio_volatility: f64,
    pub benchmark_volatility: f64,
    pub tracking_error: f64,
    /// Risk explained by the benchmark: its own volatility
    pub systematic_risk: f64,
    /// Risk from deviating from the benchmark: the tracking error
    pub active_risk: f64,
    /// (portfolio vol - benchmark vol) / tracking error
    pub information_ratio: f64,
    pub beta: f64,
    pub correlation: f64,
    pub active_return: f64,
    pub observations: usize,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Per-asset and per-factor decomposition of portfolio volatility.
pub fn risk_attribution(
    core: &NumericalCore,
    portfolio: &Portfolio,
) -> AnalyticsResult<ComputationOutput<RiskAttribution>> {
    const METHOD: &str = "risk_attribution";
    let start = Instant::now();
    let mut warnings = Vec::new();
    validate_assets(METHOD, &portfolio.assets)?;

    let assets = &portfolio.assets;
    let corr = correlation_matrix(assets)?;
    let weights = portfolio.weights();
    let sigma = portfolio_volatility_with(assets, &weights, &corr.matrix);
    if sigma < 1e-12 {
        warnings.push("Portfolio volatility is zero; risk budgets reported as 0".to_string());
    }

    let mut rows = Vec::with_capacity(assets.len());
    for (i, asset) in assets.iter().enumerate() {
        let mut bumped = weights.clone();
        bumped[i] += WEIGHT_PERTURBATION;
        let sigma_bumped = portfolio_volatility_with(assets, &bumped, &corr.matrix);
        let marginal = (sigma_bumped - sigma) / WEIGHT_PERTURBATION;
        let contribution = asset.weight * marginal;
        rows.push(AssetRiskAttribution {
            symbol: asset.symbol.clone(),
            weight: asset.weight,
            marginal_contribution: marginal,
            contribution,
            risk_budget: budget(contribution, sigma),
            factor: asset
                .factor
                .clone()
                .or_else(|| asset.sector.clone())
                .unwrap_or_else(|| UNASSIGNED_FACTOR.to_string()),
        });
    }

    let mut grouped: BTreeMap<String, FactorRiskAttribution> = BTreeMap::new();
    for row in &rows {
        let entry = grouped
            .entry(row.factor.clone())
            .or_insert_with(|| FactorRiskAttribution {
                factor: row.factor.clone(),
                weight: 0.0,
                contribution: 0.0,
                risk_budget: 0.0,
                assets: Vec::new(),
            });
        entry.weight += row.weight;
        entry.contribution += row.contribution;
        entry.assets.push(row.symbol.clone());
    }
    let factors = grouped
        .into_values()
        .map(|f| FactorRiskAttribution {
            weight: core.round(f.weight),
            risk_budget: core.round(budget(f.contribution, sigma)),
            contribution: core.round(f.contribution),
            ..f
        })
        .collect();

    let total_contribution: f64 = rows.iter().map(|r| r.contribution).sum();
    let result = RiskAttribution {
        portfolio_volatility: core.round(sigma),
        assets: rows
            .into_iter()
            .map(|r| AssetRiskAttribution {
                marginal_contribution: core.round(r.marginal_contribution),
                contribution: core.round(r.contribution),
                risk_budget: core.round(r.risk_budget),
                ..r
            })
            .collect(),
        factors,
        total_contribution: core.round(total_contribution),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "portfolio": portfolio.name,
            "marginal_method": "forward finite difference",
            "perturbation": WEIGHT_PERTURBATION,
            "factor_grouping": "factor tag, else sector, else unassigned",
        }),
        warnings,
        elapsed,
        core.config().precision,
        result,
    ))
}

/// Tracking-error decomposition of a portfolio against its benchmark.
pub fn benchmark_attribution(
    core: &NumericalCore,
    portfolio_returns: &[f64],
    benchmark_returns: &[f64],
) -> AnalyticsResult<ComputationOutput<BenchmarkAttribution>> {
    const METHOD: &str = "benchmark_attribution";
    let start = Instant::now();
    let mut warnings = Vec::new();

    let n = portfolio_returns.len();
    if n < 2 {
        return Err(AnalyticsError::insufficient(
            METHOD,
            format!("At least 2 observations required, got {n}"),
        ));
    }
    ensure_same_length(METHOD, "benchmark_returns", n, benchmark_returns.len())?;
    ensure_finite(METHOD, "portfolio_returns", portfolio_returns)?;
    ensure_finite(METHOD, "benchmark_returns", benchmark_returns)?;

    let ppy = core.config().frequency.periods_per_year();
    let active: Vec<f64> = portfolio_returns
        .iter()
        .zip(benchmark_returns)
        .map(|(p, b)| p - b)
        .collect();

    let sigma_p = std_dev(portfolio_returns) * ppy.sqrt();
    let sigma_b = std_dev(benchmark_returns) * ppy.sqrt();
    let tracking_error = std_dev(&active) * ppy.sqrt();

    let information_ratio = if tracking_error < 1e-12 {
        warnings.push("Tracking error is zero; information ratio reported as 0".to_string());
        0.0
    } else {
        (sigma_p - sigma_b) / tracking_error
    };
    let var_b = variance(benchmark_returns);
    let beta = if var_b < VARIANCE_EPSILON {
        warnings.push("Benchmark variance is zero; beta reported as 0".to_string());
        0.0
    } else {
        covariance(portfolio_returns, benchmark_returns) / var_b
    };

    let result = BenchmarkAttribution {
        portfolio_volatility: core.round(sigma_p),
        benchmark_volatility: core.round(sigma_b),
        tracking_error: core.round(tracking_error),
        systematic_risk: core.round(sigma_b),
        active_risk: core.round(tracking_error),
        information_ratio: core.round(information_ratio),
        beta: core.round(beta),
        correlation: core.round(correlation(portfolio_returns, benchmark_returns)),
        active_return: core.round(mean(&active) * ppy),
        observations: n,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "periods_per_year": ppy,
            "tracking_error": "annualized sample stdev of active returns",
            "information_ratio": "(portfolio vol - benchmark vol) / tracking error",
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

fn budget(contribution: f64, sigma: f64) -> f64 {
    if sigma < 1e-12 {
        0.0
    } else {
        contribution.abs() / sigma
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Asset;
    use approx::assert_abs_diff_eq;

    fn two_asset() -> Portfolio {
        Portfolio::new(
            "two",
            vec![
                Asset::new("EQ", 0.6, 0.08, 0.20).with_factor("equity"),
                Asset::new("FI", 0.4, 0.03, 0.05).with_sector("rates"),
            ],
        )
    }

    #[test]
    fn test_uncorrelated_marginals_match_analytic() {
        let core = NumericalCore::default();
        let out = risk_attribution(&core, &two_asset()).unwrap();
        let r = &out.result;
        // sigma = sqrt(0.12^2 + 0.02^2)
        let sigma = (0.0144f64 + 0.0004).sqrt();
        assert_abs_diff_eq!(r.portfolio_volatility, sigma, epsilon = 1e-6);
        // d sigma / d w_1 = w_1 s_1^2 / sigma
        let analytic = 0.6 * 0.04 / sigma;
        assert_abs_diff_eq!(r.assets[0].marginal_contribution, analytic, epsilon = 1e-3);
        // Euler: contributions sum to sigma up to the bump error
        assert_abs_diff_eq!(r.total_contribution, sigma, epsilon = 1e-3);
        let budgets: f64 = r.assets.iter().map(|a| a.risk_budget).sum();
        assert_abs_diff_eq!(budgets, 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_factor_grouping_falls_back_to_sector_then_unassigned() {
        let core = NumericalCore::default();
        let mut p = two_asset();
        p.assets.push(Asset::new("GLD", 0.1, 0.02, 0.15));
        let r = risk_attribution(&core, &p).unwrap().result;
        let names: Vec<&str> = r.factors.iter().map(|f| f.factor.as_str()).collect();
        assert_eq!(names, vec!["equity", "rates", "unassigned"]);
        assert_eq!(r.assets[2].factor, UNASSIGNED_FACTOR);
    }

    #[test]
    fn test_benchmark_attribution_identities() {
        let core = NumericalCore::default();
        let bench: Vec<f64> = (0..40).map(|i| ((i as f64) * 0.9).sin() * 0.01).collect();
        let port: Vec<f64> = bench
            .iter()
            .enumerate()
            .map(|(i, b)| 1.2 * b + ((i as f64) * 2.3).cos() * 0.002)
            .collect();
        let r = benchmark_attribution(&core, &port, &bench).unwrap().result;
        assert_eq!(r.systematic_risk, r.benchmark_volatility);
        assert_eq!(r.active_risk, r.tracking_error);
        assert!(r.tracking_error > 0.0);
        assert_abs_diff_eq!(r.beta, 1.2, epsilon = 0.05);
        let expected_ir = (r.portfolio_volatility - r.benchmark_volatility) / r.tracking_error;
        assert_abs_diff_eq!(r.information_ratio, expected_ir, epsilon = 1e-4);
    }

    #[test]
    fn test_identical_series_have_zero_information_ratio() {
        let core = NumericalCore::default();
        let s = vec![0.01, -0.02, 0.015, 0.003];
        let out = benchmark_attribution(&core, &s, &s).unwrap();
        assert_eq!(out.result.tracking_error, 0.0);
        assert_eq!(out.result.information_ratio, 0.0);
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_benchmark_length_mismatch() {
        let core = NumericalCore::default();
        assert!(matches!(
            benchmark_attribution(&core, &[0.01, 0.02, 0.03], &[0.01, 0.02]),
            Err(AnalyticsError::InvalidInput { .. })
        ));
    }
}
