use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::returns::sharpe;
use super::var::{compute_var, VarMethod, VarResult, MIN_VAR_OBSERVATIONS};
use crate::error::AnalyticsError;
use crate::numerical::descriptive::{correlation, max_drawdown};
use crate::numerical::linalg::Matrix;
use crate::numerical::NumericalCore;
use crate::types::{with_metadata, Asset, ComputationOutput, Portfolio};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    pub matrix: Matrix,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        Some(self.matrix[i][j])
    }
}

/// One asset's share of portfolio volatility (Euler decomposition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRiskContribution {
    pub symbol: String,
    pub weight: f64,
    pub volatility_contribution: f64,
    pub pct_of_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRiskAnalysis {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    /// Weighted average asset volatility over portfolio volatility
    pub diversification_ratio: f64,
    pub total_weight: f64,
    pub correlation: CorrelationMatrix,
    pub contributions: Vec<AssetRiskContribution>,
    /// Weighted per-period returns, when every asset carries an equal-length series
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_returns: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_drawdown: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub var: Option<VarResult>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Pairwise correlations: overrides first, then historical, else 0.
pub fn correlation_matrix(assets: &[Asset]) -> AnalyticsResult<CorrelationMatrix> {
    let n = assets.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let rho = pair_correlation(&assets[i], &assets[j])?;
            matrix[i][j] = rho;
            matrix[j][i] = rho;
        }
    }
    Ok(CorrelationMatrix {
        symbols: assets.iter().map(|a| a.symbol.clone()).collect(),
        matrix,
    })
}

/// sqrt(sum_i sum_j w_i w_j s_i s_j rho_ij). Unrounded.
pub fn portfolio_volatility_with(assets: &[Asset], weights: &[f64], corr: &Matrix) -> f64 {
    let mut variance = 0.0;
    for (i, a) in assets.iter().enumerate() {
        for (j, b) in assets.iter().enumerate() {
            variance += weights[i] * weights[j] * a.volatility * b.volatility * corr[i][j];
        }
    }
    variance.max(0.0).sqrt()
}

pub fn portfolio_volatility(assets: &[Asset]) -> AnalyticsResult<f64> {
    validate_assets("portfolio_volatility", assets)?;
    let corr = correlation_matrix(assets)?;
    let weights: Vec<f64> = assets.iter().map(|a| a.weight).collect();
    Ok(portfolio_volatility_with(assets, &weights, &corr.matrix))
}

/// Per-period portfolio returns `sum_i w_i r_i,t`.
///
/// `None` when any asset lacks a series. Series of differing lengths are an
/// error unless `truncate` is set, in which case every series is cut to the
/// shortest one.
pub fn weighted_returns(assets: &[Asset], truncate: bool) -> AnalyticsResult<Option<Vec<f64>>> {
    if assets.is_empty() || assets.iter().any(|a| a.return_series().is_empty()) {
        return Ok(None);
    }
    let lengths: Vec<usize> = assets.iter().map(|a| a.return_series().len()).collect();
    let shortest = lengths.iter().copied().min().unwrap_or(0);
    let longest = lengths.iter().copied().max().unwrap_or(0);
    if shortest != longest && !truncate {
        let detail: Vec<String> = assets
            .iter()
            .map(|a| format!("{}={}", a.symbol, a.return_series().len()))
            .collect();
        return Err(AnalyticsError::invalid(
            "analyze_portfolio_risk",
            "returns",
            format!("Return series lengths differ ({})", detail.join(", ")),
        ));
    }
    let combined = (0..shortest)
        .map(|t| assets.iter().map(|a| a.weight * a.return_series()[t]).sum())
        .collect();
    Ok(Some(combined))
}

pub fn analyze_portfolio_risk(
    core: &NumericalCore,
    portfolio: &Portfolio,
) -> AnalyticsResult<ComputationOutput<PortfolioRiskAnalysis>> {
    let start = Instant::now();
    let mut warnings = Vec::new();
    let assets = &portfolio.assets;
    validate_assets("analyze_portfolio_risk", assets)?;

    let weights = portfolio.weights();
    let total_weight = portfolio.total_weight();
    if (total_weight - 1.0).abs() > 1e-6 {
        warnings.push(format!(
            "Weights sum to {total_weight:.6}; results are not normalised"
        ));
    }

    let corr = correlation_matrix(assets)?;
    let vol = portfolio_volatility_with(assets, &weights, &corr.matrix);
    let expected_return: f64 = assets.iter().map(|a| a.weight * a.expected_return).sum();
    let weighted_vol: f64 = assets.iter().map(|a| a.weight * a.volatility).sum();
    let diversification_ratio = if vol > 0.0 { weighted_vol / vol } else { 0.0 };

    let contributions = assets
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let cov_row: f64 = assets
                .iter()
                .enumerate()
                .map(|(j, b)| weights[j] * a.volatility * b.volatility * corr.matrix[i][j])
                .sum();
            let contribution = if vol > 0.0 { a.weight * cov_row / vol } else { 0.0 };
            AssetRiskContribution {
                symbol: a.symbol.clone(),
                weight: a.weight,
                volatility_contribution: core.round(contribution),
                pct_of_total: core.round(if vol > 0.0 { contribution / vol } else { 0.0 }),
            }
        })
        .collect();

    let portfolio_returns = weighted_returns(assets, false)?;
    let max_dd = portfolio_returns.as_deref().map(max_drawdown);
    let var = match portfolio_returns.as_deref() {
        Some(r) if r.len() >= MIN_VAR_OBSERVATIONS => Some(
            compute_var(core, r, core.config().confidence_level, VarMethod::Historical)?.result,
        ),
        Some(_) => {
            warnings.push(format!(
                "Fewer than {MIN_VAR_OBSERVATIONS} portfolio returns; VaR omitted"
            ));
            None
        }
        None => None,
    };

    let correlation = CorrelationMatrix {
        symbols: corr.symbols,
        matrix: corr.matrix.iter().map(|row| core.round_all(row)).collect(),
    };

    let result = PortfolioRiskAnalysis {
        expected_return: core.round(expected_return),
        volatility: core.round(vol),
        sharpe_ratio: core.round(sharpe(expected_return, vol, core.config().risk_free_rate)),
        diversification_ratio: core.round(diversification_ratio),
        total_weight: core.round(total_weight),
        correlation,
        contributions,
        portfolio_returns: portfolio_returns.map(|r| core.round_all(&r)),
        max_drawdown: max_dd.map(|d| core.round(d)),
        var,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "analyze_portfolio_risk",
        &serde_json::json!({
            "portfolio": portfolio.name,
            "assets": assets.len(),
            "risk_free_rate": core.config().risk_free_rate,
            "confidence_level": core.config().confidence_level,
            "weights_normalised": false,
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

pub(crate) fn validate_assets(method: &str, assets: &[Asset]) -> AnalyticsResult<()> {
    if assets.is_empty() {
        return Err(AnalyticsError::insufficient(
            method,
            "Portfolio must contain at least one asset",
        ));
    }
    for a in assets {
        for (field, v) in [
            ("weight", a.weight),
            ("expected_return", a.expected_return),
            ("volatility", a.volatility),
        ] {
            if !v.is_finite() {
                return Err(AnalyticsError::invalid(
                    method,
                    &format!("{}.{field}", a.symbol),
                    format!("Non-finite value {v}"),
                ));
            }
        }
        if a.volatility < 0.0 {
            return Err(AnalyticsError::invalid(
                method,
                &format!("{}.volatility", a.symbol),
                "Volatility cannot be negative",
            ));
        }
        if a.return_series().iter().any(|r| !r.is_finite()) {
            return Err(AnalyticsError::invalid(
                method,
                &format!("{}.returns", a.symbol),
                "Return series contains non-finite values",
            ));
        }
    }
    Ok(())
}

fn pair_correlation(a: &Asset, b: &Asset) -> AnalyticsResult<f64> {
    let override_value = a
        .correlations
        .as_ref()
        .and_then(|m| m.get(&b.symbol))
        .or_else(|| b.correlations.as_ref().and_then(|m| m.get(&a.symbol)));
    if let Some(&rho) = override_value {
        if !rho.is_finite() || rho.abs() > 1.0 {
            return Err(AnalyticsError::invalid(
                "correlation_matrix",
                &format!("{}.correlations.{}", a.symbol, b.symbol),
                format!("Correlation must be within [-1, 1], got {rho}"),
            ));
        }
        return Ok(rho);
    }
    let (ra, rb) = (a.return_series(), b.return_series());
    if ra.is_empty() || rb.is_empty() {
        return Ok(0.0);
    }
    Ok(correlation(ra, rb))
}
