use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::numerical::descriptive::{max_drawdown, mean, std_dev};
use crate::numerical::NumericalCore;
use crate::risk::portfolio::weighted_returns;
use crate::risk::returns::sharpe;
use crate::risk::var::{compute_var, VarMethod, MIN_VAR_OBSERVATIONS};
use crate::risk::RiskEngine;
use crate::types::Portfolio;
use crate::AnalyticsResult;

/// Denominators below this make a percentage impact 0.
const PCT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Full portfolio risk analysis
    Full,
    /// Weighted per-period returns over series truncated to the shortest one
    SimplifiedFallback,
}

/// The risk figures a stress test compares before and after shocking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_drawdown: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub var95: Option<f64>,
    pub mode: AnalysisMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressImpact {
    pub return_impact: f64,
    pub return_impact_pct: f64,
    pub volatility_impact: f64,
    pub volatility_impact_pct: f64,
    /// Change in max drawdown, percentage points
    pub max_drawdown_impact: f64,
    pub immediate_loss: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub var_impact: Option<f64>,
}

/// Risk snapshot of `portfolio`, falling back to the simplified weighted
/// series when full analysis fails. The second value is the fallback warning.
pub fn snapshot(
    core: &NumericalCore,
    risk: &RiskEngine,
    portfolio: &Portfolio,
) -> AnalyticsResult<(RiskSnapshot, Option<String>)> {
    let failure = match risk.analyze_portfolio_risk(portfolio) {
        Ok(analysis) => {
            let a = &analysis.result;
            return Ok((
                RiskSnapshot {
                    expected_return: a.expected_return,
                    volatility: a.volatility,
                    sharpe_ratio: a.sharpe_ratio,
                    max_drawdown: a.max_drawdown,
                    var95: a.var.as_ref().map(|v| v.var95),
                    mode: AnalysisMode::Full,
                },
                None,
            ));
        }
        Err(e) => e,
    };

    let returns = match weighted_returns(&portfolio.assets, true)? {
        Some(r) if !r.is_empty() => r,
        _ => return Err(failure),
    };
    warn!(
        portfolio = %portfolio.name,
        error = %failure,
        periods = returns.len(),
        "portfolio risk analysis failed; using simplified weighted returns"
    );

    let ppy = core.config().frequency.periods_per_year();
    let expected_return = mean(&returns) * ppy;
    let volatility = std_dev(&returns) * ppy.sqrt();
    let var95 = if returns.len() >= MIN_VAR_OBSERVATIONS {
        Some(compute_var(core, &returns, 0.95, VarMethod::Historical)?.result.var95)
    } else {
        None
    };
    Ok((
        RiskSnapshot {
            expected_return: core.round(expected_return),
            volatility: core.round(volatility),
            sharpe_ratio: core.round(sharpe(
                expected_return,
                volatility,
                core.config().risk_free_rate,
            )),
            max_drawdown: Some(core.round(max_drawdown(&returns))),
            var95,
            mode: AnalysisMode::SimplifiedFallback,
        },
        Some(format!(
            "Full risk analysis failed ({failure}); used simplified weighted returns over {} periods",
            returns.len()
        )),
    ))
}

fn pct_change(delta: f64, base: f64) -> f64 {
    if base.abs() < PCT_EPSILON {
        0.0
    } else {
        delta / base.abs() * 100.0
    }
}

pub fn compare(
    core: &NumericalCore,
    baseline: &RiskSnapshot,
    stressed: &RiskSnapshot,
    immediate_loss: f64,
) -> StressImpact {
    let return_impact = stressed.expected_return - baseline.expected_return;
    let volatility_impact = stressed.volatility - baseline.volatility;
    let max_drawdown_impact = match (baseline.max_drawdown, stressed.max_drawdown) {
        (Some(b), Some(s)) => (s - b) * 100.0,
        (None, Some(s)) => s * 100.0,
        _ => 0.0,
    };
    let var_impact = match (baseline.var95, stressed.var95) {
        (Some(b), Some(s)) => Some(core.round(s - b)),
        _ => None,
    };
    StressImpact {
        return_impact: core.round(return_impact),
        return_impact_pct: core.round(pct_change(return_impact, baseline.expected_return)),
        volatility_impact: core.round(volatility_impact),
        volatility_impact_pct: core.round(pct_change(volatility_impact, baseline.volatility)),
        max_drawdown_impact: core.round(max_drawdown_impact),
        immediate_loss: core.round(immediate_loss),
        var_impact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Asset;
    use approx::assert_abs_diff_eq;
    use std::rc::Rc;

    fn engine() -> (Rc<NumericalCore>, RiskEngine) {
        let core = Rc::new(NumericalCore::default());
        let risk = RiskEngine::new(Rc::clone(&core));
        (core, risk)
    }

    #[test]
    fn test_full_snapshot_without_series() {
        let (core, risk) = engine();
        let p = Portfolio::new("p", vec![Asset::new("A", 1.0, 0.08, 0.2)]);
        let (snap, warning) = snapshot(&core, &risk, &p).unwrap();
        assert_eq!(snap.mode, AnalysisMode::Full);
        assert!(warning.is_none());
        assert_abs_diff_eq!(snap.expected_return, 0.08);
        assert!(snap.max_drawdown.is_none());
    }

    #[test]
    fn test_ragged_series_use_fallback() {
        let (core, risk) = engine();
        let p = Portfolio::new(
            "ragged",
            vec![
                Asset::new("A", 0.5, 0.08, 0.2).with_returns(vec![0.01, -0.02, 0.03, 0.0]),
                Asset::new("B", 0.5, 0.04, 0.1).with_returns(vec![0.0, 0.01, -0.01]),
            ],
        );
        let (snap, warning) = snapshot(&core, &risk, &p).unwrap();
        assert_eq!(snap.mode, AnalysisMode::SimplifiedFallback);
        assert!(warning.unwrap().contains("3 periods"));
        assert!(snap.var95.is_none());
    }

    #[test]
    fn test_compare_percentages() {
        let core = NumericalCore::default();
        let base = RiskSnapshot {
            expected_return: 0.10,
            volatility: 0.20,
            sharpe_ratio: 0.4,
            max_drawdown: Some(0.10),
            var95: Some(0.02),
            mode: AnalysisMode::Full,
        };
        let stressed = RiskSnapshot {
            expected_return: 0.05,
            volatility: 0.30,
            sharpe_ratio: 0.1,
            max_drawdown: Some(0.35),
            var95: Some(0.05),
            mode: AnalysisMode::Full,
        };
        let impact = compare(&core, &base, &stressed, -0.3);
        assert_abs_diff_eq!(impact.return_impact, -0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(impact.return_impact_pct, -50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(impact.volatility_impact_pct, 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(impact.max_drawdown_impact, 25.0, epsilon = 1e-9);
        assert_abs_diff_eq!(impact.var_impact.unwrap(), 0.03, epsilon = 1e-12);
    }
}
