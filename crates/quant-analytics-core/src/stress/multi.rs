use serde::{Deserialize, Serialize};

use super::StressTestResult;
use crate::numerical::NumericalCore;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Immediate losses below this count as severe.
pub const SEVERE_LOSS_THRESHOLD: f64 = -0.20;

const SCORE_RETURN_WEIGHT: f64 = 0.5;
const SCORE_VOLATILITY_WEIGHT: f64 = 0.3;
const SCORE_DRAWDOWN_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskLevel {
    /// Bucket a score against the 25 / 50 / 75 thresholds.
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            RiskLevel::Low
        } else if score < 50.0 {
            RiskLevel::Moderate
        } else if score < 75.0 {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very_high",
        }
    }
}

/// Impact fields averaged across scenarios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateImpact {
    pub return_impact: f64,
    pub return_impact_pct: f64,
    pub volatility_impact: f64,
    pub volatility_impact_pct: f64,
    pub max_drawdown_impact: f64,
    pub immediate_loss: f64,
    pub recovery_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario: String,
    pub return_impact: f64,
    pub immediate_loss: f64,
    pub recovery_time: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub score: f64,
    pub level: RiskLevel,
    pub severe_scenarios: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiScenarioAnalysis {
    pub scenarios: Vec<StressTestResult>,
    pub best_case: ScenarioOutcome,
    pub worst_case: ScenarioOutcome,
    pub average_impact: AggregateImpact,
    pub probability_weighted_impact: AggregateImpact,
    pub total_probability: f64,
    pub risk_profile: RiskProfile,
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Aggregate individual stress tests. `results` must be non-empty.
pub fn aggregate(core: &NumericalCore, results: Vec<StressTestResult>) -> MultiScenarioAnalysis {
    let outcome = |r: &StressTestResult| ScenarioOutcome {
        scenario: r.scenario.clone(),
        return_impact: r.impact.return_impact,
        immediate_loss: r.impact.immediate_loss,
        recovery_time: r.recovery.time,
    };
    let by_return = |a: &&StressTestResult, b: &&StressTestResult| {
        a.impact
            .return_impact
            .partial_cmp(&b.impact.return_impact)
            .unwrap_or(std::cmp::Ordering::Equal)
    };
    let best_case = results.iter().max_by(by_return).map(outcome);
    let worst_case = results.iter().min_by(by_return).map(outcome);

    let equal = vec![1.0; results.len()];
    let probabilities: Vec<f64> = results.iter().map(|r| r.probability).collect();
    let total_probability: f64 = probabilities.iter().sum();

    let average_impact = weighted_impact(core, &results, &equal);
    let probability_weighted_impact = if total_probability > 0.0 {
        weighted_impact(core, &results, &probabilities)
    } else {
        average_impact.clone()
    };

    let risk_profile = classify(core, &results, &average_impact);
    let recommendations = recommend(&results, &risk_profile);

    let empty = ScenarioOutcome {
        scenario: String::new(),
        return_impact: 0.0,
        immediate_loss: 0.0,
        recovery_time: 0,
    };
    MultiScenarioAnalysis {
        best_case: best_case.unwrap_or_else(|| empty.clone()),
        worst_case: worst_case.unwrap_or(empty),
        average_impact,
        probability_weighted_impact,
        total_probability: core.round(total_probability),
        risk_profile,
        recommendations,
        scenarios: results,
    }
}

/// 0.5 |return %| + 0.3 volatility % + 0.2 drawdown points.
pub fn risk_score(impact: &AggregateImpact) -> f64 {
    SCORE_RETURN_WEIGHT * impact.return_impact_pct.abs()
        + SCORE_VOLATILITY_WEIGHT * impact.volatility_impact_pct
        + SCORE_DRAWDOWN_WEIGHT * impact.max_drawdown_impact
}

// ---------------------------------------------------------------------------
// Internal logic
// ---------------------------------------------------------------------------

fn weighted_impact(
    core: &NumericalCore,
    results: &[StressTestResult],
    weights: &[f64],
) -> AggregateImpact {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return AggregateImpact::default();
    }
    let avg = |f: &dyn Fn(&StressTestResult) -> f64| -> f64 {
        core.round(
            results
                .iter()
                .zip(weights)
                .map(|(r, w)| w * f(r))
                .sum::<f64>()
                / total,
        )
    };
    AggregateImpact {
        return_impact: avg(&|r: &StressTestResult| r.impact.return_impact),
        return_impact_pct: avg(&|r: &StressTestResult| r.impact.return_impact_pct),
        volatility_impact: avg(&|r: &StressTestResult| r.impact.volatility_impact),
        volatility_impact_pct: avg(&|r: &StressTestResult| r.impact.volatility_impact_pct),
        max_drawdown_impact: avg(&|r: &StressTestResult| r.impact.max_drawdown_impact),
        immediate_loss: avg(&|r: &StressTestResult| r.impact.immediate_loss),
        recovery_time: avg(&|r: &StressTestResult| r.recovery.time as f64),
    }
}

fn classify(
    core: &NumericalCore,
    results: &[StressTestResult],
    average: &AggregateImpact,
) -> RiskProfile {
    let score = risk_score(average);
    RiskProfile {
        score: core.round(score),
        level: RiskLevel::from_score(score),
        severe_scenarios: results
            .iter()
            .filter(|r| r.impact.immediate_loss < SEVERE_LOSS_THRESHOLD)
            .map(|r| r.scenario.clone())
            .collect(),
    }
}

fn recommend(results: &[StressTestResult], profile: &RiskProfile) -> Vec<String> {
    let mut out = Vec::new();
    out.push(
        match profile.level {
            RiskLevel::VeryHigh => {
                "Very high stress sensitivity: cut gross exposure and add downside hedges such as index puts or collars"
            }
            RiskLevel::High => {
                "High stress sensitivity: rebalance toward lower-beta assets and tighten concentration limits"
            }
            RiskLevel::Moderate => {
                "Moderate stress sensitivity: keep existing hedges and monitor exposure to the worst scenarios"
            }
            RiskLevel::Low => "Low stress sensitivity: the allocation withstands the tested scenarios",
        }
        .to_string(),
    );

    let severe = profile.severe_scenarios.len();
    if severe > 0 {
        out.push(format!(
            "{severe} scenario(s) cause immediate losses beyond 20% ({}); consider tail-risk protection",
            profile.severe_scenarios.join(", ")
        ));
    }
    if severe >= 2 && severe * 2 >= results.len() {
        out.push(
            "Losses beyond 20% are common across scenarios; diversify into assets that respond differently to the shocks"
                .to_string(),
        );
    }

    let capped = results.iter().filter(|r| r.recovery.capped).count();
    if capped > 0 {
        out.push(format!(
            "Recovery exceeds the 120-month horizon in {capped} scenario(s); review liquidity needs over that period"
        ));
    }
    out
}
