//! Scenario stress testing: apply shocks, re-run risk, diff, estimate recovery.

pub mod impact;
pub mod multi;
pub mod recovery;
pub mod scenarios;
pub mod shocks;

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::time::Instant;

use crate::cache::CacheKey;
use crate::config::EngineConfig;
use crate::error::AnalyticsError;
use crate::numerical::NumericalCore;
use crate::risk::{portfolio_key, RiskEngine};
use crate::types::{with_metadata, ComputationOutput, Portfolio};
use crate::AnalyticsResult;

pub use impact::{AnalysisMode, RiskSnapshot, StressImpact};
pub use multi::{AggregateImpact, MultiScenarioAnalysis, RiskLevel, RiskProfile, ScenarioOutcome};
pub use recovery::RecoveryEstimate;
pub use scenarios::{builtin_scenario, builtin_scenarios, Scenario};
pub use shocks::{AppliedShock, ShockSource, ShockedPortfolio};

/// Outcome of one scenario against one portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestResult {
    pub scenario: String,
    pub description: String,
    pub probability: f64,
    pub mode: AnalysisMode,
    pub applied_shocks: Vec<AppliedShock>,
    pub baseline: RiskSnapshot,
    pub stressed: RiskSnapshot,
    pub impact: StressImpact,
    pub recovery: RecoveryEstimate,
}

#[derive(Debug, Clone)]
pub struct StressEngine {
    core: Rc<NumericalCore>,
    risk: RiskEngine,
}

impl StressEngine {
    pub fn new(core: Rc<NumericalCore>) -> Self {
        let risk = RiskEngine::new(Rc::clone(&core));
        StressEngine { core, risk }
    }

    pub fn with_config(config: EngineConfig) -> AnalyticsResult<Self> {
        Ok(Self::new(NumericalCore::shared(config)?))
    }

    pub fn core(&self) -> &Rc<NumericalCore> {
        &self.core
    }

    pub fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    pub fn scenarios(&self) -> Vec<Scenario> {
        builtin_scenarios()
    }

    pub fn apply_shocks(&self, portfolio: &Portfolio, scenario: &Scenario) -> ShockedPortfolio {
        shocks::apply_shocks(portfolio, scenario)
    }

    pub fn run_stress_test(
        &self,
        portfolio: &Portfolio,
        scenario: &Scenario,
    ) -> AnalyticsResult<Rc<ComputationOutput<StressTestResult>>> {
        let key = scenario_key(portfolio_key(self.core.key("run_stress_test"), portfolio), scenario);
        self.core.memoize(key, || {
            let start = Instant::now();
            let (result, warnings) = self.stress_once(portfolio, scenario)?;
            let elapsed = start.elapsed().as_micros() as u64;
            Ok(with_metadata(
                "run_stress_test",
                &serde_json::json!({
                    "portfolio": portfolio.name,
                    "scenario": scenario.name,
                    "shocks": scenario.shocks,
                    "recovery_target": recovery::RECOVERY_TARGET,
                    "recovery_cap_months": recovery::MAX_RECOVERY_PERIODS,
                    "seed": self.core.config().seed,
                }),
                warnings,
                elapsed,
                self.core.config().precision,
                result,
            ))
        })
    }

    /// Stress test against a scenario from the built-in library.
    pub fn run_builtin(
        &self,
        portfolio: &Portfolio,
        name: &str,
    ) -> AnalyticsResult<Rc<ComputationOutput<StressTestResult>>> {
        let scenario = builtin_scenario(name).ok_or_else(|| {
            let known: Vec<String> = builtin_scenarios().into_iter().map(|s| s.name).collect();
            AnalyticsError::invalid(
                "run_stress_test",
                "scenario",
                format!("Unknown scenario '{name}'. Available: {}", known.join(", ")),
            )
        })?;
        self.run_stress_test(portfolio, &scenario)
    }

    pub fn run_multi_scenario(
        &self,
        portfolio: &Portfolio,
        scenarios: &[Scenario],
    ) -> AnalyticsResult<Rc<ComputationOutput<MultiScenarioAnalysis>>> {
        let mut key = portfolio_key(self.core.key("run_multi_scenario"), portfolio);
        for s in scenarios {
            key = scenario_key(key, s);
        }
        self.core.memoize(key, || {
            let start = Instant::now();
            if scenarios.is_empty() {
                return Err(AnalyticsError::insufficient(
                    "run_multi_scenario",
                    "At least one scenario required",
                ));
            }
            let mut results = Vec::with_capacity(scenarios.len());
            let mut warnings = Vec::new();
            for scenario in scenarios {
                let (result, w) = self.stress_once(portfolio, scenario)?;
                warnings.extend(w.into_iter().map(|m| format!("{}: {m}", scenario.name)));
                results.push(result);
            }
            let total_probability: f64 = scenarios.iter().map(|s| s.probability).sum();
            if total_probability == 0.0 {
                warnings.push(
                    "Scenario probabilities sum to 0; probability-weighted impact equals the arithmetic average"
                        .into(),
                );
            }
            let analysis = multi::aggregate(&self.core, results);
            let elapsed = start.elapsed().as_micros() as u64;
            Ok(with_metadata(
                "run_multi_scenario",
                &serde_json::json!({
                    "portfolio": portfolio.name,
                    "scenarios": scenarios.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
                    "score_weights": { "return": 0.5, "volatility": 0.3, "drawdown": 0.2 },
                    "score_thresholds": [25, 50, 75],
                    "severe_loss_threshold": multi::SEVERE_LOSS_THRESHOLD,
                }),
                warnings,
                elapsed,
                self.core.config().precision,
                analysis,
            ))
        })
    }

    /// apply shocks -> re-run risk -> diff -> recovery
    fn stress_once(
        &self,
        portfolio: &Portfolio,
        scenario: &Scenario,
    ) -> AnalyticsResult<(StressTestResult, Vec<String>)> {
        scenario.validate()?;
        let mut warnings = Vec::new();

        let shocked = shocks::apply_shocks(portfolio, scenario);
        let (baseline, w_base) = impact::snapshot(&self.core, &self.risk, portfolio)?;
        let (stressed, w_stressed) = impact::snapshot(&self.core, &self.risk, &shocked.portfolio)?;
        warnings.extend(w_base);
        warnings.extend(w_stressed);

        let mode = if baseline.mode == AnalysisMode::Full && stressed.mode == AnalysisMode::Full {
            AnalysisMode::Full
        } else {
            AnalysisMode::SimplifiedFallback
        };
        let impact = impact::compare(&self.core, &baseline, &stressed, shocked.immediate_loss);

        let mut rng = self.core.rng();
        let mut recovery = recovery::estimate_recovery(
            &mut rng,
            shocked.immediate_loss,
            stressed.expected_return,
            stressed.volatility,
        );
        recovery.start_value = self.core.round(recovery.start_value);
        recovery.monthly_drift = self.core.round(recovery.monthly_drift);
        recovery.monthly_volatility = self.core.round(recovery.monthly_volatility);

        let applied_shocks = shocked
            .applied
            .into_iter()
            .map(|a| AppliedShock {
                shock: self.core.round(a.shock),
                ..a
            })
            .collect();

        Ok((
            StressTestResult {
                scenario: scenario.name.clone(),
                description: scenario.description.clone(),
                probability: scenario.probability,
                mode,
                applied_shocks,
                baseline,
                stressed,
                impact,
                recovery,
            },
            warnings,
        ))
    }
}

fn scenario_key(key: CacheKey, scenario: &Scenario) -> CacheKey {
    let mut key = key
        .param("scenario", &scenario.name)
        .param("p", scenario.probability);
    for (k, v) in &scenario.shocks {
        key = key.param(k, v);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Asset;

    fn sample_returns(offset: usize) -> Vec<f64> {
        (0..24)
            .map(|i| (((i + offset) * 17 % 23) as f64 / 23.0 - 0.45) * 0.06)
            .collect()
    }

    fn balanced() -> Portfolio {
        Portfolio::new(
            "balanced",
            vec![
                Asset::new("SPY", 0.4, 0.09, 0.18).with_returns(sample_returns(0)),
                Asset::new("QQQ", 0.3, 0.11, 0.24)
                    .with_sector("technology")
                    .with_returns(sample_returns(5)),
                Asset::new("AGG", 0.3, 0.04, 0.06)
                    .with_asset_class("bonds")
                    .with_returns(sample_returns(11)),
            ],
        )
    }

    fn engine() -> StressEngine {
        StressEngine::with_config(EngineConfig::default().with_seed(11)).unwrap()
    }

    #[test]
    fn test_crisis_scenario_loses_and_recovers_within_cap() {
        let out = engine()
            .run_builtin(&balanced(), "2008 Financial Crisis")
            .unwrap();
        let r = &out.result;
        assert!(r.impact.return_impact < 0.0);
        assert!(r.recovery.time <= recovery::MAX_RECOVERY_PERIODS);
        assert_eq!(r.mode, AnalysisMode::Full);
        // 0.4 * -0.5 + 0.3 * -0.45 + 0.3 * 0.05
        assert!((r.impact.immediate_loss - (-0.32)).abs() < 1e-9);
        assert_eq!(r.applied_shocks[1].source, ShockSource::Sector);
        assert!(r.impact.volatility_impact > 0.0);
    }

    #[test]
    fn test_unknown_builtin_is_invalid() {
        let err = engine().run_builtin(&balanced(), "Tulip Mania").unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidInput { .. }));
    }

    #[test]
    fn test_ragged_portfolio_runs_in_fallback_mode() {
        let mut p = balanced();
        p.assets[2].returns = Some(sample_returns(3)[..18].to_vec());
        let out = engine().run_builtin(&p, "COVID-19 Crash").unwrap();
        assert_eq!(out.result.mode, AnalysisMode::SimplifiedFallback);
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_multi_scenario_aggregates_library() {
        let eng = engine();
        let out = eng.run_multi_scenario(&balanced(), &eng.scenarios()).unwrap();
        let m = &out.result;
        assert_eq!(m.scenarios.len(), 5);
        assert!(m.worst_case.return_impact <= m.best_case.return_impact);
        assert!(!m.recommendations.is_empty());
        assert!(m.risk_profile.severe_scenarios.contains(&"2008 Financial Crisis".to_string()));
    }

    #[test]
    fn test_zero_probabilities_fall_back_to_average() {
        let eng = engine();
        let scenarios: Vec<Scenario> = eng
            .scenarios()
            .into_iter()
            .map(|s| Scenario { probability: 0.0, ..s })
            .collect();
        let out = eng.run_multi_scenario(&balanced(), &scenarios).unwrap();
        assert_eq!(
            out.result.probability_weighted_impact,
            out.result.average_impact
        );
    }

    #[test]
    fn test_empty_scenario_list_is_insufficient() {
        assert!(matches!(
            engine().run_multi_scenario(&balanced(), &[]),
            Err(AnalyticsError::InsufficientData { .. })
        ));
    }
}
