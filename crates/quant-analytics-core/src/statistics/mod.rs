//! Hypothesis tests built on the shared regression and special functions.
//!
//! Every p-value comes from the in-house incomplete beta / gamma routines in
//! [`crate::numerical::special`]. Results carry a [`TestDecision`] taken at
//! the configured significance level.

pub mod causality;
pub mod distribution;
pub mod stationarity;
pub mod ttest;

use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::numerical::NumericalCore;
use crate::types::ComputationOutput;
use crate::AnalyticsResult;

pub use causality::GrangerResult;
pub use distribution::{FTestResult, JarqueBeraResult, LjungBoxResult};
pub use stationarity::{AdfResult, CriticalValues, EngleGrangerResult};
pub use ttest::{TTestKind, TTestResult};

/// Reject / retain verdict attached to every test result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDecision {
    pub significance_level: f64,
    pub reject_null: bool,
    pub conclusion: String,
}

impl TestDecision {
    /// Reject when `p_value < significance_level`.
    pub fn new(p_value: f64, significance_level: f64, rejected: &str, retained: &str) -> Self {
        let reject_null = p_value < significance_level;
        let verdict = if reject_null { rejected } else { retained };
        TestDecision {
            significance_level,
            reject_null,
            conclusion: format!("{verdict} (p = {p_value:.4}, alpha = {significance_level})"),
        }
    }
}

pub(crate) fn significance(core: &NumericalCore) -> f64 {
    core.config().significance_level
}

#[derive(Debug, Clone)]
pub struct StatisticsEngine {
    core: Rc<NumericalCore>,
}

impl StatisticsEngine {
    pub fn new(core: Rc<NumericalCore>) -> Self {
        StatisticsEngine { core }
    }

    pub fn with_config(config: EngineConfig) -> AnalyticsResult<Self> {
        Ok(Self::new(NumericalCore::shared(config)?))
    }

    pub fn core(&self) -> &Rc<NumericalCore> {
        &self.core
    }

    pub fn t_test_one_sample(
        &self,
        sample: &[f64],
        hypothesized_mean: f64,
    ) -> AnalyticsResult<Rc<ComputationOutput<TTestResult>>> {
        let key = self
            .core
            .key("t_test_one_sample")
            .series("sample", sample)
            .param("mu0", hypothesized_mean);
        self.core.memoize(key, || {
            ttest::one_sample(&self.core, sample, hypothesized_mean)
        })
    }

    pub fn t_test_two_sample(
        &self,
        sample1: &[f64],
        sample2: &[f64],
        equal_variance: bool,
    ) -> AnalyticsResult<Rc<ComputationOutput<TTestResult>>> {
        let key = self
            .core
            .key("t_test_two_sample")
            .series("sample1", sample1)
            .series("sample2", sample2)
            .param("equal_variance", equal_variance);
        self.core.memoize(key, || {
            ttest::two_sample(&self.core, sample1, sample2, equal_variance)
        })
    }

    pub fn t_test_paired(
        &self,
        sample1: &[f64],
        sample2: &[f64],
    ) -> AnalyticsResult<Rc<ComputationOutput<TTestResult>>> {
        let key = self
            .core
            .key("t_test_paired")
            .series("sample1", sample1)
            .series("sample2", sample2);
        self.core
            .memoize(key, || ttest::paired(&self.core, sample1, sample2))
    }

    pub fn f_test(
        &self,
        sample1: &[f64],
        sample2: &[f64],
    ) -> AnalyticsResult<Rc<ComputationOutput<FTestResult>>> {
        let key = self
            .core
            .key("f_test")
            .series("sample1", sample1)
            .series("sample2", sample2);
        self.core
            .memoize(key, || distribution::f_test(&self.core, sample1, sample2))
    }

    pub fn jarque_bera(
        &self,
        sample: &[f64],
    ) -> AnalyticsResult<Rc<ComputationOutput<JarqueBeraResult>>> {
        let key = self.core.key("jarque_bera").series("sample", sample);
        self.core
            .memoize(key, || distribution::jarque_bera(&self.core, sample))
    }

    pub fn ljung_box(
        &self,
        series: &[f64],
        lags: Option<usize>,
    ) -> AnalyticsResult<Rc<ComputationOutput<LjungBoxResult>>> {
        let key = self
            .core
            .key("ljung_box")
            .series("series", series)
            .param("lags", format!("{lags:?}"));
        self.core
            .memoize(key, || distribution::ljung_box(&self.core, series, lags))
    }

    pub fn adf(
        &self,
        series: &[f64],
        lags: Option<usize>,
    ) -> AnalyticsResult<Rc<ComputationOutput<AdfResult>>> {
        let key = self
            .core
            .key("adf")
            .series("series", series)
            .param("lags", format!("{lags:?}"));
        self.core
            .memoize(key, || stationarity::adf(&self.core, series, lags))
    }

    pub fn granger_causality(
        &self,
        cause: &[f64],
        effect: &[f64],
        lags: Option<usize>,
    ) -> AnalyticsResult<Rc<ComputationOutput<GrangerResult>>> {
        let key = self
            .core
            .key("granger_causality")
            .series("cause", cause)
            .series("effect", effect)
            .param("lags", format!("{lags:?}"));
        self.core
            .memoize(key, || causality::granger(&self.core, cause, effect, lags))
    }

    pub fn engle_granger(
        &self,
        y: &[f64],
        x: &[f64],
        lags: Option<usize>,
    ) -> AnalyticsResult<Rc<ComputationOutput<EngleGrangerResult>>> {
        let key = self
            .core
            .key("engle_granger")
            .series("y", y)
            .series("x", x)
            .param("lags", format!("{lags:?}"));
        self.core
            .memoize(key, || stationarity::engle_granger(&self.core, y, x, lags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_threshold() {
        let reject = TestDecision::new(0.01, 0.05, "reject", "retain");
        assert!(reject.reject_null);
        assert!(reject.conclusion.starts_with("reject"));
        let retain = TestDecision::new(0.05, 0.05, "reject", "retain");
        assert!(!retain.reject_null);
    }

    #[test]
    fn test_engine_uses_configured_alpha() {
        let config = EngineConfig {
            significance_level: 0.10,
            ..EngineConfig::default()
        };
        let engine = StatisticsEngine::with_config(config).unwrap();
        let out = engine
            .t_test_one_sample(&[0.1, 0.2, 0.15, 0.3], 0.0)
            .unwrap();
        assert_eq!(out.result.decision.significance_level, 0.10);
        let again = engine
            .t_test_one_sample(&[0.1, 0.2, 0.15, 0.3], 0.0)
            .unwrap();
        assert!(Rc::ptr_eq(&out, &again));
    }
}
