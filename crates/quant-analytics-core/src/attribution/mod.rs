//! Performance and risk attribution.
//!
//! - [`brinson`]: allocation / selection / interaction with Carino linking
//! - [`factor`]: Carhart four-factor regression
//! - [`risk`]: marginal volatility contributions and tracking-error decomposition

pub mod brinson;
pub mod factor;
pub mod risk;

use std::rc::Rc;

use crate::cache::CacheKey;
use crate::config::EngineConfig;
use crate::numerical::NumericalCore;
use crate::risk::portfolio_key;
use crate::types::{ComputationOutput, Portfolio};
use crate::AnalyticsResult;

pub use brinson::{BrinsonInput, BrinsonResult, LinkedAttribution, PeriodAttribution, SegmentAttribution};
pub use factor::{CarhartInput, CarhartResult, FactorLoading};
pub use risk::{AssetRiskAttribution, BenchmarkAttribution, FactorRiskAttribution, RiskAttribution};

#[derive(Debug, Clone)]
pub struct AttributionEngine {
    core: Rc<NumericalCore>,
}

impl AttributionEngine {
    pub fn new(core: Rc<NumericalCore>) -> Self {
        AttributionEngine { core }
    }

    pub fn with_config(config: EngineConfig) -> AnalyticsResult<Self> {
        Ok(Self::new(NumericalCore::shared(config)?))
    }

    pub fn core(&self) -> &Rc<NumericalCore> {
        &self.core
    }

    pub fn brinson(
        &self,
        input: &BrinsonInput,
    ) -> AnalyticsResult<Rc<ComputationOutput<BrinsonResult>>> {
        let key = brinson_key(self.core.key("brinson"), input);
        self.core.memoize(key, || brinson::brinson(&self.core, input))
    }

    pub fn brinson_linked(
        &self,
        periods: &[BrinsonInput],
    ) -> AnalyticsResult<Rc<ComputationOutput<LinkedAttribution>>> {
        let mut key = self.core.key("brinson_linked").param("periods", periods.len());
        for p in periods {
            key = brinson_key(key, p);
        }
        self.core
            .memoize(key, || brinson::brinson_linked(&self.core, periods))
    }

    pub fn carhart(
        &self,
        input: &CarhartInput,
    ) -> AnalyticsResult<Rc<ComputationOutput<CarhartResult>>> {
        let mut key = self
            .core
            .key("carhart")
            .series("portfolio", &input.portfolio_returns)
            .series("market", &input.market)
            .series("size", &input.size)
            .series("value", &input.value)
            .series("momentum", &input.momentum);
        if let Some(rf) = &input.risk_free {
            key = key.series("risk_free", rf);
        }
        self.core.memoize(key, || factor::carhart(&self.core, input))
    }

    pub fn risk_attribution(
        &self,
        portfolio: &Portfolio,
    ) -> AnalyticsResult<Rc<ComputationOutput<RiskAttribution>>> {
        let key = portfolio_key(self.core.key("risk_attribution"), portfolio);
        self.core
            .memoize(key, || risk::risk_attribution(&self.core, portfolio))
    }

    pub fn benchmark_attribution(
        &self,
        portfolio_returns: &[f64],
        benchmark_returns: &[f64],
    ) -> AnalyticsResult<Rc<ComputationOutput<BenchmarkAttribution>>> {
        let key = self
            .core
            .key("benchmark_attribution")
            .series("portfolio", portfolio_returns)
            .series("benchmark", benchmark_returns);
        self.core.memoize(key, || {
            risk::benchmark_attribution(&self.core, portfolio_returns, benchmark_returns)
        })
    }
}

fn brinson_key(key: CacheKey, input: &BrinsonInput) -> CacheKey {
    let mut key = key
        .series("wp", &input.portfolio_weights)
        .series("wb", &input.benchmark_weights)
        .series("rp", &input.portfolio_returns)
        .series("rb", &input.benchmark_returns)
        .param("period", input.period.as_deref().unwrap_or(""));
    for label in input.labels.iter().flatten() {
        key = key.param("label", label);
    }
    key
}
