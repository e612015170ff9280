//! Returns analysis, Value at Risk and portfolio volatility.

pub mod portfolio;
pub mod returns;
pub mod var;

use std::rc::Rc;

use crate::cache::CacheKey;
use crate::config::EngineConfig;
use crate::error::AnalyticsError;
use crate::numerical::NumericalCore;
use crate::types::{Asset, ComputationOutput, Portfolio, ReturnFrequency};
use crate::AnalyticsResult;

pub use portfolio::{AssetRiskContribution, CorrelationMatrix, PortfolioRiskAnalysis};
pub use returns::ReturnsAnalysis;
pub use var::{VarMethod, VarResult};

/// Risk computations over a shared `NumericalCore`. Every published result
/// is memoized; repeated identical calls within the cache TTL return the same
/// `Rc`.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    core: Rc<NumericalCore>,
}

impl RiskEngine {
    pub fn new(core: Rc<NumericalCore>) -> Self {
        RiskEngine { core }
    }

    pub fn with_config(config: EngineConfig) -> AnalyticsResult<Self> {
        Ok(Self::new(NumericalCore::shared(config)?))
    }

    pub fn core(&self) -> &Rc<NumericalCore> {
        &self.core
    }

    /// Returns profile of a price series. Frequency and risk-free rate default
    /// to the engine configuration.
    pub fn compute_returns(
        &self,
        prices: &[f64],
        frequency: Option<ReturnFrequency>,
        risk_free_rate: Option<f64>,
    ) -> AnalyticsResult<Rc<ComputationOutput<ReturnsAnalysis>>> {
        let frequency = frequency.unwrap_or(self.core.config().frequency);
        let rf = risk_free_rate.unwrap_or(self.core.config().risk_free_rate);
        let key = self
            .core
            .key("compute_returns")
            .series("prices", prices)
            .param("frequency", frequency.as_str())
            .param("risk_free_rate", rf);
        self.core
            .memoize(key, || returns::compute_returns(&self.core, prices, frequency, rf))
    }

    /// Loosely-typed entry point: any non-numeric entry yields the neutral
    /// zero result with a warning instead of an error.
    pub fn compute_returns_raw(
        &self,
        values: &[serde_json::Value],
        frequency: Option<ReturnFrequency>,
        risk_free_rate: Option<f64>,
    ) -> AnalyticsResult<Rc<ComputationOutput<ReturnsAnalysis>>> {
        let frequency_or_default = frequency.unwrap_or(self.core.config().frequency);
        if values.len() < 2 {
            return Err(AnalyticsError::insufficient(
                "compute_returns",
                format!("At least 2 prices required, got {}", values.len()),
            ));
        }
        let mut prices = Vec::with_capacity(values.len());
        for (i, v) in values.iter().enumerate() {
            match v.as_f64() {
                Some(p) => prices.push(p),
                None => {
                    return Ok(Rc::new(returns::neutral_returns(
                        &self.core,
                        values.len(),
                        i,
                        frequency_or_default,
                    )))
                }
            }
        }
        self.compute_returns(&prices, frequency, risk_free_rate)
    }

    /// VaR and Expected Shortfall; `confidence` defaults to the configured level.
    pub fn compute_var(
        &self,
        returns: &[f64],
        confidence: Option<f64>,
        method: VarMethod,
    ) -> AnalyticsResult<Rc<ComputationOutput<VarResult>>> {
        let confidence = confidence.unwrap_or(self.core.config().confidence_level);
        let key = self
            .core
            .key("compute_var")
            .series("returns", returns)
            .param("confidence", confidence)
            .param("method", method.as_str());
        self.core
            .memoize(key, || var::compute_var(&self.core, returns, confidence, method))
    }

    pub fn correlation_matrix(&self, assets: &[Asset]) -> AnalyticsResult<CorrelationMatrix> {
        let corr = portfolio::correlation_matrix(assets)?;
        Ok(CorrelationMatrix {
            symbols: corr.symbols,
            matrix: corr.matrix.iter().map(|r| self.core.round_all(r)).collect(),
        })
    }

    pub fn portfolio_volatility(&self, assets: &[Asset]) -> AnalyticsResult<f64> {
        Ok(self.core.round(portfolio::portfolio_volatility(assets)?))
    }

    pub fn analyze_portfolio_risk(
        &self,
        portfolio: &Portfolio,
    ) -> AnalyticsResult<Rc<ComputationOutput<PortfolioRiskAnalysis>>> {
        let key = portfolio_key(self.core.key("analyze_portfolio_risk"), portfolio);
        self.core
            .memoize(key, || portfolio::analyze_portfolio_risk(&self.core, portfolio))
    }
}

/// Extend `key` with every asset attribute that can change a result.
pub(crate) fn portfolio_key(key: CacheKey, portfolio: &Portfolio) -> CacheKey {
    let mut key = key.param("assets", portfolio.assets.len());
    for a in &portfolio.assets {
        key = key
            .param("symbol", &a.symbol)
            .param("w", a.weight)
            .param("mu", a.expected_return)
            .param("sigma", a.volatility)
            .param("class", a.asset_class.as_deref().unwrap_or(""))
            .param("sector", a.sector.as_deref().unwrap_or(""))
            .param("type", a.asset_type.as_deref().unwrap_or(""))
            .param("factor", a.factor.as_deref().unwrap_or(""))
            .series("returns", a.return_series());
        for (other, rho) in a.correlations.iter().flatten() {
            key = key.param(&format!("rho:{other}"), rho);
        }
    }
    key
}
