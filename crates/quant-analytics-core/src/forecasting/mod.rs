//! ARIMA, exponential smoothing, regression forecasting and a random-forest
//! regressor.
//!
//! Forecast horizons default to the configured `forecast_horizon`; bands use
//! the configured `confidence_level`.

pub mod arima;
pub mod forest;
pub mod regression;
pub mod smoothing;

use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::error::AnalyticsError;
use crate::numerical::special::normal_inv;
use crate::numerical::NumericalCore;
use crate::types::ComputationOutput;
use crate::AnalyticsResult;

pub use arima::{ArimaOrder, ArimaResult};
pub use forest::{ForestParams, RandomForestResult};
pub use regression::RegressionForecast;
pub use smoothing::{SmoothingMethod, SmoothingParams, SmoothingResult};

/// One step of a forecast with its interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// 1-based steps ahead
    pub step: usize,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

pub(crate) fn horizon_or_default(
    core: &NumericalCore,
    method: &str,
    horizon: Option<usize>,
) -> AnalyticsResult<usize> {
    match horizon {
        Some(0) => Err(AnalyticsError::invalid(
            method,
            "horizon",
            "Forecast horizon must be at least 1",
        )),
        Some(h) => Ok(h),
        None => Ok(core.config().forecast_horizon),
    }
}

/// Gaussian bands `value +/- z sigma sqrt(h)` at the configured confidence.
/// Returns the points and the confidence level used.
pub(crate) fn gaussian_bands(
    core: &NumericalCore,
    values: &[f64],
    sigma: f64,
) -> AnalyticsResult<(Vec<ForecastPoint>, f64)> {
    let confidence = core.config().confidence_level;
    let z = normal_inv(0.5 + confidence / 2.0)?;
    let points = values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let step = i + 1;
            let half_width = z * sigma * (step as f64).sqrt();
            ForecastPoint {
                step,
                value: core.round(value),
                lower: core.round(value - half_width),
                upper: core.round(value + half_width),
            }
        })
        .collect();
    Ok((points, confidence))
}

#[derive(Debug, Clone)]
pub struct ForecastingEngine {
    core: Rc<NumericalCore>,
}

impl ForecastingEngine {
    pub fn new(core: Rc<NumericalCore>) -> Self {
        ForecastingEngine { core }
    }

    pub fn with_config(config: EngineConfig) -> AnalyticsResult<Self> {
        Ok(Self::new(NumericalCore::shared(config)?))
    }

    pub fn core(&self) -> &Rc<NumericalCore> {
        &self.core
    }

    pub fn arima(
        &self,
        series: &[f64],
        order: ArimaOrder,
        horizon: Option<usize>,
    ) -> AnalyticsResult<Rc<ComputationOutput<ArimaResult>>> {
        let key = self
            .core
            .key("arima")
            .series("series", series)
            .param("order", order)
            .param("horizon", format!("{horizon:?}"));
        self.core
            .memoize(key, || arima::arima(&self.core, series, order, horizon))
    }

    pub fn exponential_smoothing(
        &self,
        series: &[f64],
        method: SmoothingMethod,
        params: SmoothingParams,
        horizon: Option<usize>,
    ) -> AnalyticsResult<Rc<ComputationOutput<SmoothingResult>>> {
        let key = self
            .core
            .key("exponential_smoothing")
            .series("series", series)
            .param("method", format!("{method:?}"))
            .param("params", format!("{params:?}"))
            .param("horizon", format!("{horizon:?}"));
        self.core.memoize(key, || {
            smoothing::exponential_smoothing(&self.core, series, method, params, horizon)
        })
    }

    /// Fit `target` on `regressors` (one column per variable) and forecast
    /// each row of `future`.
    pub fn regression_forecast(
        &self,
        target: &[f64],
        regressors: &[Vec<f64>],
        names: &[&str],
        future: &[Vec<f64>],
    ) -> AnalyticsResult<Rc<ComputationOutput<RegressionForecast>>> {
        let key = self
            .core
            .key("regression_forecast")
            .series("target", target)
            .matrix("regressors", regressors)
            .param("names", names.join(","))
            .matrix("future", future);
        self.core.memoize(key, || {
            regression::regression_forecast(&self.core, target, regressors, names, future)
        })
    }

    /// Random-forest regression on row-major `features`, predicting each row
    /// of `predict`. The forest seed falls back to the engine seed.
    pub fn random_forest(
        &self,
        features: &[Vec<f64>],
        target: &[f64],
        predict: &[Vec<f64>],
        params: ForestParams,
    ) -> AnalyticsResult<Rc<ComputationOutput<RandomForestResult>>> {
        let key = self
            .core
            .key("random_forest")
            .matrix("features", features)
            .series("target", target)
            .matrix("predict", predict)
            .param("params", format!("{params:?}"))
            .param("engine_seed", format!("{:?}", self.core.config().seed));
        self.core.memoize(key, || {
            forest::random_forest(&self.core, features, target, predict, params)
        })
    }
}
