use clap::{Args, ValueEnum};
use serde::Deserialize;
use serde_json::Value;

use quant_analytics_core::forecasting::{
    ArimaOrder, ForecastingEngine, ForestParams, SmoothingMethod, SmoothingParams,
};
use quant_analytics_core::EngineConfig;

use super::{to_json, CliResult, InputArgs, SeriesArgs};
use crate::input;

/// Arguments for ARIMA(p, d, q)
#[derive(Args)]
pub struct ArimaArgs {
    #[command(flatten)]
    pub series: SeriesArgs,

    #[arg(long, default_value = "1")]
    pub p: usize,

    #[arg(long, default_value = "1")]
    pub d: usize,

    #[arg(long, default_value = "0")]
    pub q: usize,

    /// Periods ahead; defaults to the configured horizon
    #[arg(long)]
    pub horizon: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SmoothingKind {
    Simple,
    Double,
    Triple,
}

/// Arguments for exponential smoothing
#[derive(Args)]
pub struct SmoothingArgs {
    #[command(flatten)]
    pub series: SeriesArgs,

    #[arg(long, value_enum, default_value = "simple")]
    pub method: SmoothingKind,

    /// Season length, required for triple smoothing
    #[arg(long)]
    pub season_length: Option<usize>,

    #[arg(long)]
    pub alpha: Option<f64>,

    #[arg(long)]
    pub beta: Option<f64>,

    #[arg(long)]
    pub gamma: Option<f64>,

    #[arg(long)]
    pub horizon: Option<usize>,
}

#[derive(Deserialize)]
struct RegressionPayload {
    target: Vec<f64>,
    regressors: Vec<Vec<f64>>,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    future: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct ForestPayload {
    features: Vec<Vec<f64>>,
    target: Vec<f64>,
    #[serde(default)]
    predict: Vec<Vec<f64>>,
    #[serde(default)]
    params: ForestParams,
}

pub fn run_arima(args: ArimaArgs, config: EngineConfig) -> CliResult<Value> {
    let series = args.series.load("ARIMA")?;
    let engine = ForecastingEngine::with_config(config)?;
    let order = ArimaOrder::new(args.p, args.d, args.q);
    to_json(&*engine.arima(&series, order, args.horizon)?)
}

pub fn run_smoothing(args: SmoothingArgs, config: EngineConfig) -> CliResult<Value> {
    let series = args.series.load("exponential smoothing")?;
    let method = match args.method {
        SmoothingKind::Simple => SmoothingMethod::Simple,
        SmoothingKind::Double => SmoothingMethod::Double,
        SmoothingKind::Triple => SmoothingMethod::Triple {
            season_length: args
                .season_length
                .ok_or("--season-length is required for triple smoothing")?,
        },
    };
    let params = SmoothingParams {
        alpha: args.alpha,
        beta: args.beta,
        gamma: args.gamma,
    };
    let engine = ForecastingEngine::with_config(config)?;
    to_json(&*engine.exponential_smoothing(&series, method, params, args.horizon)?)
}

/// Payload: {"target": [...], "regressors": [[...], ...], "names": [...], "future": [[...], ...]}
/// with `regressors` column-major and `future` row-major.
pub fn run_regression_forecast(args: InputArgs, config: EngineConfig) -> CliResult<Value> {
    let data: RegressionPayload = input::payload(args.input.as_deref(), "regression forecast")?;
    let names: Vec<&str> = data.names.iter().map(String::as_str).collect();
    let engine = ForecastingEngine::with_config(config)?;
    to_json(&*engine.regression_forecast(&data.target, &data.regressors, &names, &data.future)?)
}

/// Payload: {"features": [[...], ...], "target": [...], "predict": [[...]], "params": {...}}
/// with `features` and `predict` row-major.
pub fn run_random_forest(args: InputArgs, config: EngineConfig) -> CliResult<Value> {
    let data: ForestPayload = input::payload(args.input.as_deref(), "random forest")?;
    let engine = ForecastingEngine::with_config(config)?;
    to_json(&*engine.random_forest(&data.features, &data.target, &data.predict, data.params)?)
}
