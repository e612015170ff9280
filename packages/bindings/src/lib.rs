use napi::Result as NapiResult;
use napi_derive::napi;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use quant_analytics_core::attribution::{AttributionEngine, BrinsonInput, CarhartInput};
use quant_analytics_core::forecasting::{
    ArimaOrder, ForecastingEngine, ForestParams, SmoothingMethod, SmoothingParams,
};
use quant_analytics_core::risk::{RiskEngine, VarMethod};
use quant_analytics_core::statistics::StatisticsEngine;
use quant_analytics_core::stress::{builtin_scenarios, Scenario, StressEngine};
use quant_analytics_core::{EngineConfig, Portfolio, ReturnFrequency};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse<T: DeserializeOwned>(input_json: &str) -> NapiResult<T> {
    serde_json::from_str(input_json).map_err(to_napi_error)
}

/// Every binding accepts an optional engine configuration as JSON; missing
/// fields take their defaults.
fn config(config_json: Option<String>) -> NapiResult<EngineConfig> {
    let config: EngineConfig = match config_json {
        Some(json) => parse(&json)?,
        None => EngineConfig::default(),
    };
    config.validate().map_err(to_napi_error)?;
    Ok(config)
}

fn to_json<T: serde::Serialize + ?Sized>(output: &T) -> NapiResult<String> {
    serde_json::to_string(output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ReturnsInput {
    /// Raw JSON entries; a non-numeric price yields the neutral result
    prices: Vec<serde_json::Value>,
    frequency: Option<ReturnFrequency>,
    risk_free_rate: Option<f64>,
}

#[derive(Deserialize)]
struct VarInput {
    returns: Vec<f64>,
    confidence: Option<f64>,
    #[serde(default)]
    method: VarMethod,
}

#[napi]
pub fn compute_returns(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: ReturnsInput = parse(&input_json)?;
    let engine = RiskEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .compute_returns_raw(&input.prices, input.frequency, input.risk_free_rate)
        .map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn compute_var(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: VarInput = parse(&input_json)?;
    let engine = RiskEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .compute_var(&input.returns, input.confidence, input.method)
        .map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn correlation_matrix(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let portfolio: Portfolio = parse(&input_json)?;
    let engine = RiskEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .correlation_matrix(&portfolio.assets)
        .map_err(to_napi_error)?;
    to_json(&output)
}

#[napi]
pub fn analyze_portfolio_risk(
    input_json: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let portfolio: Portfolio = parse(&input_json)?;
    let engine = RiskEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .analyze_portfolio_risk(&portfolio)
        .map_err(to_napi_error)?;
    to_json(&*output)
}

// ---------------------------------------------------------------------------
// Stress testing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct StressInput {
    portfolio: Portfolio,
    /// A custom scenario, or
    scenario: Option<Scenario>,
    /// the name of a built-in one
    scenario_name: Option<String>,
}

#[derive(Deserialize)]
struct MultiScenarioInput {
    portfolio: Portfolio,
    scenarios: Option<Vec<Scenario>>,
}

#[napi]
pub fn run_stress_test(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: StressInput = parse(&input_json)?;
    let engine = StressEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = match (&input.scenario, &input.scenario_name) {
        (Some(scenario), _) => engine.run_stress_test(&input.portfolio, scenario),
        (None, Some(name)) => engine.run_builtin(&input.portfolio, name),
        (None, None) => {
            return Err(to_napi_error(
                "Either 'scenario' or 'scenario_name' is required",
            ))
        }
    }
    .map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn run_multi_scenario(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: MultiScenarioInput = parse(&input_json)?;
    let scenarios = input.scenarios.unwrap_or_else(builtin_scenarios);
    let engine = StressEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .run_multi_scenario(&input.portfolio, &scenarios)
        .map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn list_scenarios() -> NapiResult<String> {
    to_json(&builtin_scenarios())
}

// ---------------------------------------------------------------------------
// Attribution
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct BenchmarkInput {
    portfolio_returns: Vec<f64>,
    benchmark_returns: Vec<f64>,
}

#[napi]
pub fn brinson_attribution(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: BrinsonInput = parse(&input_json)?;
    let engine = AttributionEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine.brinson(&input).map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn brinson_linked(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let periods: Vec<BrinsonInput> = parse(&input_json)?;
    let engine = AttributionEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine.brinson_linked(&periods).map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn carhart_attribution(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: CarhartInput = parse(&input_json)?;
    let engine = AttributionEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine.carhart(&input).map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn risk_attribution(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let portfolio: Portfolio = parse(&input_json)?;
    let engine = AttributionEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine.risk_attribution(&portfolio).map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn benchmark_attribution(
    input_json: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let input: BenchmarkInput = parse(&input_json)?;
    let engine = AttributionEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .benchmark_attribution(&input.portfolio_returns, &input.benchmark_returns)
        .map_err(to_napi_error)?;
    to_json(&*output)
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum TTestVariant {
    OneSample,
    Welch,
    Pooled,
    Paired,
}

#[derive(Deserialize)]
struct TTestInput {
    sample1: Vec<f64>,
    #[serde(default)]
    sample2: Vec<f64>,
    variant: TTestVariant,
    #[serde(default)]
    hypothesized_mean: f64,
}

#[derive(Deserialize)]
struct SamplePair {
    sample1: Vec<f64>,
    sample2: Vec<f64>,
}

#[derive(Deserialize)]
struct SeriesInput {
    series: Vec<f64>,
    lags: Option<usize>,
}

#[derive(Deserialize)]
struct GrangerInput {
    cause: Vec<f64>,
    effect: Vec<f64>,
    lags: Option<usize>,
}

#[derive(Deserialize)]
struct CointegrationInput {
    y: Vec<f64>,
    x: Vec<f64>,
    lags: Option<usize>,
}

#[napi]
pub fn t_test(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: TTestInput = parse(&input_json)?;
    let engine = StatisticsEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = match input.variant {
        TTestVariant::OneSample => {
            engine.t_test_one_sample(&input.sample1, input.hypothesized_mean)
        }
        TTestVariant::Welch => engine.t_test_two_sample(&input.sample1, &input.sample2, false),
        TTestVariant::Pooled => engine.t_test_two_sample(&input.sample1, &input.sample2, true),
        TTestVariant::Paired => engine.t_test_paired(&input.sample1, &input.sample2),
    }
    .map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn f_test(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: SamplePair = parse(&input_json)?;
    let engine = StatisticsEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .f_test(&input.sample1, &input.sample2)
        .map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn jarque_bera(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: SeriesInput = parse(&input_json)?;
    let engine = StatisticsEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine.jarque_bera(&input.series).map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn ljung_box(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: SeriesInput = parse(&input_json)?;
    let engine = StatisticsEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .ljung_box(&input.series, input.lags)
        .map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn adf_test(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: SeriesInput = parse(&input_json)?;
    let engine = StatisticsEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine.adf(&input.series, input.lags).map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn granger_causality(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: GrangerInput = parse(&input_json)?;
    let engine = StatisticsEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .granger_causality(&input.cause, &input.effect, input.lags)
        .map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn engle_granger(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: CointegrationInput = parse(&input_json)?;
    let engine = StatisticsEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .engle_granger(&input.y, &input.x, input.lags)
        .map_err(to_napi_error)?;
    to_json(&*output)
}

// ---------------------------------------------------------------------------
// Forecasting
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ArimaInput {
    series: Vec<f64>,
    #[serde(default)]
    order: ArimaOrder,
    horizon: Option<usize>,
}

#[derive(Deserialize)]
struct SmoothingInput {
    series: Vec<f64>,
    method: SmoothingMethod,
    #[serde(default)]
    params: SmoothingParams,
    horizon: Option<usize>,
}

#[derive(Deserialize)]
struct RegressionInput {
    target: Vec<f64>,
    /// One column per regressor
    regressors: Vec<Vec<f64>>,
    #[serde(default)]
    names: Vec<String>,
    /// One row per forecast
    #[serde(default)]
    future: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct ForestInput {
    features: Vec<Vec<f64>>,
    target: Vec<f64>,
    #[serde(default)]
    predict: Vec<Vec<f64>>,
    #[serde(default)]
    params: ForestParams,
}

#[napi]
pub fn arima_forecast(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: ArimaInput = parse(&input_json)?;
    let engine = ForecastingEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .arima(&input.series, input.order, input.horizon)
        .map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn exponential_smoothing(
    input_json: String,
    config_json: Option<String>,
) -> NapiResult<String> {
    let input: SmoothingInput = parse(&input_json)?;
    let engine = ForecastingEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .exponential_smoothing(&input.series, input.method, input.params, input.horizon)
        .map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn regression_forecast(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: RegressionInput = parse(&input_json)?;
    let names: Vec<&str> = input.names.iter().map(String::as_str).collect();
    let engine = ForecastingEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .regression_forecast(&input.target, &input.regressors, &names, &input.future)
        .map_err(to_napi_error)?;
    to_json(&*output)
}

#[napi]
pub fn random_forest(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let input: ForestInput = parse(&input_json)?;
    let engine = ForecastingEngine::with_config(config(config_json)?).map_err(to_napi_error)?;
    let output = engine
        .random_forest(&input.features, &input.target, &input.predict, input.params)
        .map_err(to_napi_error)?;
    to_json(&*output)
}
