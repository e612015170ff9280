use clap::{Args, ValueEnum};
use serde::Deserialize;
use serde_json::Value;

use quant_analytics_core::statistics::StatisticsEngine;
use quant_analytics_core::EngineConfig;

use super::{to_json, CliResult, SeriesArgs};
use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TTestVariant {
    OneSample,
    Welch,
    Pooled,
    Paired,
}

/// Arguments for t-tests; the payload is {"sample1": [...], "sample2": [...]}
#[derive(Args)]
pub struct TTestArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    #[arg(long, value_enum, default_value = "welch")]
    pub variant: TTestVariant,

    /// Hypothesised mean for the one-sample test
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub mu0: f64,
}

/// Arguments for two-sample tests without options
#[derive(Args)]
pub struct PairArgs {
    /// Path to JSON input file with "sample1" and "sample2"
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for single-series tests with an optional lag count
#[derive(Args)]
pub struct LaggedSeriesArgs {
    #[command(flatten)]
    pub series: SeriesArgs,

    /// Number of lags (method default when omitted)
    #[arg(long)]
    pub lags: Option<usize>,
}

/// Arguments for Granger causality; the payload is {"cause": [...], "effect": [...]}
#[derive(Args)]
pub struct GrangerArgs {
    #[arg(long)]
    pub input: Option<String>,

    #[arg(long)]
    pub lags: Option<usize>,
}

/// Arguments for Engle-Granger cointegration; the payload is {"y": [...], "x": [...]}
#[derive(Args)]
pub struct CointegrationArgs {
    #[arg(long)]
    pub input: Option<String>,

    /// ADF lags on the residuals
    #[arg(long)]
    pub lags: Option<usize>,
}

#[derive(Deserialize)]
struct Samples {
    sample1: Vec<f64>,
    #[serde(default)]
    sample2: Vec<f64>,
}

#[derive(Deserialize)]
struct CausePair {
    cause: Vec<f64>,
    effect: Vec<f64>,
}

#[derive(Deserialize)]
struct RegressionPair {
    y: Vec<f64>,
    x: Vec<f64>,
}

pub fn run_t_test(args: TTestArgs, config: EngineConfig) -> CliResult<Value> {
    let data: Samples = input::payload(args.input.as_deref(), "t-test")?;
    let engine = StatisticsEngine::with_config(config)?;
    let out = match args.variant {
        TTestVariant::OneSample => engine.t_test_one_sample(&data.sample1, args.mu0)?,
        TTestVariant::Welch => engine.t_test_two_sample(&data.sample1, &data.sample2, false)?,
        TTestVariant::Pooled => engine.t_test_two_sample(&data.sample1, &data.sample2, true)?,
        TTestVariant::Paired => engine.t_test_paired(&data.sample1, &data.sample2)?,
    };
    to_json(&*out)
}

pub fn run_f_test(args: PairArgs, config: EngineConfig) -> CliResult<Value> {
    let data: Samples = input::payload(args.input.as_deref(), "F-test")?;
    let engine = StatisticsEngine::with_config(config)?;
    to_json(&*engine.f_test(&data.sample1, &data.sample2)?)
}

pub fn run_jarque_bera(args: SeriesArgs, config: EngineConfig) -> CliResult<Value> {
    let sample = args.load("Jarque-Bera")?;
    let engine = StatisticsEngine::with_config(config)?;
    to_json(&*engine.jarque_bera(&sample)?)
}

pub fn run_ljung_box(args: LaggedSeriesArgs, config: EngineConfig) -> CliResult<Value> {
    let series = args.series.load("Ljung-Box")?;
    let engine = StatisticsEngine::with_config(config)?;
    to_json(&*engine.ljung_box(&series, args.lags)?)
}

pub fn run_adf(args: LaggedSeriesArgs, config: EngineConfig) -> CliResult<Value> {
    let series = args.series.load("ADF")?;
    let engine = StatisticsEngine::with_config(config)?;
    to_json(&*engine.adf(&series, args.lags)?)
}

pub fn run_granger(args: GrangerArgs, config: EngineConfig) -> CliResult<Value> {
    let data: CausePair = input::payload(args.input.as_deref(), "Granger causality")?;
    let engine = StatisticsEngine::with_config(config)?;
    to_json(&*engine.granger_causality(&data.cause, &data.effect, args.lags)?)
}

pub fn run_engle_granger(args: CointegrationArgs, config: EngineConfig) -> CliResult<Value> {
    let data: RegressionPair = input::payload(args.input.as_deref(), "Engle-Granger")?;
    let engine = StatisticsEngine::with_config(config)?;
    to_json(&*engine.engle_granger(&data.y, &data.x, args.lags)?)
}
