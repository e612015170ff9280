use serde::Deserialize;
use serde_json::Value;

use quant_analytics_core::attribution::{AttributionEngine, BrinsonInput, CarhartInput};
use quant_analytics_core::{EngineConfig, Portfolio};

use super::{to_json, CliResult, InputArgs};
use crate::input;

#[derive(Deserialize)]
struct BenchmarkPayload {
    portfolio_returns: Vec<f64>,
    benchmark_returns: Vec<f64>,
}

pub fn run_brinson(args: InputArgs, config: EngineConfig) -> CliResult<Value> {
    let data: BrinsonInput = input::payload(args.input.as_deref(), "Brinson attribution")?;
    let engine = AttributionEngine::with_config(config)?;
    to_json(&*engine.brinson(&data)?)
}

/// Input is a JSON array of single-period Brinson inputs, oldest first.
pub fn run_brinson_linked(args: InputArgs, config: EngineConfig) -> CliResult<Value> {
    let periods: Vec<BrinsonInput> =
        input::payload(args.input.as_deref(), "linked Brinson attribution")?;
    let engine = AttributionEngine::with_config(config)?;
    to_json(&*engine.brinson_linked(&periods)?)
}

pub fn run_carhart(args: InputArgs, config: EngineConfig) -> CliResult<Value> {
    let data: CarhartInput = input::payload(args.input.as_deref(), "Carhart attribution")?;
    let engine = AttributionEngine::with_config(config)?;
    to_json(&*engine.carhart(&data)?)
}

pub fn run_risk_attribution(args: InputArgs, config: EngineConfig) -> CliResult<Value> {
    let portfolio: Portfolio = input::payload(args.input.as_deref(), "risk attribution")?;
    let engine = AttributionEngine::with_config(config)?;
    to_json(&*engine.risk_attribution(&portfolio)?)
}

pub fn run_benchmark_attribution(args: InputArgs, config: EngineConfig) -> CliResult<Value> {
    let data: BenchmarkPayload = input::payload(args.input.as_deref(), "benchmark attribution")?;
    let engine = AttributionEngine::with_config(config)?;
    to_json(&*engine.benchmark_attribution(&data.portfolio_returns, &data.benchmark_returns)?)
}
