use clap::Args;
use serde_json::Value;

use quant_analytics_core::stress::{builtin_scenarios, Scenario, StressEngine};
use quant_analytics_core::{EngineConfig, Portfolio};

use super::{to_json, CliResult};
use crate::input;

/// Arguments for a single stress test
#[derive(Args)]
pub struct StressTestArgs {
    /// Path to the portfolio JSON file (stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Built-in scenario name, e.g. "2008 Financial Crisis"
    #[arg(long, conflicts_with = "scenario_file")]
    pub scenario: Option<String>,

    /// Path to a custom scenario JSON file
    #[arg(long)]
    pub scenario_file: Option<String>,
}

/// Arguments for multi-scenario analysis
#[derive(Args)]
pub struct MultiScenarioArgs {
    /// Path to the portfolio JSON file (stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// JSON array of scenarios; the built-in library when omitted
    #[arg(long)]
    pub scenarios_file: Option<String>,
}

pub fn run_stress_test(args: StressTestArgs, config: EngineConfig) -> CliResult<Value> {
    let portfolio: Portfolio = input::payload(args.input.as_deref(), "stress test")?;
    let engine = StressEngine::with_config(config)?;
    let out = match (&args.scenario, &args.scenario_file) {
        (_, Some(path)) => {
            let scenario: Scenario = input::file::read_json(path)?;
            engine.run_stress_test(&portfolio, &scenario)?
        }
        (Some(name), None) => engine.run_builtin(&portfolio, name)?,
        (None, None) => return Err("--scenario <name> or --scenario-file <file.json> required".into()),
    };
    to_json(&*out)
}

pub fn run_multi_scenario(args: MultiScenarioArgs, config: EngineConfig) -> CliResult<Value> {
    let portfolio: Portfolio = input::payload(args.input.as_deref(), "multi-scenario analysis")?;
    let scenarios: Vec<Scenario> = match &args.scenarios_file {
        Some(path) => input::file::read_json(path)?,
        None => builtin_scenarios(),
    };
    let engine = StressEngine::with_config(config)?;
    let out = engine.run_multi_scenario(&portfolio, &scenarios)?;
    to_json(&*out)
}

pub fn run_list_scenarios() -> CliResult<Value> {
    to_json(&builtin_scenarios())
}
