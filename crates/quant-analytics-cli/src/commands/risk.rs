use clap::Args;
use serde_json::Value;

use quant_analytics_core::risk::{RiskEngine, VarMethod};
use quant_analytics_core::{EngineConfig, Portfolio, ReturnFrequency};

use super::{to_json, CliResult, InputArgs, SeriesArgs};
use crate::input;

/// Arguments for returns analysis of a price series
#[derive(Args)]
pub struct ReturnsArgs {
    #[command(flatten)]
    pub prices: SeriesArgs,

    /// Observation frequency: daily, weekly, monthly, quarterly, yearly
    #[arg(long)]
    pub frequency: Option<ReturnFrequency>,

    /// Annualised risk-free rate (defaults to the configured rate)
    #[arg(long, allow_hyphen_values = true)]
    pub risk_free_rate: Option<f64>,
}

/// Arguments for Value at Risk
#[derive(Args)]
pub struct VarArgs {
    #[command(flatten)]
    pub returns: SeriesArgs,

    /// Confidence level in (0, 1); defaults to the configured level
    #[arg(long)]
    pub confidence: Option<f64>,

    /// historical, parametric or monte_carlo
    #[arg(long, default_value = "historical")]
    pub method: VarMethod,
}

pub fn run_returns(args: ReturnsArgs, config: EngineConfig) -> CliResult<Value> {
    let prices = args.prices.load_raw("returns analysis")?;
    let engine = RiskEngine::with_config(config)?;
    let out = engine.compute_returns_raw(&prices, args.frequency, args.risk_free_rate)?;
    to_json(&*out)
}

pub fn run_var(args: VarArgs, config: EngineConfig) -> CliResult<Value> {
    let returns = args.returns.load("VaR")?;
    let engine = RiskEngine::with_config(config)?;
    let out = engine.compute_var(&returns, args.confidence, args.method)?;
    to_json(&*out)
}

pub fn run_correlation(args: InputArgs, config: EngineConfig) -> CliResult<Value> {
    let portfolio: Portfolio = input::payload(args.input.as_deref(), "correlation matrix")?;
    let engine = RiskEngine::with_config(config)?;
    to_json(&engine.correlation_matrix(&portfolio.assets)?)
}

pub fn run_portfolio_risk(args: InputArgs, config: EngineConfig) -> CliResult<Value> {
    let portfolio: Portfolio = input::payload(args.input.as_deref(), "portfolio risk")?;
    let engine = RiskEngine::with_config(config)?;
    let out = engine.analyze_portfolio_risk(&portfolio)?;
    to_json(&*out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn returns_args(input: Option<String>, values: Option<Vec<f64>>) -> ReturnsArgs {
        ReturnsArgs {
            prices: SeriesArgs { input, values },
            frequency: None,
            risk_free_rate: None,
        }
    }

    #[test]
    fn test_non_numeric_price_gives_neutral_returns() {
        let path = std::env::temp_dir().join(format!("qae-{}-prices.json", std::process::id()));
        fs::write(&path, r#"{"series": ["n/a", 101, 102.5]}"#).unwrap();
        let args = returns_args(Some(path.to_string_lossy().into_owned()), None);
        let value = run_returns(args, EngineConfig::default()).unwrap();
        assert_eq!(value["result"]["total_return"], 0.0);
        assert_eq!(value["result"]["observations"], 0);
        assert_eq!(value["warnings"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_inline_prices_use_typed_path() {
        let args = returns_args(None, Some(vec![100.0, 110.0, 121.0]));
        let value = run_returns(args, EngineConfig::default()).unwrap();
        let total = value["result"]["total_return"].as_f64().unwrap();
        assert!((total - 0.21).abs() < 1e-9);
    }
}
