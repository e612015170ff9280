mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::attribution;
use commands::forecasting::{self, ArimaArgs, SmoothingArgs};
use commands::risk::{self, ReturnsArgs, VarArgs};
use commands::statistics::{
    self, CointegrationArgs, GrangerArgs, LaggedSeriesArgs, PairArgs, TTestArgs,
};
use commands::stress::{self, MultiScenarioArgs, StressTestArgs};
use commands::{InputArgs, SeriesArgs};
use output::OutputFormat;

/// Quantitative analytics from the command line
#[derive(Parser)]
#[command(
    name = "qae",
    version,
    about = "Quantitative analytics: risk, stress testing, attribution, statistics and forecasting",
    long_about = "Reads numeric series and portfolio definitions as JSON (file or stdin), \
                  runs one analytics operation and prints the result envelope. \
                  Set RUST_LOG=debug to see cache and fallback diagnostics on stderr."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Seed for stochastic routines, overriding the config file
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Returns profile of a price series (Sharpe, Sortino, drawdown, ...)
    Returns(ReturnsArgs),
    /// Value at Risk and Expected Shortfall
    Var(VarArgs),
    /// Pairwise correlation matrix of a portfolio's assets
    Correlation(InputArgs),
    /// Full portfolio risk analysis
    PortfolioRisk(InputArgs),
    /// Run one stress scenario against a portfolio
    StressTest(StressTestArgs),
    /// Run several scenarios and derive a risk profile
    MultiScenario(MultiScenarioArgs),
    /// List the built-in scenario library
    Scenarios,
    /// Brinson allocation / selection / interaction
    Brinson(InputArgs),
    /// Carino-linked multi-period Brinson attribution
    BrinsonLinked(InputArgs),
    /// Carhart four-factor regression
    Carhart(InputArgs),
    /// Marginal and factor risk contributions
    RiskAttribution(InputArgs),
    /// Tracking error and information ratio against a benchmark
    BenchmarkAttribution(InputArgs),
    /// One-sample, Welch, pooled or paired t-test
    TTest(TTestArgs),
    /// F-test for equal variances
    FTest(PairArgs),
    /// Jarque-Bera normality test
    JarqueBera(SeriesArgs),
    /// Ljung-Box autocorrelation test
    LjungBox(LaggedSeriesArgs),
    /// Augmented Dickey-Fuller unit-root test
    Adf(LaggedSeriesArgs),
    /// Granger causality F-test
    Granger(GrangerArgs),
    /// Engle-Granger cointegration test
    EngleGranger(CointegrationArgs),
    /// ARIMA(p, d, q) forecast
    Arima(ArimaArgs),
    /// Simple, Holt or Holt-Winters exponential smoothing
    Smooth(SmoothingArgs),
    /// Multiple-regression forecast with prediction intervals
    RegressionForecast(InputArgs),
    /// Random-forest regression
    RandomForest(InputArgs),
    /// Print version information
    Version,
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Commands::Version = cli.command {
        println!("qae {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = input::engine_config(cli.config.as_deref(), cli.seed)
        .and_then(|config| dispatch(cli.command, config));

    match result {
        Ok(value) => {
            output::format_output(cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

fn dispatch(
    command: Commands,
    config: quant_analytics_core::EngineConfig,
) -> commands::CliResult<serde_json::Value> {
    match command {
        Commands::Returns(args) => risk::run_returns(args, config),
        Commands::Var(args) => risk::run_var(args, config),
        Commands::Correlation(args) => risk::run_correlation(args, config),
        Commands::PortfolioRisk(args) => risk::run_portfolio_risk(args, config),
        Commands::StressTest(args) => stress::run_stress_test(args, config),
        Commands::MultiScenario(args) => stress::run_multi_scenario(args, config),
        Commands::Scenarios => stress::run_list_scenarios(),
        Commands::Brinson(args) => attribution::run_brinson(args, config),
        Commands::BrinsonLinked(args) => attribution::run_brinson_linked(args, config),
        Commands::Carhart(args) => attribution::run_carhart(args, config),
        Commands::RiskAttribution(args) => attribution::run_risk_attribution(args, config),
        Commands::BenchmarkAttribution(args) => {
            attribution::run_benchmark_attribution(args, config)
        }
        Commands::TTest(args) => statistics::run_t_test(args, config),
        Commands::FTest(args) => statistics::run_f_test(args, config),
        Commands::JarqueBera(args) => statistics::run_jarque_bera(args, config),
        Commands::LjungBox(args) => statistics::run_ljung_box(args, config),
        Commands::Adf(args) => statistics::run_adf(args, config),
        Commands::Granger(args) => statistics::run_granger(args, config),
        Commands::EngleGranger(args) => statistics::run_engle_granger(args, config),
        Commands::Arima(args) => forecasting::run_arima(args, config),
        Commands::Smooth(args) => forecasting::run_smoothing(args, config),
        Commands::RegressionForecast(args) => {
            forecasting::run_regression_forecast(args, config)
        }
        Commands::RandomForest(args) => forecasting::run_random_forest(args, config),
        Commands::Version => Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_var_flags_parse() {
        let cli = Cli::try_parse_from([
            "qae",
            "var",
            "--values",
            "0.01,-0.02,0.03",
            "--method",
            "monte_carlo",
            "--output",
            "minimal",
        ])
        .unwrap();
        match cli.command {
            Commands::Var(args) => {
                assert_eq!(args.returns.values.unwrap().len(), 3);
                assert_eq!(args.method, quant_analytics_core::risk::VarMethod::MonteCarlo);
            }
            _ => panic!("expected var"),
        }
        assert_eq!(cli.output, OutputFormat::Minimal);
    }

    #[test]
    fn test_jarque_bera_runs_inline() {
        let args = SeriesArgs {
            input: None,
            values: Some((0..40).map(|i| ((i * 7 % 11) as f64) - 5.0).collect()),
        };
        let value = statistics::run_jarque_bera(args, Default::default()).unwrap();
        assert_eq!(value["methodology"], "jarque_bera");
        assert!(value["result"]["p_value"].is_number());
    }
}
