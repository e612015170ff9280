pub mod attribution;
pub mod forecasting;
pub mod risk;
pub mod statistics;
pub mod stress;

use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::input;

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// A numeric series given inline or as a JSON file or stdin payload.
#[derive(Args, Debug, Default)]
pub struct SeriesArgs {
    /// Path to a JSON file holding an array of numbers or {"series": [...]}
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated values (e.g. "0.01,-0.02,0.015")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub values: Option<Vec<f64>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeriesPayload {
    Bare(Vec<f64>),
    Wrapped { series: Vec<f64> },
}

/// Entries kept as raw JSON so non-numeric values reach the engine.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSeriesPayload {
    Bare(Vec<Value>),
    Wrapped { series: Vec<Value> },
}

impl SeriesArgs {
    pub fn load(&self, command: &str) -> CliResult<Vec<f64>> {
        if let Some(values) = &self.values {
            return Ok(values.clone());
        }
        let payload: SeriesPayload = input::payload(self.input.as_deref(), command)?;
        Ok(match payload {
            SeriesPayload::Bare(v) | SeriesPayload::Wrapped { series: v } => v,
        })
    }

    /// Like `load`, but leaves each entry as JSON for loosely-typed callers.
    pub fn load_raw(&self, command: &str) -> CliResult<Vec<Value>> {
        if let Some(values) = &self.values {
            return Ok(values.iter().copied().map(Value::from).collect());
        }
        let payload: RawSeriesPayload = input::payload(self.input.as_deref(), command)?;
        Ok(match payload {
            RawSeriesPayload::Bare(v) | RawSeriesPayload::Wrapped { series: v } => v,
        })
    }
}

/// A structured JSON payload from `--input` or stdin.
#[derive(Args, Debug, Default)]
pub struct InputArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<Value> {
    Ok(serde_json::to_value(value)?)
}
