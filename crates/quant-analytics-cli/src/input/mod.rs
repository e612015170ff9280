pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;
use tracing::debug;

use quant_analytics_core::EngineConfig;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Payload for a command: `--input <file>` wins, then piped stdin.
pub fn payload<T: DeserializeOwned>(path: Option<&str>, command: &str) -> CliResult<T> {
    if let Some(path) = path {
        debug!(path, command, "reading input file");
        return file::read_json(path);
    }
    match stdin::read_stdin()? {
        Some(value) => {
            debug!(command, "reading input from stdin");
            Ok(serde_json::from_value(value)?)
        }
        None => Err(format!("--input <file.json> or stdin required for {command}").into()),
    }
}

/// Engine configuration from `--config`, defaulting every field when absent,
/// with an optional seed override.
pub fn engine_config(path: Option<&str>, seed: Option<u64>) -> CliResult<EngineConfig> {
    let mut config = match path {
        Some(path) => file::read_config(path)?,
        None => EngineConfig::default(),
    };
    if seed.is_some() {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}
