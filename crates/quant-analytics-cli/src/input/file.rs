use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use quant_analytics_core::EngineConfig;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Read a JSON file and deserialise into a typed struct.
pub fn read_json<T: DeserializeOwned>(path: &str) -> CliResult<T> {
    let (canonical, contents) = read_text(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e).into())
}

/// Read an engine configuration. `.yaml` / `.yml` files are parsed as YAML,
/// anything else as JSON. Missing fields take their defaults.
pub fn read_config(path: &str) -> CliResult<EngineConfig> {
    let (canonical, contents) = read_text(path)?;
    let is_yaml = canonical
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    let parsed = if is_yaml {
        serde_yaml::from_str(&contents).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&contents).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| format!("Invalid config '{}': {}", canonical.display(), e).into())
}

fn read_text(path: &str) -> CliResult<(PathBuf, String)> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    Ok((canonical, contents))
}

/// Resolve relative paths against the working directory and require a file.
fn resolve_path(path: &str) -> CliResult<PathBuf> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };
    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }
    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }
    Ok(canonical)
}
