use serde_json::Value;
use std::io::{self, Write};
use tracing::warn;

/// Pretty-print the envelope to stdout. Computation warnings are also logged
/// so they surface on stderr when stdout is piped elsewhere.
pub fn print_json(value: &Value) {
    if let Some(warnings) = value.get("warnings").and_then(Value::as_array) {
        for w in warnings.iter().filter_map(Value::as_str) {
            warn!(warning = w, "computation warning");
        }
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = serde_json::to_writer_pretty(&mut out, value)
        .map_err(io::Error::from)
        .and_then(|()| writeln!(out));
    if let Err(e) = written {
        eprintln!("JSON output error: {e}");
    }
}
