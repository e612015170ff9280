//! Renderers for a `ComputationOutput` envelope already converted to JSON.

pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use clap::ValueEnum;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The full envelope, pretty-printed
    #[default]
    Json,
    /// Field/value table plus one table per result array
    Table,
    /// Result rows or flattened field/value pairs
    Csv,
    /// The headline number only
    Minimal,
}

pub fn format_output(format: OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}
