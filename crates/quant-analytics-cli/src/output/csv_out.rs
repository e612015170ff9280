use serde_json::{Map, Value};
use std::io::{self, Write};

/// Write a result as CSV.
///
/// A result holding `forecasts`, `segments` or another array of objects is
/// written one row per element; anything else flattens to `field,value`
/// pairs with dotted keys for nested objects.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    if let Err(e) = write_csv(stdout.lock(), value) {
        eprintln!("CSV output error: {e}");
    }
}

const ROW_FIELDS: [&str; 6] = [
    "forecasts",
    "segments",
    "periods",
    "scenarios",
    "contributions",
    "loadings",
];

fn write_csv<W: Write>(out: W, value: &Value) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Array(rows) => write_rows(&mut wtr, rows)?,
        Value::Object(map) => match ROW_FIELDS
            .iter()
            .find_map(|f| map.get(*f).and_then(Value::as_array))
        {
            Some(rows) if rows.first().is_some_and(Value::is_object) => {
                write_rows(&mut wtr, rows)?
            }
            _ => {
                wtr.write_record(["field", "value"])?;
                let mut pairs = Vec::new();
                flatten("", map, &mut pairs);
                for (k, v) in pairs {
                    wtr.write_record([k, v])?;
                }
            }
        },
        other => wtr.write_record([format_csv_value(other)])?,
    }
    wtr.flush()?;
    Ok(())
}

fn write_rows<W: Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) -> csv::Result<()> {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            wtr.write_record([format_csv_value(item)])?;
        }
        return Ok(());
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    wtr.write_record(&headers)?;
    for row in rows.iter().filter_map(Value::as_object) {
        wtr.write_record(
            headers
                .iter()
                .map(|h| row.get(*h).map(format_csv_value).unwrap_or_default()),
        )?;
    }
    Ok(())
}

fn flatten(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match val {
            Value::Object(inner) => flatten(&name, inner, out),
            other => out.push((name, format_csv_value(other))),
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) if items.iter().all(|v| !v.is_object() && !v.is_array()) => items
            .iter()
            .map(format_csv_value)
            .collect::<Vec<_>>()
            .join(";"),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
