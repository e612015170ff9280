use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Scalar fields print as a Field/Value table; arrays of objects such as
/// forecasts, segments or loadings get a table of their own.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(result) => print_envelope(result, map),
            None => print_object(map),
        },
        Value::Array(rows) => print_rows(rows),
        other => println!("{other}"),
    }
}

fn print_envelope(result: &Value, envelope: &Map<String, Value>) {
    if let Some(Value::String(method)) = envelope.get("methodology") {
        println!("{method}");
    }
    match result {
        Value::Object(map) => print_object(map),
        Value::Array(rows) => print_rows(rows),
        other => println!("{other}"),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {w}");
            }
        }
    }
    if let Some(us) = envelope
        .get("metadata")
        .and_then(|m| m.get("computation_time_us"))
        .and_then(Value::as_u64)
    {
        println!("\nComputed in {us} us");
    }
}

fn print_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    let mut sections = Vec::new();
    for (key, val) in map {
        if is_row_array(val) {
            sections.push((key, val));
        } else {
            builder.push_record([key.clone(), format_value(val)]);
        }
    }
    println!("{}", Table::from(builder));

    for (key, val) in sections {
        if let Value::Array(rows) = val {
            println!("\n{key}:");
            print_rows(rows);
        }
    }
}

fn print_rows(rows: &[Value]) {
    match build_rows(rows) {
        Some(table) => println!("{table}"),
        None if rows.is_empty() => println!("(empty)"),
        None => {
            for item in rows {
                println!("{}", format_value(item));
            }
        }
    }
}

fn build_rows(rows: &[Value]) -> Option<Table> {
    let Some(Value::Object(first)) = rows.first() else {
        return None;
    };
    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for row in rows.iter().filter_map(Value::as_object) {
        builder.push_record(
            headers
                .iter()
                .map(|h| row.get(h).map(format_value).unwrap_or_default()),
        );
    }
    Some(Table::from(builder))
}

fn is_row_array(value: &Value) -> bool {
    matches!(value, Value::Array(items) if items.first().is_some_and(Value::is_object))
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(items) if items.len() > 8 => {
            let head: Vec<String> = items.iter().take(8).map(format_value).collect();
            format!("{}, ... ({} values)", head.join(", "), items.len())
        }
        Value::Array(items) => items.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_long_arrays_are_abbreviated() {
        let v = json!([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(format_value(&v), "1, 2, 3, 4, 5, 6, 7, 8, ... (10 values)");
    }

    #[test]
    fn test_row_arrays_detected() {
        assert!(is_row_array(&json!([{"step": 1}])));
        assert!(!is_row_array(&json!([1.0, 2.0])));
        assert!(!is_row_array(&json!([])));
    }

    #[test]
    fn test_row_table_has_all_rows() {
        let rows = json!([{"step": 1, "value": 2.0}, {"step": 2, "value": 3.0}]);
        let table = build_rows(rows.as_array().unwrap()).unwrap().to_string();
        assert!(table.contains("step"));
        assert!(table.contains('3'));
    }
}
