use serde_json::Value;

/// Headline fields, most specific first. Nested objects one level down are
/// searched too, so `impact.return_impact` is found for stress results.
const PRIORITY_KEYS: [&str; 14] = [
    "var",
    "return_impact",
    "total_effect",
    "p_value",
    "alpha_annualized",
    "information_ratio",
    "sharpe_ratio",
    "volatility",
    "total_return",
    "r_squared",
    "forecasts",
    "predictions",
    "scenarios",
    "overall_risk",
];

/// Print just the headline answer of a computation.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);
    println!("{}", headline(result));
}

fn headline(result: &Value) -> String {
    let Value::Object(map) = result else {
        return format_minimal(result);
    };
    for key in PRIORITY_KEYS {
        if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
            return format_minimal(val);
        }
    }
    for key in PRIORITY_KEYS {
        let nested = map
            .values()
            .filter_map(Value::as_object)
            .find_map(|inner| inner.get(key).filter(|v| !v.is_null()));
        if let Some(val) = nested {
            return format_minimal(val);
        }
    }
    match map.iter().next() {
        Some((key, val)) => format!("{key}: {}", format_minimal(val)),
        None => String::new(),
    }
}

/// Forecast-like arrays collapse to their point values.
fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item.get("value").or_else(|| item.get("scenario")) {
                Some(v) => format_minimal(v),
                None => format_minimal(item),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_var_headline() {
        let v = json!({"var95": 0.02, "var": 0.031, "mean": 0.0});
        assert_eq!(headline(&v), "0.031");
    }

    #[test]
    fn test_nested_stress_impact() {
        let v = json!({"scenario": "x", "impact": {"return_impact": -0.12}});
        assert_eq!(headline(&v), "-0.12");
    }

    #[test]
    fn test_forecasts_collapse_to_values() {
        let v = json!({"forecasts": [
            {"step": 1, "value": 1.5, "lower": 1.0, "upper": 2.0},
            {"step": 2, "value": 1.75, "lower": 1.0, "upper": 2.5}
        ]});
        assert_eq!(headline(&v), "1.5,1.75");
    }
}
