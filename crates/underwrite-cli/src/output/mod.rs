pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Render a JSON value for human output. Tagged ratios and IRR estimates
/// collapse to their figure.
pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Object(map) if map.contains_key("status") => {
            let status = map.get("status").and_then(Value::as_str).unwrap_or_default();
            match (map.get("value"), map.get("irr_pct")) {
                (Some(v), _) => format_value(v),
                (None, Some(Value::Null)) | (None, None) => "n/a".to_string(),
                (None, Some(irr)) if status == "converged" => format_value(irr),
                (None, Some(irr)) => format!("{} ({})", format_value(irr), status),
            }
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
