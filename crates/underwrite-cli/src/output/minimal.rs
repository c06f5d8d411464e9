use serde_json::Value;

use super::format_value;

/// Headline fields in priority order: underwriting IRR, mortgage payment,
/// sensitivity base case, weighted scenario value.
const PRIORITY_KEYS: [&str; 4] = [
    "irr",
    "monthly_payment",
    "base_case_value",
    "probability_weighted_value",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    println!("{}", headline(value));
}

fn headline(value: &Value) -> String {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let Value::Object(map) = result_obj else {
        return format_value(result_obj);
    };

    for key in &PRIORITY_KEYS {
        if let Some(val) = map.get(*key) {
            let rendered = format_value(val);
            if !rendered.is_empty() {
                return rendered;
            }
        }
    }

    match map.iter().next() {
        Some((key, val)) => format!("{}: {}", key, format_value(val)),
        None => String::new(),
    }
}
