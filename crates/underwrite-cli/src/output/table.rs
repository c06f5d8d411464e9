use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::format_value;

/// Result keys rendered as their own table rather than a field row.
const TABULAR_KEYS: [&str; 4] = ["cashflows", "schedule", "matrix", "results"];

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_flat_object(map);
            }
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    let Value::Object(res_map) = result else {
        print_flat_object(envelope);
        return;
    };

    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in res_map {
        if TABULAR_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Value::Object(inner) = val {
            // Nested sections (summary, base headline) flatten to dotted rows
            if !inner.contains_key("status") {
                for (sub_key, sub_val) in inner {
                    builder.push_record([format!("{key}.{sub_key}"), format_value(sub_val)]);
                }
                continue;
            }
        }
        builder.push_record([key.clone(), format_value(val)]);
    }
    println!("{}", Table::from(builder));

    if let Some(Value::Array(rows)) = res_map.get("cashflows") {
        println!("\nCash flows:");
        print_array_table(rows);
    }
    if let Some(Value::Array(rows)) = res_map.get("schedule") {
        println!("\nAmortisation schedule:");
        print_array_table(rows);
    }
    if let Some(Value::Array(matrix)) = res_map.get("matrix") {
        println!();
        print_matrix(res_map, matrix);
    }
    if let Some(Value::Array(rows)) = res_map.get("results") {
        println!("\nScenarios:");
        print_scenarios(rows);
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Sensitivity grid: variable_1 down the side, variable_2 across the top.
fn print_matrix(result: &Map<String, Value>, matrix: &[Value]) {
    let name_1 = result
        .get("variable_1_name")
        .and_then(Value::as_str)
        .unwrap_or("var1");
    let name_2 = result
        .get("variable_2_name")
        .and_then(Value::as_str)
        .unwrap_or("var2");
    let empty = Vec::new();
    let row_values = result
        .get("variable_1_values")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let col_values = result
        .get("variable_2_values")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let mut builder = Builder::default();
    let mut header = vec![format!("{name_1} \\ {name_2}")];
    header.extend(col_values.iter().map(format_value));
    builder.push_record(header);

    for (i, row) in matrix.iter().enumerate() {
        let mut record = vec![row_values.get(i).map(format_value).unwrap_or_default()];
        if let Value::Array(cells) = row {
            record.extend(cells.iter().map(|c| match c {
                Value::Null => "-".to_string(),
                other => format_value(other),
            }));
        }
        builder.push_record(record);
    }
    println!("{}", Table::from(builder));
}

fn print_scenarios(rows: &[Value]) {
    let mut builder = Builder::default();
    builder.push_record(["Scenario", "Probability", "Value", "Deviation", "Deviation %"]);
    for row in rows {
        let field = |k: &str| row.get(k).map(format_value).unwrap_or_default();
        builder.push_record([
            field("name"),
            field("probability"),
            field("output_value"),
            field("deviation_from_base"),
            field("deviation_pct"),
        ]);
    }
    println!("{}", Table::from(builder));
}

fn print_flat_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}
