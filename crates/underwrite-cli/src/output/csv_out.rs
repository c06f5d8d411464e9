use serde_json::{Map, Value};
use std::io::{self, Write};

use super::format_value;

/// Write output as CSV to stdout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());
    write_csv(&mut wtr, value);
    let _ = wtr.flush();
}

/// Pick the most useful table in the result: cash-flow rows for an
/// underwriting run, the schedule for a mortgage, the grid for a sensitivity
/// run, scenario rows for a comparison. Anything else is written as
/// field/value pairs.
fn write_csv<W: Write>(wtr: &mut csv::Writer<W>, value: &Value) {
    let result = value.get("result").unwrap_or(value);

    match result {
        Value::Object(map) => {
            if let Some(Value::Array(rows)) = map.get("cashflows") {
                write_array_csv(wtr, rows);
            } else if let Some(Value::Array(rows)) = map.get("schedule") {
                write_array_csv(wtr, rows);
            } else if let Some(Value::Array(matrix)) = map.get("matrix") {
                write_matrix_csv(wtr, map, matrix);
            } else if let Some(Value::Array(rows)) = map.get("results") {
                write_array_csv(wtr, rows);
            } else {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in map {
                    let _ = wtr.write_record([key.as_str(), &format_value(val)]);
                }
            }
        }
        Value::Array(arr) => write_array_csv(wtr, arr),
        _ => {
            let _ = wtr.write_record([&format_value(result)]);
        }
    }
}

fn write_array_csv<W: Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            let _ = wtr.write_record([&format_value(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);

    for item in arr {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(format_value).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&row);
        }
    }
}

/// Long format: one line per grid cell.
fn write_matrix_csv<W: Write>(wtr: &mut csv::Writer<W>, result: &Map<String, Value>, matrix: &[Value]) {
    let name = |k: &str| result.get(k).and_then(Value::as_str).unwrap_or(k).to_string();
    let values = |k: &str| {
        result
            .get(k)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };
    let metric = result
        .get("output_metric")
        .and_then(Value::as_str)
        .unwrap_or("value")
        .to_string();

    let _ = wtr.write_record([name("variable_1_name"), name("variable_2_name"), metric]);

    let rows = values("variable_1_values");
    let cols = values("variable_2_values");
    for (i, row) in matrix.iter().enumerate() {
        let Value::Array(cells) = row else { continue };
        for (j, cell) in cells.iter().enumerate() {
            let _ = wtr.write_record([
                rows.get(i).map(format_value).unwrap_or_default(),
                cols.get(j).map(format_value).unwrap_or_default(),
                format_value(cell),
            ]);
        }
    }
}
