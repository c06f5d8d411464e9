use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Read a piped request document from stdin.
///
/// `None` when stdin is a terminal or nothing was piped. Documents starting
/// with `{` are parsed as JSON, anything else as YAML.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_document(&buffer)
}

fn parse_document<T: DeserializeOwned>(raw: &str) -> Result<Option<T>, Box<dyn std::error::Error>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value = if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).map_err(|e| format!("Failed to parse stdin as JSON: {e}"))?
    } else {
        serde_yaml::from_str(trimmed).map_err(|e| format!("Failed to parse stdin as YAML: {e}"))?
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_empty_input_is_none() {
        assert!(parse_document::<Value>("  \n").unwrap().is_none());
    }

    #[test]
    fn test_json_and_yaml_documents() {
        let json: Value = parse_document(r#"{"price": 200000}"#).unwrap().unwrap();
        assert_eq!(json["price"], 200000);

        let yaml: Value = parse_document("price: 200000\nexit_year: 10\n").unwrap().unwrap();
        assert_eq!(yaml["exit_year"], 10);
    }

    #[test]
    fn test_malformed_json_reports_source() {
        let err = parse_document::<Value>("{ not json").unwrap_err();
        assert!(err.to_string().contains("stdin as JSON"));
    }
}
