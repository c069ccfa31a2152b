use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data_value) = data {
                response["data"] = data_value;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(data_value) = data {
                print_text(&data_value, 1);
            }
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Indented `key: value` listing for text output.
fn print_text(value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        println!("{}{}:", indent, key);
                        print_text(item, depth + 1);
                    }
                    _ => println!("{}{}: {}", indent, key, scalar(item)),
                }
            }
        }
        Value::Array(items) => {
            if items.is_empty() {
                println!("{}(none)", indent);
            }
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        println!("{}[{}]", indent, i);
                        print_text(item, depth + 1);
                    }
                    _ => println!("{}- {}", indent, scalar(item)),
                }
            }
        }
        other => println!("{}{}", indent, scalar(other)),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// Parse `30,40,20,10` into an A/B/C/D distribution object.
pub fn parse_distribution(raw: &str) -> anyhow::Result<Value> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| anyhow::anyhow!("distribution must be four numbers, e.g. 30,40,20,10"))?;

    match parts.as_slice() {
        [a, b, c, d] => Ok(json!({ "A": a, "B": b, "C": c, "D": d })),
        _ => Err(anyhow::anyhow!("distribution must have exactly four values (A,B,C,D)")),
    }
}

/// Read a line from stdin after printing a prompt.
pub fn prompt(label: &str) -> anyhow::Result<String> {
    use std::io::Write;

    eprint!("{}: ", label);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_distribution() {
        let dist = parse_distribution("30, 40, 20, 10").unwrap();
        assert_eq!(dist["B"], json!(40.0));
        assert!(parse_distribution("30,40").is_err());
        assert!(parse_distribution("a,b,c,d").is_err());
    }
}
