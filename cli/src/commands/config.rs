use anyhow::{anyhow, Result};
use colored::*;
use std::path::Path;

use super::load_config;
use crate::utils::output::{print_header, OutputFormat};

/// Show the effective gate configuration
pub async fn show(config_dir: &Path, format: OutputFormat) -> Result<()> {
    let config = load_config(config_dir).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Text => {
            print_header("Gate Configuration");
            println!("{}: {}", "Directory".bold(), config_dir.display().to_string().cyan());
            println!();
            let value = serde_yaml::to_value(&config)?;
            print_yaml_value(&value, 0);
            println!();
            println!(
                "{}",
                format!("Access classes: {}", config.access_classes.len()).green()
            );
        }
    }

    Ok(())
}

/// Get a single configuration option
pub async fn get(config_dir: &Path, option: &str, format: OutputFormat) -> Result<()> {
    let config = load_config(config_dir).await?;
    let value = config
        .lookup(option)
        .ok_or_else(|| anyhow!("Configuration option '{}' not found", option))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            print_config_value(option, &value);
        }
    }

    Ok(())
}

/// Print a specific configuration value
fn print_config_value(path: &str, value: &serde_yaml::Value) {
    println!("{}", "=== Configuration Value ===".bold());
    println!();
    println!("{}: {}", "Path".bold(), path.cyan());
    println!("{}: {}", "Type".bold(), value_type_name(value).yellow());
    println!();
    println!("{}:", "Value".bold());
    print_yaml_value(value, 0);
}

/// Get a human-readable name for a YAML value type
fn value_type_name(value: &serde_yaml::Value) -> &str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "boolean",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "array",
        serde_yaml::Value::Mapping(_) => "object",
        serde_yaml::Value::Tagged(_) => "tagged",
    }
}

/// Recursively print a YAML value with indentation
fn print_yaml_value(value: &serde_yaml::Value, indent_level: usize) {
    let indent = "  ".repeat(indent_level);

    match value {
        serde_yaml::Value::Null => {
            println!("{}null", indent);
        }
        serde_yaml::Value::Bool(b) => {
            println!("{}{}", indent, b.to_string().blue());
        }
        serde_yaml::Value::Number(n) => {
            println!("{}{}", indent, n.to_string().magenta());
        }
        serde_yaml::Value::String(s) => {
            // Networks and paths stand out from plain names
            if s.contains('/') || s.contains('\\') {
                println!("{}{}", indent, s.green());
            } else {
                println!("{}{}", indent, s.yellow());
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            for item in seq {
                println!("{}- ", indent);
                print_yaml_value(item, indent_level + 1);
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for (key, val) in map {
                if let serde_yaml::Value::String(key_str) = key {
                    print!("{}{}: ", indent, key_str.cyan());

                    // Print simple values on the same line
                    match val {
                        serde_yaml::Value::Null
                        | serde_yaml::Value::Bool(_)
                        | serde_yaml::Value::Number(_)
                        | serde_yaml::Value::String(_) => {
                            print_yaml_value(val, 0);
                        }
                        _ => {
                            println!();
                            print_yaml_value(val, indent_level + 1);
                        }
                    }
                } else {
                    println!("{}{:?}:", indent, key);
                    print_yaml_value(val, indent_level + 1);
                }
            }
        }
        serde_yaml::Value::Tagged(tagged) => {
            println!("{}!{} ", indent, tagged.tag);
            print_yaml_value(&tagged.value, indent_level + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_name() {
        assert_eq!(value_type_name(&serde_yaml::Value::Null), "null");
        assert_eq!(value_type_name(&serde_yaml::Value::Bool(true)), "boolean");
        assert_eq!(
            value_type_name(&serde_yaml::Value::Number(42.into())),
            "number"
        );
        assert_eq!(
            value_type_name(&serde_yaml::Value::String("test".to_string())),
            "string"
        );
        assert_eq!(
            value_type_name(&serde_yaml::Value::Sequence(vec![])),
            "array"
        );
        assert_eq!(
            value_type_name(&serde_yaml::Value::Mapping(serde_yaml::Mapping::new())),
            "object"
        );
    }

    #[tokio::test]
    async fn test_get_missing_option() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let err = get(temp_dir.path(), "sasl.no_such_option", OutputFormat::Text)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
