use anyhow::Result;
use clap::ValueEnum;
use colored::*;
use serde_json::Value;

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_header(title: &str) {
    println!("{}", format!("=== {} ===", title).bold());
    println!();
}

/// One `key: value` line, with a placeholder for missing values.
pub fn print_field(key: &str, value: Option<&str>) {
    match value {
        Some(value) => println!("  {}: {}", key.cyan(), value),
        None => println!("  {}: {}", key.cyan(), "(none)".dimmed()),
    }
}
