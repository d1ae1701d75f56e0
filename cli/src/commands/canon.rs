use anyhow::{anyhow, Result};
use colored::*;
use gate::Gate;
use serde_json::json;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use super::load_config;
use crate::utils::output::{print_field, print_header, print_json, OutputFormat};

/// Canonicalize one login and print the result
pub async fn execute(
    config_dir: &Path,
    login: &str,
    ip: Option<IpAddr>,
    format: OutputFormat,
) -> Result<()> {
    let gate = Gate::new(Arc::new(load_config(config_dir).await?));
    let identity = gate
        .canonicalizer()
        .canonicalize(login.as_bytes(), ip)
        .map_err(|e| anyhow!("Cannot canonicalize '{}': {}", login, e))?;
    let canonical = gate.canonicalizer().canonical_text(&identity);

    match format {
        OutputFormat::Json => print_json(&json!({
            "raw": identity.raw(),
            "canonical": canonical,
            "local_part": identity.local_part(),
            "domain": identity.domain(),
            "anonymous": identity.is_anonymous(),
        }))?,
        OutputFormat::Text => {
            print_header("Canonical Identity");
            println!("  {}: {}", "canonical".cyan(), canonical.green().bold());
            print_field("raw", Some(identity.raw()));
            print_field("local part", Some(identity.local_part()));
            print_field("domain", identity.domain());
            if identity.is_anonymous() {
                println!("  {}", "anonymous principal".yellow());
            }
        }
    }

    Ok(())
}
