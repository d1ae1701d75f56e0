use anyhow::{anyhow, Result};
use connection::{SessionId, SessionIdGenerator};
use serde_json::{json, Value};
use std::path::Path;

use super::load_config;
use crate::utils::output::{print_field, print_header, print_json, OutputFormat};

/// Print a fresh session id, chained onto `upstream` when it is well-formed
pub async fn generate(config_dir: &Path, upstream: Option<&str>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_dir).await?;
    let id = SessionIdGenerator::from_config(&config).new_id(upstream);

    match format {
        OutputFormat::Json => print_json(&describe(&id))?,
        // Bare id so scripts can capture it
        OutputFormat::Text => println!("{}", id),
    }
    Ok(())
}

/// Print the components of a session id
pub fn parse(text: &str, format: OutputFormat) -> Result<()> {
    let id = SessionId::parse(text).map_err(|e| anyhow!("Invalid session id: {}", e))?;

    match format {
        OutputFormat::Json => print_json(&describe(&id))?,
        OutputFormat::Text => {
            print_header("Session ID");
            print_field("session id", Some(&id.to_string()));
            print_field("host", Some(id.host_component()));
            print_field("pid", Some(&id.pid_component().to_string()));
            print_field("timestamp", Some(&id.timestamp_component().to_string()));
            print_field("sequence", Some(&id.sequence_component().to_string()));
            print_field("upstream", id.inherited_prefix());
        }
    }
    Ok(())
}

fn describe(id: &SessionId) -> Value {
    json!({
        "session_id": id.to_string(),
        "host": id.host_component(),
        "pid": id.pid_component(),
        "timestamp": id.timestamp_component(),
        "sequence": id.sequence_component(),
        "upstream": id.inherited_prefix(),
    })
}
