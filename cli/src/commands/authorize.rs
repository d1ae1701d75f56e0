use anyhow::{anyhow, Result};
use colored::*;
use gate::Gate;
use serde_json::json;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use super::load_config;
use crate::utils::output::{print_field, print_header, print_json, OutputFormat};

pub struct Request {
    pub auth: String,
    pub requested: String,
    pub ssf: u32,
    pub ip: Option<IpAddr>,
    pub no_proxy_servers: bool,
}

/// Evaluate one proxy request. Returns whether it was allowed.
pub async fn execute(config_dir: &Path, request: Request, format: OutputFormat) -> Result<bool> {
    let mut gate = Gate::new(Arc::new(load_config(config_dir).await?));
    if request.no_proxy_servers {
        gate = gate.without_proxy_servers();
    }

    let endpoints = request.ip.map(|ip| {
        (
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::new(ip, 0),
        )
    });
    let mut ctx = gate.open_connection(endpoints, None);
    ctx.set_negotiated_ssf(request.ssf);

    let decision = gate
        .authenticate(
            request.auth.as_bytes(),
            Some(request.requested.as_bytes()),
            &mut ctx,
        )
        .map_err(|e| anyhow!("Authorization could not be evaluated: {}", e))?;

    let acting_as = gate.canonicalizer().canonical_text(&decision.acting_as);
    match format {
        OutputFormat::Json => print_json(&json!({
            "allowed": decision.allowed,
            "acting_as": acting_as,
            "reason": decision.reason.as_str(),
            "auth_is_admin": decision.auth_is_admin,
            "auth_is_proxy_admin": decision.auth_is_proxy_admin,
            "session_id": ctx.session_id().to_string(),
        }))?,
        OutputFormat::Text => {
            print_header("Proxy Authorization");
            let verdict = if decision.allowed {
                "ALLOWED".green().bold()
            } else {
                "DENIED".red().bold()
            };
            println!("  {}: {}", "decision".cyan(), verdict);
            print_field("reason", Some(decision.reason.as_str()));
            print_field("acting as", Some(&acting_as));
            print_field("ssf", Some(&request.ssf.to_string()));
            if decision.auth_is_admin {
                println!("  {}", "authenticated identity is an admin".yellow());
            }
            if decision.auth_is_proxy_admin {
                println!("  {}", "authenticated identity is a proxy server".yellow());
            }
            print_field("session", Some(&ctx.session_id().to_string()));
        }
    }

    Ok(decision.allowed)
}
