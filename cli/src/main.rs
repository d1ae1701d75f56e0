use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod utils;

use commands::{authorize, canon, config, session};
use utils::env_paths;
use utils::output::OutputFormat;

/// Mailgate CLI - Inspect login canonicalization, proxy authorization and session ids
#[derive(Parser)]
#[command(name = "mailgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration directory
    #[arg(
        short,
        long,
        global = true,
        env = "MAILGATE_CONFIG",
        default_value = "./config"
    )]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Canonicalize a login name
    Canon {
        /// Login as sent by the client
        login: String,

        /// Client address, used to derive a virtual domain
        #[arg(long)]
        ip: Option<IpAddr>,
    },

    /// Decide whether an authenticated identity may act as another
    Authorize {
        /// Login that authenticated
        auth: String,

        /// Login to act as
        requested: String,

        /// Negotiated security strength factor
        #[arg(long, default_value_t = 0)]
        ssf: u32,

        /// Client address, used to derive a virtual domain
        #[arg(long)]
        ip: Option<IpAddr>,

        /// Ignore the proxy_servers class
        #[arg(long)]
        no_proxy_servers: bool,
    },

    /// Generate a session id for this host
    SessionId {
        /// Session id passed along by an upstream server
        #[arg(long)]
        upstream: Option<String>,
    },

    /// Split a session id into its components
    ParseSessionId {
        /// Session id, optionally wrapped as SESSIONID=<...>
        text: String,
    },

    /// Configuration inspection commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective gate configuration
    Show,

    /// Read a single option (e.g., "sasl.minimum_layer")
    Get {
        /// Option path
        option: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_paths::load_dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    let log_dir = env_paths::log_dir();
    let _guard = match gate::init_logging(log_dir.as_deref(), log_level) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} logging unavailable: {}", "Warning:".yellow().bold(), e);
            None
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_dir = env_paths::resolve(&cli.config)?;
    let format = cli.format;

    match cli.command {
        Commands::Canon { login, ip } => {
            canon::execute(&config_dir, &login, ip, format).await?;
        }
        Commands::Authorize {
            auth,
            requested,
            ssf,
            ip,
            no_proxy_servers,
        } => {
            let request = authorize::Request {
                auth,
                requested,
                ssf,
                ip,
                no_proxy_servers,
            };
            if !authorize::execute(&config_dir, request, format).await? {
                // Evaluated and denied, distinct from a usage or config error
                return Ok(ExitCode::from(2));
            }
        }
        Commands::SessionId { upstream } => {
            session::generate(&config_dir, upstream.as_deref(), format).await?;
        }
        Commands::ParseSessionId { text } => {
            session::parse(&text, format)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                config::show(&config_dir, format).await?;
            }
            ConfigAction::Get { option } => {
                config::get(&config_dir, &option, format).await?;
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
