//! # Signup CLI Tool
//!
//! Command-line interface for starting tenant provisioning jobs and following
//! their progress through the signup API.

mod cli;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tenant_provisioning::{logging, ClientConfig, ClientResult};
use tracing::info;

use cli::{handle_config_command, handle_creation_command};

#[derive(Parser, Debug)]
#[command(name = "signup-cli")]
#[command(about = "Command-line interface for tenant provisioning")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file path (default: ~/.tenant-signup/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (table or json)
    #[arg(long)]
    format: Option<String>,

    /// Anti-forgery token sent as X-CSRF-TOKEN
    #[arg(long)]
    csrf_token: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a provisioning job and watch it until it settles
    Start,
    /// Watch an already-started provisioning job
    Watch {
        /// Creation id returned by start-creation
        #[arg(value_name = "CREATION_ID")]
        creation_id: String,
    },
    /// Fetch the current status of a provisioning job once
    Status {
        #[arg(value_name = "CREATION_ID")]
        creation_id: String,
    },
    /// Fetch the final result of a completed provisioning job
    #[command(name = "result")]
    FetchResult {
        #[arg(value_name = "CREATION_ID")]
        creation_id: String,
    },
    /// List the provisioning steps in order
    Steps,
    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write the effective configuration to a file
    Init {
        /// Output path (default: ~/.tenant-signup/config.toml)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Table
        }
    }
}

#[tokio::main]
async fn main() -> ClientResult<ExitCode> {
    let cli = Cli::parse();

    // Before config loading so problems with the config file are visible
    logging::init_structured_logging(logging::level_for_verbosity(cli.verbose), cli.json_logs);

    let mut config = if let Some(config_path) = cli.config.as_deref() {
        ClientConfig::load_from_path(std::path::Path::new(config_path))?
    } else {
        ClientConfig::load()?
    };
    if let Some(token) = cli.csrf_token {
        config.signup.csrf_token = Some(token);
    }

    let format = OutputFormat::parse(cli.format.as_deref().unwrap_or(&config.cli.default_format));

    info!(
        base_url = %config.signup.base_url,
        poll_interval_ms = config.polling.interval_ms,
        "Signup CLI starting"
    );

    match cli.command {
        Commands::Config(config_cmd) => handle_config_command(config_cmd, &config),
        command => handle_creation_command(command, &config, format).await,
    }
}
