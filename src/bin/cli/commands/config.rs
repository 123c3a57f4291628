//! Config command handlers for the signup CLI

use std::path::PathBuf;
use std::process::ExitCode;
use tenant_provisioning::{ClientConfig, ClientError, ClientResult};

use crate::ConfigCommands;

pub fn handle_config_command(cmd: ConfigCommands, config: &ClientConfig) -> ClientResult<ExitCode> {
    match cmd {
        ConfigCommands::Show => {
            let mut shown = config.clone();
            if shown.signup.csrf_token.is_some() {
                shown.signup.csrf_token = Some("[MASKED]".to_string());
            }
            let rendered = toml::to_string_pretty(&shown).map_err(|e| {
                ClientError::config_error(format!("Failed to serialize config: {}", e))
            })?;
            println!("{}", rendered);
        }
        ConfigCommands::Init { output } => {
            let path = match output {
                Some(path) => PathBuf::from(path),
                None => ClientConfig::default_config_path()?,
            };
            config.save_to_file(&path)?;
            println!("✓ Configuration written to {}", path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}
