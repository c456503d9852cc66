//! `nfaudit config`: check or print audit config files.

use std::path::PathBuf;

use clap::Subcommand;

use nfaudit_recon::AuditConfig;

use crate::CliError;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate an audit config without running
    #[command(after_help = "\
Examples:
  nfaudit config validate audit.toml")]
    Validate {
        /// Path to the audit TOML file
        config: PathBuf,
    },

    /// Print the default config as TOML
    #[command(after_help = "\
Examples:
  nfaudit config defaults > audit.toml")]
    Defaults,
}

pub fn cmd_config(cmd: ConfigCommands) -> Result<(), CliError> {
    match cmd {
        ConfigCommands::Validate { config } => cmd_config_validate(config),
        ConfigCommands::Defaults => cmd_config_defaults(),
    }
}

fn cmd_config_validate(path: PathBuf) -> Result<(), CliError> {
    let text = std::fs::read_to_string(&path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    let config = AuditConfig::from_toml(&text).map_err(CliError::audit)?;

    eprintln!(
        "ok: '{}' (year {}, periods {}, tolerances freight {} / goods {} / volume {})",
        config.name,
        config.ledger.target_year,
        config.ledger.target_periods.join(","),
        config.tolerance.freight,
        config.tolerance.goods,
        config.tolerance.volume,
    );
    Ok(())
}

fn cmd_config_defaults() -> Result<(), CliError> {
    let text = AuditConfig::default().to_toml().map_err(CliError::audit)?;
    print!("{text}");
    Ok(())
}
