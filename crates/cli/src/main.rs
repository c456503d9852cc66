// nfaudit - reconcile NF-e/CT-e tax documents against the ledger spreadsheet

mod audit;
mod config;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nfaudit_io::IoError;
use nfaudit_recon::AuditError;

use exit_codes::{audit_exit_code, io_exit_code, EXIT_ERROR, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "nfaudit")]
#[command(about = "Audit NF-e/CT-e tax documents against the ledger spreadsheet")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug); RUST_LOG wins when set
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a document set against the ledger (exit 0 = every row OK, 60 = mismatches)
    #[command(after_help = "\
Examples:
  nfaudit run --ledger controle.xlsx --docs ./OUT --output Relatorio_OUT.xlsx
  nfaudit run --ledger controle.xlsx --zip OUT.zip --period OUT
  nfaudit run --ledger controle.xlsx --docs ./OUT --entity EMPRESA_A --json
  nfaudit run --ledger controle.xlsx --docs ./OUT --config audit.toml --json-output out.json")]
    Run(audit::RunArgs),

    /// Parse tax documents and print the extracted records as JSON
    #[command(after_help = "\
Examples:
  nfaudit parse nfe_100.xml cte_7001.xml")]
    Parse {
        /// NF-e or CT-e files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Load the ledger workbook and print its rows as JSON
    #[command(after_help = "\
Examples:
  nfaudit ledger controle.xlsx
  nfaudit ledger controle.xlsx --year 25 --periods OUT,NOV")]
    Ledger {
        /// Ledger workbook (xlsx, xls, xlsb, ods) or CSV export
        file: PathBuf,

        /// Year token a sheet name must contain
        #[arg(long)]
        year: Option<String>,

        /// Period tokens, comma-separated; a sheet name must contain one
        #[arg(long, value_delimiter = ',')]
        periods: Vec<String>,
    },

    /// Validate or print audit configs
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  nfaudit-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Library crates log through `log`; the subscriber bridges those records.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => audit::cmd_run(args),
        Commands::Parse { files } => audit::cmd_parse(files),
        Commands::Ledger { file, year, periods } => audit::cmd_ledger(file, year, periods),
        Commands::Config(cmd) => config::cmd_config(cmd),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    /// Create error from an engine error with its registry exit code.
    pub fn audit(err: AuditError) -> Self {
        let code = audit_exit_code(&err);
        let hint = match &err {
            AuditError::NoLedgerData => {
                Some("sheet names must contain the year token and one period token (see --year/--periods)".to_string())
            }
            AuditError::NoDataForPeriod(_) => {
                Some("the period is matched against ledger sheet names; run `nfaudit ledger` to list them".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        Self::new(io_exit_code(&err), err.to_string())
    }
}
