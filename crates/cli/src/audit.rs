//! `nfaudit run`, `nfaudit parse`, `nfaudit ledger`.

use std::path::{Path, PathBuf};

use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;

use nfaudit_io::{
    collect_documents, collect_zip_documents, discover_entities, load_documents, load_ledger,
    parse_document_file, write_json, write_xlsx, DocumentSource,
};
use nfaudit_recon::model::{AuditInput, AuditReport, TaxDocumentRecord};
use nfaudit_recon::{run, AuditConfig, LedgerSelection};

use crate::exit_codes::{EXIT_AUDIT_INVALID_CONFIG, EXIT_AUDIT_MISMATCH, EXIT_AUDIT_NO_LEDGER_DATA};
use crate::CliError;

#[derive(Args)]
pub struct RunArgs {
    /// Ledger workbook (xlsx, xls, xlsb, ods) or CSV export
    #[arg(long)]
    pub ledger: PathBuf,

    /// Folder holding one subfolder of documents per entity
    #[arg(long, required_unless_present = "zip", conflicts_with = "zip")]
    pub docs: Option<PathBuf>,

    /// Zip archive of per-entity folders
    #[arg(long)]
    pub zip: Option<PathBuf>,

    /// Only audit this entity (folder name, repeatable)
    #[arg(long = "entity")]
    pub entities: Vec<String>,

    /// Audit config (TOML); flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only reconcile ledger sheets whose name contains this token
    #[arg(long)]
    pub period: Option<String>,

    /// Year token a ledger sheet name must contain
    #[arg(long)]
    pub year: Option<String>,

    /// Period tokens, comma-separated; a ledger sheet name must contain one
    #[arg(long, value_delimiter = ',')]
    pub periods: Vec<String>,

    /// Net value tolerance for CT-e documents
    #[arg(long)]
    pub freight_tolerance: Option<Decimal>,

    /// Net value tolerance for NF-e documents
    #[arg(long)]
    pub goods_tolerance: Option<Decimal>,

    /// Volume tolerance
    #[arg(long)]
    pub volume_tolerance: Option<Decimal>,

    /// Add a PARSE_ERROR row per unreadable document
    #[arg(long)]
    pub surface_parse_errors: bool,

    /// Write the styled reconciliation workbook here
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Print the JSON report to stdout
    #[arg(long)]
    pub json: bool,

    /// Write the JSON report to this file
    #[arg(long)]
    pub json_output: Option<PathBuf>,
}

fn invalid_config(msg: impl Into<String>) -> CliError {
    CliError::new(EXIT_AUDIT_INVALID_CONFIG, msg)
}

/// Apply `--year`/`--periods` to a sheet selection.
fn override_selection(selection: &mut LedgerSelection, year: Option<String>, periods: Vec<String>) {
    if let Some(year) = year {
        selection.target_year = year;
    }
    if !periods.is_empty() {
        selection.target_periods = periods;
    }
}

fn resolve_config(args: &mut RunArgs) -> Result<AuditConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
            AuditConfig::from_toml(&text).map_err(CliError::audit)?
        }
        None => AuditConfig::default(),
    };

    if args.period.is_some() {
        config.period_filter = args.period.take();
    }
    override_selection(&mut config.ledger, args.year.take(), std::mem::take(&mut args.periods));
    if let Some(t) = args.freight_tolerance {
        config.tolerance.freight = t;
    }
    if let Some(t) = args.goods_tolerance {
        config.tolerance.goods = t;
    }
    if let Some(t) = args.volume_tolerance {
        config.tolerance.volume = t;
    }
    if args.surface_parse_errors {
        config.surface_parse_errors = true;
    }

    config
        .validate()
        .map_err(|e| invalid_config(e.to_string()))?;
    Ok(config)
}

/// Keep only the requested entities. Every requested name must exist.
fn select_entities(
    sources: Vec<DocumentSource>,
    wanted: &[String],
) -> Result<Vec<DocumentSource>, CliError> {
    if wanted.is_empty() {
        return Ok(sources);
    }
    for name in wanted {
        if !sources.iter().any(|s| s.entity.eq_ignore_ascii_case(name)) {
            return Err(CliError::args(format!("no documents found for entity '{name}'")));
        }
    }
    Ok(sources
        .into_iter()
        .filter(|s| wanted.iter().any(|w| s.entity.eq_ignore_ascii_case(w)))
        .collect())
}

fn gather_sources(args: &RunArgs) -> Result<Vec<DocumentSource>, CliError> {
    let sources = match (&args.docs, &args.zip) {
        (Some(dir), _) => {
            if !dir.is_dir() {
                return Err(CliError::io(format!("not a directory: {}", dir.display())));
            }
            let entities = discover_entities(dir)?;
            collect_documents(&entities)?
        }
        (None, Some(zip)) => collect_zip_documents(zip)?,
        (None, None) => return Err(CliError::args("either --docs or --zip is required")),
    };
    select_entities(sources, &args.entities)
}

fn print_summary(report: &AuditReport) {
    let s = &report.summary;
    eprintln!(
        "audit '{}': {} rows: {} ok, {} value errors, {} volume errors, {} missing documents, {} missing ledger entries",
        report.meta.config_name,
        s.total_rows,
        s.matched,
        s.value_errors,
        s.volume_errors,
        s.missing_documents,
        s.missing_ledger_entries,
    );
    eprintln!(
        "documents: {} parsed, {} unreadable, {} without note number; {} duplicated ledger rows",
        s.documents_parsed, s.parse_failures, s.unnumbered_documents, s.duplicate_ledger_rows,
    );
}

pub fn cmd_run(mut args: RunArgs) -> Result<(), CliError> {
    let config = resolve_config(&mut args)?;

    if !args.ledger.is_file() {
        return Err(CliError::io(format!("ledger not found: {}", args.ledger.display())));
    }

    let sources = gather_sources(&args)?;
    let docs = load_documents(&sources);
    let ledger = load_ledger(&args.ledger, &config.ledger)?;

    let input = AuditInput {
        documents: docs.documents,
        parse_failures: docs.failures,
        ledger: ledger.records,
    };
    let report = run(&config, &input).map_err(CliError::audit)?;

    if let Some(ref path) = args.output {
        write_xlsx(&report, path)?;
        eprintln!("wrote {}", path.display());
    }
    if let Some(ref path) = args.json_output {
        write_json(&report, path)?;
        eprintln!("wrote {}", path.display());
    }
    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json}");
    }

    print_summary(&report);

    if !report.summary.is_clean() {
        let unmatched = report.summary.total_rows - report.summary.matched;
        return Err(CliError::new(
            EXIT_AUDIT_MISMATCH,
            format!("{unmatched} of {} rows not matched", report.summary.total_rows),
        ));
    }
    Ok(())
}

#[derive(Serialize)]
struct ParsedFile {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<TaxDocumentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn file_label(path: &Path) -> (String, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let entity = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (entity, name)
}

pub fn cmd_parse(files: Vec<PathBuf>) -> Result<(), CliError> {
    let mut out = Vec::with_capacity(files.len());
    let mut failed = 0;
    for path in &files {
        let (entity, name) = file_label(path);
        match parse_document_file(path) {
            Ok(record) => out.push(ParsedFile {
                file: path.display().to_string(),
                record: Some(record.with_source(entity, name)),
                error: None,
            }),
            Err(e) => {
                failed += 1;
                out.push(ParsedFile {
                    file: path.display().to_string(),
                    record: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let json = serde_json::to_string_pretty(&out)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
    println!("{json}");

    if failed > 0 {
        return Err(CliError::general(format!("{failed} of {} documents could not be parsed", files.len())));
    }
    Ok(())
}

pub fn cmd_ledger(file: PathBuf, year: Option<String>, periods: Vec<String>) -> Result<(), CliError> {
    let mut selection = LedgerSelection::default();
    override_selection(&mut selection, year, periods);

    let load = load_ledger(&file, &selection)?;
    let json = serde_json::to_string_pretty(&load)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
    println!("{json}");

    if load.records.is_empty() {
        return Err(CliError::new(EXIT_AUDIT_NO_LEDGER_DATA, "no ledger rows loaded")
            .with_hint("check the sheet outcomes above; sheet names must contain the year and a period token"));
    }
    eprintln!("{} rows from {} sheets", load.records.len(), load.sheets.len());
    Ok(())
}
