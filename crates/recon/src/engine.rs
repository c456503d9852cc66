use crate::aggregate::{aggregate_documents, aggregate_ledger, find_duplicates};
use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::evidence::compute_summary;
use crate::matcher::match_by_note;
use crate::model::{
    AuditInput, AuditMeta, AuditReport, LedgerRecord, ParseFailure, ReconciliationRow, RowStatus,
};

/// Run a reconciliation per config. Returns classified rows, warnings and
/// summary.
///
/// Fatal only when the ledger is empty or the period filter leaves nothing;
/// unreadable or unnumbered documents are reported, never thrown.
pub fn run(config: &AuditConfig, input: &AuditInput) -> Result<AuditReport, AuditError> {
    if input.ledger.is_empty() {
        return Err(AuditError::NoLedgerData);
    }

    let ledger = filter_period(&input.ledger, config.period_filter.as_deref())?;

    let duplicates = find_duplicates(&ledger);
    if !duplicates.is_empty() {
        log::warn!(
            "{} ledger rows share a note number with another row",
            duplicates.len()
        );
    }

    let unnumbered_documents: Vec<String> = input
        .documents
        .iter()
        .filter(|d| d.note_number.is_empty())
        .map(|d| d.source_file.clone())
        .collect();
    for file in &unnumbered_documents {
        log::warn!("{file}: no note number could be extracted; excluded");
    }
    for failure in &input.parse_failures {
        log::warn!("{}: unreadable document excluded ({})", failure.source_file, failure.reason);
    }

    let doc_aggs = aggregate_documents(&input.documents);
    let ledger_aggs = aggregate_ledger(&ledger);
    log::debug!(
        "{} document notes, {} ledger notes",
        doc_aggs.len(),
        ledger_aggs.len()
    );

    let mut matched = match_by_note(&ledger_aggs, &doc_aggs, &config.tolerance);

    if config.surface_parse_errors {
        matched
            .rows
            .extend(input.parse_failures.iter().map(parse_error_row));
    }

    let mut summary = compute_summary(&matched.rows);
    summary.documents_parsed = input.documents.len();
    summary.parse_failures = input.parse_failures.len();
    summary.unnumbered_documents = unnumbered_documents.len();
    summary.duplicate_ledger_rows = duplicates.len();

    log::info!(
        "audit '{}': {} rows, {} ok, {} missing documents, {} missing ledger entries",
        config.name,
        summary.total_rows,
        summary.matched,
        summary.missing_documents,
        summary.missing_ledger_entries,
    );

    Ok(AuditReport {
        meta: AuditMeta {
            config_name: config.name.clone(),
            period_filter: config.period_filter.clone(),
            freight_tolerance: config.tolerance.freight,
            goods_tolerance: config.tolerance.goods,
            volume_tolerance: config.tolerance.volume,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        rows: matched.rows,
        duplicates,
        missing_documents: matched.missing_documents,
        parse_failures: input.parse_failures.clone(),
        unnumbered_documents,
    })
}

/// Keep ledger rows whose period label contains `period` (case-insensitive).
pub fn filter_period(
    rows: &[LedgerRecord],
    period: Option<&str>,
) -> Result<Vec<LedgerRecord>, AuditError> {
    let Some(period) = period else {
        return Ok(rows.to_vec());
    };

    let needle = period.trim().to_uppercase();
    let kept: Vec<LedgerRecord> = rows
        .iter()
        .filter(|r| r.period_label.to_uppercase().contains(&needle))
        .cloned()
        .collect();

    if kept.is_empty() {
        return Err(AuditError::NoDataForPeriod(period.to_string()));
    }
    Ok(kept)
}

fn parse_error_row(failure: &ParseFailure) -> ReconciliationRow {
    let mut row = ReconciliationRow::pending("");
    row.entity = Some(failure.entity.clone());
    row.source_files = vec![failure.source_file.clone()];
    row.status = RowStatus::ParseError;
    row.observe(failure.reason.clone());
    row
}
