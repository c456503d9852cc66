use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

use nfaudit_recon::classify::OBS_CTE_TAX_FALLBACK;
use nfaudit_recon::model::{AuditInput, AuditReport, LedgerRecord, RowStatus, TaxDocumentRecord};
use nfaudit_recon::{run, AuditConfig, AuditError};
use rust_decimal::Decimal;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_input() -> AuditInput {
    let dir = fixtures_dir();
    let docs = std::fs::read_to_string(dir.join("october_documents.json")).unwrap();
    let ledger = std::fs::read_to_string(dir.join("october_ledger.json")).unwrap();
    AuditInput {
        documents: serde_json::from_str::<Vec<TaxDocumentRecord>>(&docs).unwrap(),
        parse_failures: Vec::new(),
        ledger: serde_json::from_str::<Vec<LedgerRecord>>(&ledger).unwrap(),
    }
}

fn load_and_run(config_toml: &str) -> AuditReport {
    let config = AuditConfig::from_toml(config_toml).unwrap();
    run(&config, &load_input()).unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn status(report: &AuditReport, note: &str) -> RowStatus {
    report
        .row(note)
        .unwrap_or_else(|| panic!("no row for note {note}"))
        .status
}

// -------------------------------------------------------------------------
// Full ledger
// -------------------------------------------------------------------------

#[test]
fn every_note_gets_exactly_one_row() {
    let input = load_input();
    let report = run(&AuditConfig::default(), &input).unwrap();

    let union: HashSet<&str> = input
        .ledger
        .iter()
        .map(|r| r.note_number.as_str())
        .chain(input.documents.iter().map(|d| d.note_number.as_str()))
        .collect();

    assert_eq!(report.rows.len(), union.len());
    let row_notes: HashSet<&str> = report.rows.iter().map(|r| r.note_number.as_str()).collect();
    assert_eq!(row_notes, union);
}

#[test]
fn classification_per_note() {
    let report = load_and_run("");

    assert_eq!(status(&report, "100"), RowStatus::Ok);
    assert_eq!(status(&report, "200"), RowStatus::MissingLedgerEntry);
    assert_eq!(status(&report, "300"), RowStatus::MissingDocument);
    assert_eq!(status(&report, "7001"), RowStatus::Ok);
    assert_eq!(status(&report, "8100"), RowStatus::Ok);
    assert_eq!(status(&report, "9000"), RowStatus::ErrorVolumeAndValue);
    assert_eq!(status(&report, "9100"), RowStatus::MissingDocument);

    assert_eq!(report.summary.total_rows, 7);
    assert_eq!(report.summary.matched, 3);
    assert_eq!(report.summary.missing_documents, 2);
    assert_eq!(report.summary.missing_ledger_entries, 1);
    assert!(!report.summary.is_clean());
}

#[test]
fn freight_bill_borrows_ledger_taxes() {
    let report = load_and_run("");
    let row = report.row("7001").unwrap();
    assert_eq!(row.net_amount_calculated, dec("872"));
    assert_eq!(row.net_difference, Decimal::ZERO);
    assert!(row.observations.iter().any(|o| o == OBS_CTE_TAX_FALLBACK));
}

#[test]
fn split_note_is_summed_on_both_sides() {
    let report = load_and_run("");
    let row = report.row("8100").unwrap();
    assert_eq!(row.gross_document, dec("1000"));
    assert_eq!(row.volume_document, dec("10"));
    assert_eq!(row.net_ledger, dec("900"));
    assert_eq!(row.volume_ledger, dec("10"));
    assert_eq!(row.source_files, vec!["nf_8100_a.xml", "nf_8100_b.xml"]);

    assert_eq!(report.duplicates.len(), 2);
    assert!(report.duplicates.iter().all(|d| d.note_number == "8100"));
    assert_eq!(report.duplicates[0].row_number, 5);
}

#[test]
fn differences_for_failed_note() {
    let report = load_and_run("");
    let row = report.row("9000").unwrap();
    assert_eq!(row.net_difference, dec("50"));
    assert_eq!(row.volume_difference, Some(dec("5")));
}

#[test]
fn missing_document_list_matches_rows() {
    let report = load_and_run("");
    let notes: Vec<&str> = report
        .missing_documents
        .iter()
        .map(|r| r.note_number.as_str())
        .collect();
    assert_eq!(notes, vec!["300", "9100"]);
    assert_eq!(report.missing_documents[0].net_difference, dec("-10"));
}

// -------------------------------------------------------------------------
// Config variations
// -------------------------------------------------------------------------

#[test]
fn period_filter_drops_other_sheets() {
    let report = load_and_run("period_filter = \"OUT\"\n");
    assert!(report.row("9100").is_none());
    assert_eq!(report.rows.len(), 6);
    assert_eq!(report.meta.period_filter.as_deref(), Some("OUT"));
}

#[test]
fn unknown_period_is_fatal() {
    let config = AuditConfig::from_toml("period_filter = \"JAN\"\n").unwrap();
    let err = run(&config, &load_input()).unwrap_err();
    assert_eq!(err, AuditError::NoDataForPeriod("JAN".into()));
}

#[test]
fn loose_tolerances_accept_failed_note() {
    let report = load_and_run(
        r#"
[tolerance]
goods = 60.0
volume = 6.0
"#,
    );
    assert_eq!(status(&report, "9000"), RowStatus::Ok);
}

#[test]
fn report_serializes_to_json() {
    let report = load_and_run("");
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["summary"]["total_rows"], 7);
    let first = &json["rows"][0];
    assert_eq!(first["note_number"], "100");
    assert_eq!(first["status"], "OK");
    assert_eq!(first["kind"], "NF-e");
}
