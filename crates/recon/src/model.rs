use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::normalize::net_amount;

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// Goods invoice.
    #[serde(rename = "NF-e")]
    Nfe,
    /// Freight bill.
    #[serde(rename = "CT-e")]
    Cte,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nfe => write!(f, "NF-e"),
            Self::Cte => write!(f, "CT-e"),
        }
    }
}

/// One parsed tax document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxDocumentRecord {
    pub kind: DocumentKind,
    pub note_number: String,
    pub gross_amount: Decimal,
    pub icms_amount: Decimal,
    pub pis_amount: Decimal,
    pub cofins_amount: Decimal,
    pub volume: Decimal,
    pub net_amount_calculated: Decimal,
    /// Owning entity (company folder); set by the collector.
    #[serde(default)]
    pub entity: String,
    /// File name the record was parsed from; set by the collector.
    #[serde(default)]
    pub source_file: String,
}

impl TaxDocumentRecord {
    pub fn new(
        kind: DocumentKind,
        note_number: String,
        gross_amount: Decimal,
        icms_amount: Decimal,
        pis_amount: Decimal,
        cofins_amount: Decimal,
        volume: Decimal,
    ) -> Self {
        let net_amount_calculated =
            net_amount(gross_amount, &[icms_amount, pis_amount, cofins_amount]);
        Self {
            kind,
            note_number,
            gross_amount,
            icms_amount,
            pis_amount,
            cofins_amount,
            volume,
            net_amount_calculated,
            entity: String::new(),
            source_file: String::new(),
        }
    }

    pub fn with_source(mut self, entity: impl Into<String>, source_file: impl Into<String>) -> Self {
        self.entity = entity.into();
        self.source_file = source_file.into();
        self
    }
}

/// A document that could not be read. Kept for diagnostics only; it never
/// contributes to a note aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub entity: String,
    pub source_file: String,
    pub reason: String,
}

/// Document-side aggregate for one note number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedDocument {
    pub note_number: String,
    pub entity: String,
    pub kind: DocumentKind,
    pub source_files: Vec<String>,
    pub volume: Decimal,
    pub gross_amount: Decimal,
    pub icms_amount: Decimal,
    pub pis_amount: Decimal,
    pub cofins_amount: Decimal,
    pub record_count: usize,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// One cleaned ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub note_number: String,
    /// Sheet the row came from (one sheet per month).
    pub period_label: String,
    pub volume_ledger: Decimal,
    pub net_ledger: Decimal,
    pub icms_ledger: Decimal,
    pub pis_ledger: Decimal,
    pub cofins_ledger: Decimal,
    /// 1-based row number within its sheet.
    #[serde(default)]
    pub row_number: usize,
}

/// Ledger-side aggregate for one note number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedLedgerEntry {
    pub note_number: String,
    pub period_label: String,
    pub volume_ledger: Decimal,
    pub net_ledger: Decimal,
    pub icms_ledger: Decimal,
    pub pis_ledger: Decimal,
    pub cofins_ledger: Decimal,
    pub row_count: usize,
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Everything a run needs, already loaded from disk.
#[derive(Debug, Default)]
pub struct AuditInput {
    pub documents: Vec<TaxDocumentRecord>,
    pub parse_failures: Vec<ParseFailure>,
    pub ledger: Vec<LedgerRecord>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowStatus {
    Ok,
    ErrorVolume,
    ErrorValue,
    ErrorVolumeAndValue,
    MissingDocument,
    MissingLedgerEntry,
    ParseError,
    Pending,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::ErrorVolume => "ERROR_VOLUME",
            Self::ErrorValue => "ERROR_VALUE",
            Self::ErrorVolumeAndValue => "ERROR_VOLUME_AND_VALUE",
            Self::MissingDocument => "MISSING_DOCUMENT",
            Self::MissingLedgerEntry => "MISSING_LEDGER_ENTRY",
            Self::ParseError => "PARSE_ERROR",
            Self::Pending => "PENDING",
        }
    }

    /// Report consumers show rows whose status starts with `OK` as matched.
    pub fn is_matched(&self) -> bool {
        self.as_str().starts_with("OK")
    }

    pub fn is_error(&self) -> bool {
        self.as_str().starts_with("ERROR")
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One report line, per note number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationRow {
    pub note_number: String,
    pub entity: Option<String>,
    pub kind: Option<DocumentKind>,
    pub period_label: Option<String>,
    pub source_files: Vec<String>,

    pub volume_document: Decimal,
    pub gross_document: Decimal,
    pub icms_document: Decimal,
    pub pis_document: Decimal,
    pub cofins_document: Decimal,
    pub net_amount_calculated: Decimal,

    pub volume_ledger: Decimal,
    pub net_ledger: Decimal,
    pub icms_ledger: Decimal,
    pub pis_ledger: Decimal,
    pub cofins_ledger: Decimal,

    /// `None` when the ledger has no volume to compare against.
    pub volume_difference: Option<Decimal>,
    pub net_difference: Decimal,
    pub status: RowStatus,
    pub observations: Vec<String>,
}

impl ReconciliationRow {
    /// Empty row for a note number; every amount zero, status pending.
    pub fn pending(note_number: &str) -> Self {
        Self {
            note_number: note_number.to_string(),
            entity: None,
            kind: None,
            period_label: None,
            source_files: Vec::new(),
            volume_document: Decimal::ZERO,
            gross_document: Decimal::ZERO,
            icms_document: Decimal::ZERO,
            pis_document: Decimal::ZERO,
            cofins_document: Decimal::ZERO,
            net_amount_calculated: Decimal::ZERO,
            volume_ledger: Decimal::ZERO,
            net_ledger: Decimal::ZERO,
            icms_ledger: Decimal::ZERO,
            pis_ledger: Decimal::ZERO,
            cofins_ledger: Decimal::ZERO,
            volume_difference: None,
            net_difference: Decimal::ZERO,
            status: RowStatus::Pending,
            observations: Vec::new(),
        }
    }

    pub fn from_ledger(entry: &AggregatedLedgerEntry) -> Self {
        let mut row = Self::pending(&entry.note_number);
        row.period_label = Some(entry.period_label.clone());
        row.volume_ledger = entry.volume_ledger;
        row.net_ledger = entry.net_ledger;
        row.icms_ledger = entry.icms_ledger;
        row.pis_ledger = entry.pis_ledger;
        row.cofins_ledger = entry.cofins_ledger;
        row
    }

    pub fn apply_document(&mut self, doc: &AggregatedDocument) {
        self.entity = Some(doc.entity.clone());
        self.kind = Some(doc.kind);
        self.source_files = doc.source_files.clone();
        self.volume_document = doc.volume;
        self.gross_document = doc.gross_amount;
        self.icms_document = doc.icms_amount;
        self.pis_document = doc.pis_amount;
        self.cofins_document = doc.cofins_amount;
    }

    pub fn observe(&mut self, text: impl Into<String>) {
        self.observations.push(text.into());
    }

    /// Observations joined the way the spreadsheet report shows them.
    pub fn observations_text(&self) -> String {
        self.observations.join(" | ")
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditSummary {
    pub total_rows: usize,
    pub matched: usize,
    pub value_errors: usize,
    pub volume_errors: usize,
    pub missing_documents: usize,
    pub missing_ledger_entries: usize,
    pub parse_errors: usize,
    pub documents_parsed: usize,
    pub parse_failures: usize,
    pub unnumbered_documents: usize,
    pub duplicate_ledger_rows: usize,
    pub status_counts: BTreeMap<String, usize>,
}

impl AuditSummary {
    /// True when every row reconciled.
    pub fn is_clean(&self) -> bool {
        self.matched == self.total_rows
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditMeta {
    pub config_name: String,
    pub period_filter: Option<String>,
    pub freight_tolerance: Decimal,
    pub goods_tolerance: Decimal,
    pub volume_tolerance: Decimal,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub meta: AuditMeta,
    pub summary: AuditSummary,
    pub rows: Vec<ReconciliationRow>,
    /// Ledger rows sharing a note number, before aggregation.
    pub duplicates: Vec<LedgerRecord>,
    pub missing_documents: Vec<ReconciliationRow>,
    pub parse_failures: Vec<ParseFailure>,
    /// Source files that parsed but carried no note number.
    pub unnumbered_documents: Vec<String>,
}

impl AuditReport {
    pub fn row(&self, note_number: &str) -> Option<&ReconciliationRow> {
        self.rows.iter().find(|r| r.note_number == note_number)
    }
}
