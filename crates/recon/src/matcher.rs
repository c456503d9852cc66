use std::collections::{HashMap, HashSet};

use crate::classify::{classify_matched, classify_missing_document, classify_missing_ledger};
use crate::config::ToleranceConfig;
use crate::model::{AggregatedDocument, AggregatedLedgerEntry, ReconciliationRow};

#[derive(Debug, Default)]
pub struct MatchOutput {
    /// One row per note number in the union of both sides.
    pub rows: Vec<ReconciliationRow>,
    /// Copies of the `MISSING_DOCUMENT` rows, for the warnings report.
    pub missing_documents: Vec<ReconciliationRow>,
}

/// Match ledger aggregates to document aggregates by exact note number.
///
/// Ledger notes come first in ledger order; document notes the ledger never
/// mentions follow in document order.
pub fn match_by_note(
    ledger: &[AggregatedLedgerEntry],
    documents: &[AggregatedDocument],
    tolerance: &ToleranceConfig,
) -> MatchOutput {
    let doc_map: HashMap<&str, &AggregatedDocument> = documents
        .iter()
        .map(|d| (d.note_number.as_str(), d))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = MatchOutput::default();

    for entry in ledger {
        let mut row = ReconciliationRow::from_ledger(entry);

        match doc_map.get(entry.note_number.as_str()) {
            Some(doc) => {
                seen.insert(doc.note_number.as_str());
                classify_matched(&mut row, doc, entry, tolerance);
            }
            None => {
                classify_missing_document(&mut row, entry);
                out.missing_documents.push(row.clone());
            }
        }

        out.rows.push(row);
    }

    for doc in documents {
        if !seen.contains(doc.note_number.as_str()) {
            out.rows.push(classify_missing_ledger(doc));
        }
    }

    out
}
