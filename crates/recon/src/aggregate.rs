use std::collections::HashMap;

use crate::model::{AggregatedDocument, AggregatedLedgerEntry, LedgerRecord, TaxDocumentRecord};

/// Group documents by note number, summing amounts and volume. Sums
/// saturate at the `Decimal` bounds.
///
/// Output keeps first-seen order. Records without a note number are skipped;
/// callers report them separately.
pub fn aggregate_documents(records: &[TaxDocumentRecord]) -> Vec<AggregatedDocument> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<AggregatedDocument> = Vec::new();

    for rec in records {
        if rec.note_number.is_empty() {
            continue;
        }
        let slot = *index.entry(rec.note_number.as_str()).or_insert_with(|| {
            groups.push(AggregatedDocument {
                note_number: rec.note_number.clone(),
                entity: rec.entity.clone(),
                kind: rec.kind,
                source_files: Vec::new(),
                volume: Default::default(),
                gross_amount: Default::default(),
                icms_amount: Default::default(),
                pis_amount: Default::default(),
                cofins_amount: Default::default(),
                record_count: 0,
            });
            groups.len() - 1
        });

        let agg = &mut groups[slot];
        agg.volume = agg.volume.saturating_add(rec.volume);
        agg.gross_amount = agg.gross_amount.saturating_add(rec.gross_amount);
        agg.icms_amount = agg.icms_amount.saturating_add(rec.icms_amount);
        agg.pis_amount = agg.pis_amount.saturating_add(rec.pis_amount);
        agg.cofins_amount = agg.cofins_amount.saturating_add(rec.cofins_amount);
        agg.record_count += 1;
        if !rec.source_file.is_empty() && !agg.source_files.contains(&rec.source_file) {
            agg.source_files.push(rec.source_file.clone());
        }
    }

    groups
}

/// Group ledger rows by note number, summing numeric columns and keeping
/// the first period label. Output keeps first-seen order.
pub fn aggregate_ledger(rows: &[LedgerRecord]) -> Vec<AggregatedLedgerEntry> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<AggregatedLedgerEntry> = Vec::new();

    for row in rows {
        if row.note_number.is_empty() {
            continue;
        }
        let slot = *index.entry(row.note_number.as_str()).or_insert_with(|| {
            groups.push(AggregatedLedgerEntry {
                note_number: row.note_number.clone(),
                period_label: row.period_label.clone(),
                volume_ledger: Default::default(),
                net_ledger: Default::default(),
                icms_ledger: Default::default(),
                pis_ledger: Default::default(),
                cofins_ledger: Default::default(),
                row_count: 0,
            });
            groups.len() - 1
        });

        let agg = &mut groups[slot];
        agg.volume_ledger = agg.volume_ledger.saturating_add(row.volume_ledger);
        agg.net_ledger = agg.net_ledger.saturating_add(row.net_ledger);
        agg.icms_ledger = agg.icms_ledger.saturating_add(row.icms_ledger);
        agg.pis_ledger = agg.pis_ledger.saturating_add(row.pis_ledger);
        agg.cofins_ledger = agg.cofins_ledger.saturating_add(row.cofins_ledger);
        agg.row_count += 1;
    }

    groups
}

/// Ledger rows whose note number appears two or more times, verbatim and in
/// original order. Aggregation would otherwise sum them silently.
pub fn find_duplicates(rows: &[LedgerRecord]) -> Vec<LedgerRecord> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.note_number.as_str()).or_insert(0) += 1;
    }

    rows.iter()
        .filter(|r| !r.note_number.is_empty() && counts.get(r.note_number.as_str()).copied().unwrap_or(0) >= 2)
        .cloned()
        .collect()
}
