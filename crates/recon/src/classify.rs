use rust_decimal::Decimal;

use crate::config::ToleranceConfig;
use crate::model::{
    AggregatedDocument, AggregatedLedgerEntry, DocumentKind, ReconciliationRow, RowStatus,
};
use crate::normalize::net_amount;

pub const OBS_CTE_TAX_FALLBACK: &str =
    "CT-e without PIS/COFINS in the document; ledger PIS/COFINS used for the net amount";
pub const OBS_NO_LEDGER_VOLUME: &str = "Volume not found in the ledger";
pub const OBS_MISSING_DOCUMENT: &str = "Note is in the ledger but no document was found";
pub const OBS_MISSING_LEDGER: &str = "Document found but the note is not in the ledger";

/// Tax components used for the net amount of a matched note.
///
/// Freight bills may legally omit the PIS/COFINS breakdown that the ledger
/// still tracks; in that case the ledger values stand in for the document's.
pub fn effective_taxes(
    doc: &AggregatedDocument,
    ledger: &AggregatedLedgerEntry,
) -> (Decimal, Decimal, Decimal, bool) {
    let fallback = doc.kind == DocumentKind::Cte
        && doc.pis_amount.is_zero()
        && !ledger.pis_ledger.is_zero();
    if fallback {
        (doc.icms_amount, ledger.pis_ledger, ledger.cofins_ledger, true)
    } else {
        (doc.icms_amount, doc.pis_amount, doc.cofins_amount, false)
    }
}

/// Status for a value/volume check outcome.
pub fn status_for(value_ok: bool, volume_ok: bool) -> RowStatus {
    match (value_ok, volume_ok) {
        (true, true) => RowStatus::Ok,
        (true, false) => RowStatus::ErrorVolume,
        (false, true) => RowStatus::ErrorValue,
        (false, false) => RowStatus::ErrorVolumeAndValue,
    }
}

/// Fill in the comparison fields of a row that has both a ledger entry and
/// a document aggregate.
pub fn classify_matched(
    row: &mut ReconciliationRow,
    doc: &AggregatedDocument,
    ledger: &AggregatedLedgerEntry,
    tolerance: &ToleranceConfig,
) {
    row.apply_document(doc);

    if ledger.volume_ledger.is_zero() {
        row.observe(OBS_NO_LEDGER_VOLUME);
    }

    let (icms, pis, cofins, fallback) = effective_taxes(doc, ledger);
    if fallback {
        row.observe(OBS_CTE_TAX_FALLBACK);
    }

    row.net_amount_calculated = net_amount(doc.gross_amount, &[icms, pis, cofins]);
    row.net_difference = row.net_amount_calculated.saturating_sub(ledger.net_ledger);
    row.volume_difference = if ledger.volume_ledger.is_zero() {
        None
    } else {
        Some(doc.volume.saturating_sub(ledger.volume_ledger))
    };

    let value_ok = row.net_difference.abs() < tolerance.value_tolerance(doc.kind);
    let volume_ok = match row.volume_difference {
        None => true,
        Some(diff) => diff.abs() < tolerance.volume,
    };

    row.status = status_for(value_ok, volume_ok);
}

/// A ledger entry with no document at all.
pub fn classify_missing_document(row: &mut ReconciliationRow, ledger: &AggregatedLedgerEntry) {
    row.net_difference = Decimal::ZERO - ledger.net_ledger;
    row.volume_difference = None;
    row.status = RowStatus::MissingDocument;
    row.observe(OBS_MISSING_DOCUMENT);
}

/// A document aggregate whose note the ledger never mentions.
pub fn classify_missing_ledger(doc: &AggregatedDocument) -> ReconciliationRow {
    let mut row = ReconciliationRow::pending(&doc.note_number);
    row.apply_document(doc);
    row.net_amount_calculated = net_amount(
        doc.gross_amount,
        &[doc.icms_amount, doc.pis_amount, doc.cofins_amount],
    );
    row.net_difference = row.net_amount_calculated;
    row.status = RowStatus::MissingLedgerEntry;
    row.observe(OBS_MISSING_LEDGER);
    row
}
