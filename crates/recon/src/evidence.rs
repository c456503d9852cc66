use std::collections::BTreeMap;

use crate::model::{AuditSummary, ReconciliationRow, RowStatus};

/// Compute summary statistics from the classified rows.
pub fn compute_summary(rows: &[ReconciliationRow]) -> AuditSummary {
    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut summary = AuditSummary {
        total_rows: rows.len(),
        ..Default::default()
    };

    for r in rows {
        *status_counts.entry(r.status.to_string()).or_insert(0) += 1;

        match r.status {
            RowStatus::Ok => summary.matched += 1,
            RowStatus::ErrorValue => summary.value_errors += 1,
            RowStatus::ErrorVolume => summary.volume_errors += 1,
            RowStatus::ErrorVolumeAndValue => {
                summary.value_errors += 1;
                summary.volume_errors += 1;
            }
            RowStatus::MissingDocument => summary.missing_documents += 1,
            RowStatus::MissingLedgerEntry => summary.missing_ledger_entries += 1,
            RowStatus::ParseError => summary.parse_errors += 1,
            RowStatus::Pending => {}
        }
    }

    summary.status_counts = status_counts;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: RowStatus) -> ReconciliationRow {
        let mut r = ReconciliationRow::pending("1");
        r.status = status;
        r
    }

    #[test]
    fn summary_counts() {
        let rows = vec![
            row(RowStatus::Ok),
            row(RowStatus::Ok),
            row(RowStatus::ErrorVolumeAndValue),
            row(RowStatus::ErrorValue),
            row(RowStatus::MissingDocument),
            row(RowStatus::MissingLedgerEntry),
        ];
        let summary = compute_summary(&rows);
        assert_eq!(summary.total_rows, 6);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.value_errors, 2);
        assert_eq!(summary.volume_errors, 1);
        assert_eq!(summary.missing_documents, 1);
        assert_eq!(summary.missing_ledger_entries, 1);
        assert_eq!(summary.status_counts.get("OK"), Some(&2));
        assert!(!summary.is_clean());
    }

    #[test]
    fn all_ok_is_clean() {
        let summary = compute_summary(&[row(RowStatus::Ok)]);
        assert!(summary.is_clean());
    }
}
