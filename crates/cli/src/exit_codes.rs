//! CLI Exit Code Registry
//!
//! Single source of truth for `nfaudit` exit codes. Scripts and schedulers
//! branch on these, so existing values never change meaning.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                              |
//! |---------|------------|------------------------------------------|
//! | 0       | Universal  | Success (every row matched)              |
//! | 1       | Universal  | General error (unspecified)              |
//! | 2       | Universal  | CLI usage error (bad args)               |
//! | 3       | Universal  | File could not be read or written        |
//! | 60-69   | audit      | Reconciliation outcomes and config       |

use nfaudit_io::IoError;
use nfaudit_recon::AuditError;

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Success - command completed; for `run`, every row is matched.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, conflicting options.
pub const EXIT_USAGE: u8 = 2;

/// IO error - missing input, unreadable workbook or archive, unwritable report.
pub const EXIT_IO: u8 = 3;

// =============================================================================
// Audit (60-69)
// =============================================================================

/// The run completed but at least one row is not `OK`.
pub const EXIT_AUDIT_MISMATCH: u8 = 60;

/// The ledger produced no usable rows.
pub const EXIT_AUDIT_NO_LEDGER_DATA: u8 = 61;

/// The period filter matched no ledger rows.
pub const EXIT_AUDIT_NO_DATA_FOR_PERIOD: u8 = 62;

/// Config file failed to parse or validate.
pub const EXIT_AUDIT_INVALID_CONFIG: u8 = 63;

/// Map an engine error to its exit code.
pub fn audit_exit_code(err: &AuditError) -> u8 {
    match err {
        AuditError::ConfigParse(_) | AuditError::ConfigValidation(_) => EXIT_AUDIT_INVALID_CONFIG,
        AuditError::NoLedgerData => EXIT_AUDIT_NO_LEDGER_DATA,
        AuditError::NoDataForPeriod(_) => EXIT_AUDIT_NO_DATA_FOR_PERIOD,
    }
}

/// Map an IO error to its exit code.
pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::Io { .. } | IoError::Workbook(_) | IoError::Archive(_) | IoError::Report(_) => {
            EXIT_IO
        }
    }
}
