use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty year token, negative tolerance, etc.).
    ConfigValidation(String),
    /// The ledger produced no usable rows (no sheet/header matched).
    NoLedgerData,
    /// The period filter left no ledger rows.
    NoDataForPeriod(String),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::NoLedgerData => write!(
                f,
                "no usable ledger data (check the target year and period tokens)"
            ),
            Self::NoDataForPeriod(period) => {
                write!(f, "no ledger data for period '{period}'")
            }
        }
    }
}

impl std::error::Error for AuditError {}
