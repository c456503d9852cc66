//! `nfaudit-recon`: fiscal document vs ledger reconciliation engine.
//!
//! Pure engine crate: receives parsed documents and ledger rows, returns
//! classified results. No file IO.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod matcher;
pub mod model;
pub mod normalize;

pub use config::{AuditConfig, LedgerSelection, ToleranceConfig};
pub use engine::run;
pub use error::AuditError;
pub use model::{
    AuditInput, AuditReport, DocumentKind, LedgerRecord, ParseFailure, ReconciliationRow,
    RowStatus, TaxDocumentRecord,
};
