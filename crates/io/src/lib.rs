// File I/O for the audit: document parsing, ledger loading, collection and
// report writing. The reconciliation itself lives in nfaudit-recon.

pub mod collect;
pub mod error;
pub mod ledger;
pub mod report;
pub mod xml;

pub use collect::{
    collect_documents, collect_zip_documents, discover_entities, load_documents, DocumentLoad,
    DocumentSource, SourceContent,
};
pub use error::{DocumentError, IoError};
pub use ledger::{load_ledger, LedgerLoad, SheetDiagnostic, SheetOutcome};
pub use report::{write_json, write_xlsx};
pub use xml::{parse_document, parse_document_file};
