use std::fmt;
use std::path::{Path, PathBuf};

/// Fatal IO failures: the run cannot continue without this input/output.
#[derive(Debug)]
pub enum IoError {
    /// File or directory access failed.
    Io { path: PathBuf, message: String },
    /// Ledger workbook could not be opened or a sheet could not be read.
    Workbook(String),
    /// Document archive could not be read.
    Archive(String),
    /// Report could not be written.
    Report(String),
}

impl IoError {
    pub fn io(path: &Path, err: impl fmt::Display) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "{}: {message}", path.display()),
            Self::Workbook(msg) => write!(f, "ledger workbook error: {msg}"),
            Self::Archive(msg) => write!(f, "document archive error: {msg}"),
            Self::Report(msg) => write!(f, "report error: {msg}"),
        }
    }
}

impl std::error::Error for IoError {}

/// Why a single tax document could not be turned into a record.
/// Never fatal: the caller records it and moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    Io(String),
    /// Markup is not well-formed.
    Malformed(String),
    /// Neither a goods-invoice nor a freight-bill marker element is present.
    UnrecognizedDocument,
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "cannot read document: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed XML: {msg}"),
            Self::UnrecognizedDocument => write!(f, "neither an NF-e nor a CT-e document"),
        }
    }
}

impl std::error::Error for DocumentError {}
