//! Locating and loading the tax documents of each entity.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::ZipArchive;

use nfaudit_recon::model::{ParseFailure, TaxDocumentRecord};

use crate::error::IoError;
use crate::xml::{parse_document, parse_document_file};

/// Where a document's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceContent {
    File(PathBuf),
    /// Entry already read out of an archive.
    Archived(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSource {
    /// Owning entity (company folder name).
    pub entity: String,
    /// Bare file name, used as the document's identity in reports.
    pub file_name: String,
    pub content: SourceContent,
}

/// Parsed documents plus the ones that could not be read.
#[derive(Debug, Default)]
pub struct DocumentLoad {
    pub documents: Vec<TaxDocumentRecord>,
    pub failures: Vec<ParseFailure>,
}

fn is_xml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
}

fn sort_sources(sources: &mut [DocumentSource]) {
    sources.sort_by_cached_key(|s| (s.entity.to_lowercase(), s.file_name.to_lowercase()));
}

/// Immediate subdirectories of `parent`, one per entity, sorted
/// case-insensitively. A parent without subdirectories is its own entity.
pub fn discover_entities(parent: &Path) -> Result<Vec<PathBuf>, IoError> {
    let entries = std::fs::read_dir(parent).map_err(|e| IoError::io(parent, e))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IoError::io(parent, e))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }

    if dirs.is_empty() {
        return Ok(vec![parent.to_path_buf()]);
    }
    dirs.sort_by_cached_key(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
    Ok(dirs)
}

/// Recursively collect every `.xml` file (any case) under each entity
/// directory.
pub fn collect_documents(entity_dirs: &[PathBuf]) -> Result<Vec<DocumentSource>, IoError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for dir in entity_dirs {
        if !dir.is_dir() {
            return Err(IoError::io(dir, "not a directory"));
        }
        let entity = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_xml(path) {
                continue;
            }
            if !seen.insert(path.to_string_lossy().to_lowercase()) {
                continue;
            }
            out.push(DocumentSource {
                entity: entity.clone(),
                file_name: entry.file_name().to_string_lossy().into_owned(),
                content: SourceContent::File(path.to_path_buf()),
            });
        }
    }

    sort_sources(&mut out);
    log::info!(
        "collected {} documents from {} entities",
        out.len(),
        entity_dirs.len()
    );
    Ok(out)
}

/// Read every `.xml` entry of a zip of per-entity folders into memory. The
/// first path component names the entity; entries at the top level belong
/// to an entity named after the archive.
pub fn collect_zip_documents(zip_path: &Path) -> Result<Vec<DocumentSource>, IoError> {
    let file = File::open(zip_path).map_err(|e| IoError::io(zip_path, e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| IoError::Archive(format!("{}: {e}", zip_path.display())))?;

    let archive_entity = zip_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| IoError::Archive(format!("entry {i}: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().replace('\\', "/");
        if !is_xml(Path::new(&name)) || !seen.insert(name.to_lowercase()) {
            continue;
        }

        let parts: Vec<&str> = name.split('/').filter(|p| !p.is_empty()).collect();
        let Some((file_name, dirs)) = parts.split_last() else {
            continue;
        };
        let entity = dirs
            .first()
            .map(|d| d.to_string())
            .unwrap_or_else(|| archive_entity.clone());

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| IoError::Archive(format!("{name}: {e}")))?;

        out.push(DocumentSource {
            entity,
            file_name: file_name.to_string(),
            content: SourceContent::Archived(bytes),
        });
    }

    sort_sources(&mut out);
    log::info!(
        "collected {} documents from archive {}",
        out.len(),
        zip_path.display()
    );
    Ok(out)
}

/// Parse every collected document. A document that fails is recorded and
/// skipped; it never stops the batch.
pub fn load_documents(sources: &[DocumentSource]) -> DocumentLoad {
    let mut load = DocumentLoad::default();
    for source in sources {
        let parsed = match &source.content {
            SourceContent::File(path) => parse_document_file(path),
            SourceContent::Archived(bytes) => parse_document(bytes),
        };
        match parsed {
            Ok(record) => load
                .documents
                .push(record.with_source(source.entity.as_str(), source.file_name.as_str())),
            Err(err) => {
                log::warn!("{}/{}: {err}", source.entity, source.file_name);
                load.failures.push(ParseFailure {
                    entity: source.entity.clone(),
                    source_file: source.file_name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    log::debug!(
        "{} documents parsed, {} failed",
        load.documents.len(),
        load.failures.len()
    );
    load
}
