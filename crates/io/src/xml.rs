//! NF-e / CT-e document parsing.
//!
//! Documents are read into a small element tree keyed by local name, so the
//! same lookups work whether or not the file carries the portal namespace or
//! a prefix. Only the handful of fields the audit needs are extracted.

use std::borrow::Cow;
use std::path::Path;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rust_decimal::Decimal;

use nfaudit_recon::model::{DocumentKind, TaxDocumentRecord};
use nfaudit_recon::normalize::{canonical_digits, normalize_number};

use crate::error::DocumentError;

const CTE_NAMESPACE: &str = "portalfiscal.inf.br/cte";

/// Parse one document from raw bytes.
pub fn parse_document(bytes: &[u8]) -> Result<TaxDocumentRecord, DocumentError> {
    let text = decode_bytes(bytes);
    let root = build_tree(&text)?;

    match detect_kind(&root) {
        Some(DocumentKind::Cte) => {
            let inf = root.find("infCte").ok_or(DocumentError::UnrecognizedDocument)?;
            Ok(parse_cte(inf))
        }
        Some(DocumentKind::Nfe) => {
            let inf = root.find("infNFe").ok_or(DocumentError::UnrecognizedDocument)?;
            Ok(parse_nfe(inf))
        }
        None => Err(DocumentError::UnrecognizedDocument),
    }
}

/// Parse one document from disk. Entity and source file are left for the
/// collector to fill in.
pub fn parse_document_file(path: &Path) -> Result<TaxDocumentRecord, DocumentError> {
    let bytes = std::fs::read(path).map_err(|e| DocumentError::Io(e.to_string()))?;
    parse_document(&bytes)
}

/// UTF-8 first; Windows-1252 when the bytes are not valid UTF-8 (older
/// emitters declare ISO-8859-1).
fn decode_bytes(bytes: &[u8]) -> Cow<'_, str> {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded
        }
    };
    match text {
        Cow::Borrowed(s) => Cow::Borrowed(s.trim_start_matches('\u{feff}')),
        Cow::Owned(s) => Cow::Owned(s.trim_start_matches('\u{feff}').to_string()),
    }
}

// ---------------------------------------------------------------------------
// Element tree
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Element {
    /// Local name, prefix stripped.
    name: String,
    /// Namespace URI bound to the element's prefix, when declared on it.
    namespace: Option<String>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Self {
        let raw = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let (prefix, local) = match raw.split_once(':') {
            Some((p, l)) => (Some(p.to_string()), l.to_string()),
            None => (None, raw),
        };
        let ns_key = match &prefix {
            Some(p) => format!("xmlns:{p}"),
            None => "xmlns".to_string(),
        };
        let namespace = start
            .attributes()
            .flatten()
            .find(|a| a.key.as_ref() == ns_key.as_bytes())
            .map(|a| String::from_utf8_lossy(&a.value).into_owned());

        Self {
            name: local,
            namespace,
            ..Default::default()
        }
    }

    /// Depth-first search (self included) for the first element with this
    /// local name.
    fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// All descendants (self excluded) with this local name, document order.
    fn descendants<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.descendants(name, out);
        }
    }

    /// Walk `path` through direct children, depth-first, returning the first
    /// non-blank text at the end of it.
    fn first_text(&self, path: &[&str]) -> Option<&str> {
        let Some((head, rest)) = path.split_first() else {
            let text = self.text.trim();
            return (!text.is_empty()).then_some(text);
        };
        self.children
            .iter()
            .filter(|c| c.name == *head)
            .find_map(|c| c.first_text(rest))
    }

    /// First descendant with this local name carrying non-blank text.
    fn first_descendant_text(&self, name: &str) -> Option<&str> {
        let mut found = Vec::new();
        self.descendants(name, &mut found);
        found
            .into_iter()
            .map(|e| e.text.trim())
            .find(|t| !t.is_empty())
    }
}

fn build_tree(text: &str) -> Result<Element, DocumentError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| DocumentError::Malformed(format!("at byte {}: {e}", reader.error_position())))?;
        match event {
            Event::Start(ref e) => {
                if root.is_some() {
                    return Err(DocumentError::Malformed("content after root element".into()));
                }
                stack.push(Element::open(e));
            }
            Event::Empty(ref e) => {
                let element = Element::open(e);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => {
                        return Err(DocumentError::Malformed("content after root element".into()))
                    }
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DocumentError::Malformed("unbalanced end tag".into()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(ref e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(ref e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(ref e) => {
                let name = String::from_utf8_lossy(e.as_ref());
                if let (Some(current), Some(resolved)) =
                    (stack.last_mut(), resolve_predefined_entity(&name))
                {
                    current.text.push_str(resolved);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DocumentError::Malformed("unexpected end of document".into()));
    }
    root.ok_or_else(|| DocumentError::Malformed("no root element".into()))
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

fn detect_kind(root: &Element) -> Option<DocumentKind> {
    let has_cte = root.contains("infCte");
    let cte_root = root.name.to_lowercase().contains("cte")
        || root
            .namespace
            .as_deref()
            .is_some_and(|ns| ns.to_lowercase().contains(CTE_NAMESPACE));

    if has_cte && cte_root {
        Some(DocumentKind::Cte)
    } else if root.contains("infNFe") {
        Some(DocumentKind::Nfe)
    } else if has_cte {
        Some(DocumentKind::Cte)
    } else {
        None
    }
}

fn amount(text: Option<&str>) -> Decimal {
    normalize_number(text)
}

fn parse_nfe(inf: &Element) -> TaxDocumentRecord {
    let note = canonical_digits(inf.first_text(&["ide", "nNF"]).unwrap_or_default());
    let gross = amount(inf.first_text(&["total", "ICMSTot", "vNF"]));
    let icms = amount(inf.first_text(&["total", "ICMSTot", "vICMS"]));
    let pis = amount(inf.first_text(&["total", "ICMSTot", "vPIS"]));
    let cofins = amount(inf.first_text(&["total", "ICMSTot", "vCOFINS"]));

    let mut dets = Vec::new();
    inf.descendants("det", &mut dets);
    let mut volume = Decimal::ZERO;
    for prod in dets
        .iter()
        .filter_map(|det| det.children.iter().find(|c| c.name == "prod"))
    {
        let unit = prod
            .first_text(&["uCom"])
            .unwrap_or_default()
            .to_uppercase()
            .replace("Â³", "3")
            .replace('³', "3");
        if unit.contains("M3") {
            volume += amount(prod.first_text(&["qCom"]));
        }
    }

    if volume.is_zero() {
        if let Some(q) = inf.first_text(&["transp", "vol", "qVol"]) {
            volume = amount(Some(q));
        }
    }

    TaxDocumentRecord::new(DocumentKind::Nfe, note, gross, icms, pis, cofins, volume)
}

fn parse_cte(inf: &Element) -> TaxDocumentRecord {
    let note = canonical_digits(inf.first_text(&["ide", "nCT"]).unwrap_or_default());
    let gross = amount(inf.first_text(&["vPrest", "vTPrest"]));
    let icms = amount(inf.first_descendant_text("vICMS"));
    let pis = amount(inf.first_descendant_text("vPIS"));
    let cofins = amount(inf.first_descendant_text("vCOFINS"));

    let mut quantities = Vec::new();
    inf.descendants("infQ", &mut quantities);
    let volume = quantities
        .iter()
        .filter_map(|q| q.first_text(&["qCarga"]))
        .map(|q| amount(Some(q)))
        .find(|v| *v > Decimal::ZERO)
        .unwrap_or_default();

    TaxDocumentRecord::new(DocumentKind::Cte, note, gross, icms, pis, cofins, volume)
}
