//! Ledger spreadsheet loading.
//!
//! Each selected sheet is one accounting period. Sheets are free-form: the
//! header row is searched for, columns are picked by name fragments and
//! note numbers that are only written on the first line of a multi-line
//! entry are carried down.

use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use serde::Serialize;

use nfaudit_recon::model::LedgerRecord;
use nfaudit_recon::normalize::{normalize_note_number, normalize_number, Token};
use nfaudit_recon::LedgerSelection;

use crate::error::IoError;

/// Rows scanned for a header before a sheet is given up on.
const HEADER_SCAN_ROWS: usize = 120;

/// Rows loaded from the ledger plus what happened to each sheet.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LedgerLoad {
    pub records: Vec<LedgerRecord>,
    pub sheets: Vec<SheetDiagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetOutcome {
    Loaded,
    /// Name does not match the year/period selection.
    NotSelected,
    NoHeader,
    /// Header found but no note or no net column in it.
    MissingColumns,
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetDiagnostic {
    pub sheet: String,
    pub outcome: SheetOutcome,
    /// 1-based spreadsheet row of the header, when one was found.
    pub header_row: Option<usize>,
    pub rows_loaded: usize,
}

impl SheetDiagnostic {
    fn new(sheet: &str, outcome: SheetOutcome) -> Self {
        Self {
            sheet: sheet.to_string(),
            outcome,
            header_row: None,
            rows_loaded: 0,
        }
    }
}

/// Owned cell value, independent of the file format it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Blank,
    Number(f64),
    Text(String),
}

impl Cell {
    fn token(&self) -> Token<'_> {
        match self {
            Cell::Blank => Token::Blank,
            Cell::Number(n) => Token::Number(*n),
            Cell::Text(s) => Token::Text(s),
        }
    }

    fn header_text(&self) -> String {
        match self {
            Cell::Blank => String::new(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.trim().to_uppercase(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Blank,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(n) => Cell::Number(*n),
            Data::Int(n) => Cell::Number(*n as f64),
            Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Data::Error(e) => Cell::Text(format!("#{e:?}")),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        }
    }
}

/// Load ledger rows from a workbook (xlsx, xls, xlsb, ods) or a single-sheet
/// CSV export. A CSV counts as one sheet named after the file stem.
pub fn load_ledger(path: &Path, selection: &LedgerSelection) -> Result<LedgerLoad, IoError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let sheets = if is_csv {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("ledger")
            .to_string();
        vec![(name, Some(read_csv_grid(path)?))]
    } else {
        read_workbook_grids(path, selection)?
    };

    let mut load = LedgerLoad::default();
    for (name, grid) in &sheets {
        let diag = match grid {
            Some(grid) => load_sheet(name, grid, selection, &mut load.records),
            None => SheetDiagnostic::new(name, SheetOutcome::NotSelected),
        };
        match diag.outcome {
            SheetOutcome::Loaded => {
                log::info!("ledger sheet '{}': {} rows", name, diag.rows_loaded)
            }
            SheetOutcome::NotSelected => log::debug!("ledger sheet '{name}' not selected"),
            SheetOutcome::NoHeader => log::warn!("ledger sheet '{name}': no header row found"),
            SheetOutcome::MissingColumns => {
                log::warn!("ledger sheet '{name}': no note or net amount column")
            }
        }
        load.sheets.push(diag);
    }
    Ok(load)
}

/// Grids of the selected sheets; unselected sheets are listed by name only
/// and never read.
fn read_workbook_grids(
    path: &Path,
    selection: &LedgerSelection,
) -> Result<Vec<(String, Option<Vec<Vec<Cell>>>)>, IoError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| IoError::Workbook(format!("{}: {e}", path.display())))?;

    let names: Vec<String> = workbook.sheet_names().to_vec();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        if !selection.accepts_sheet(&name) {
            out.push((name, None));
            continue;
        }
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| IoError::Workbook(format!("sheet '{name}': {e}")))?;

        // Ranges start at the first used cell; pad so row numbers stay
        // aligned with the spreadsheet.
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let mut grid: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
        for row in range.rows() {
            let mut cells = vec![Cell::Blank; col_offset];
            cells.extend(row.iter().map(Cell::from));
            grid.push(cells);
        }
        out.push((name, Some(grid)));
    }
    Ok(out)
}

fn read_csv_grid(path: &Path) -> Result<Vec<Vec<Cell>>, IoError> {
    let bytes = std::fs::read(path).map_err(|e| IoError::io(path, e))?;
    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
            decoded.into_owned()
        }
    };

    // Brazilian exports use ';' because ',' is the decimal separator.
    let first_line = content.lines().next().unwrap_or("");
    let delimiter = if first_line.matches(';').count() > first_line.matches(',').count() {
        b';'
    } else {
        b','
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IoError::Workbook(format!("{}: {e}", path.display())))?;
        grid.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Blank
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(grid)
}

// ---------------------------------------------------------------------------
// Sheet interpretation
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq)]
struct ColumnMap {
    note: Option<usize>,
    net: Option<usize>,
    volume: Option<usize>,
    icms: Option<usize>,
    pis: Option<usize>,
    cofins: Option<usize>,
}

/// Header cells uppercased and trimmed; repeated names get `__1`, `__2`, ...
fn unique_columns(header: &[Cell]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    header
        .iter()
        .map(|cell| {
            let base = cell.header_text();
            match seen.get_mut(&base) {
                Some(count) => {
                    *count += 1;
                    format!("{base}__{count}")
                }
                None => {
                    seen.insert(base.clone(), 0);
                    base
                }
            }
        })
        .collect()
}

fn find_header_row(grid: &[Vec<Cell>]) -> Option<usize> {
    grid.iter().take(HEADER_SCAN_ROWS).position(|row| {
        let texts: Vec<String> = row.iter().map(Cell::header_text).collect();
        texts.iter().any(|t| t.contains("NOTA"))
            && texts
                .iter()
                .any(|t| t.contains("S/TRIBUTOS") || t.contains("C/TRIBUTOS") || t.contains("TOTAL"))
    })
}

fn map_columns(columns: &[String]) -> ColumnMap {
    let first = |pred: &dyn Fn(&str) -> bool| columns.iter().position(|c| pred(c.as_str()));
    let last_prefixed = |prefix: &str| columns.iter().rposition(|c| c.starts_with(prefix));

    ColumnMap {
        note: first(&|c| c.contains("NOTA") || c == "NF"),
        net: first(&|c| c.contains("S/TRIBUTOS")),
        volume: first(&|c| {
            ["VOL", "M³", "M3", "QTD", "QUANT"]
                .iter()
                .any(|frag| c.contains(frag))
        }),
        icms: last_prefixed("ICMS"),
        pis: last_prefixed("PIS"),
        cofins: last_prefixed("COFINS"),
    }
}

fn cell(row: &[Cell], col: Option<usize>) -> Token<'_> {
    col.and_then(|c| row.get(c)).map_or(Token::Blank, Cell::token)
}

fn load_sheet(
    name: &str,
    grid: &[Vec<Cell>],
    selection: &LedgerSelection,
    out: &mut Vec<LedgerRecord>,
) -> SheetDiagnostic {
    if !selection.accepts_sheet(name) {
        return SheetDiagnostic::new(name, SheetOutcome::NotSelected);
    }
    let Some(header_idx) = find_header_row(grid) else {
        return SheetDiagnostic::new(name, SheetOutcome::NoHeader);
    };

    let mut diag = SheetDiagnostic::new(name, SheetOutcome::MissingColumns);
    diag.header_row = Some(header_idx + 1);

    let columns = unique_columns(&grid[header_idx]);
    let map = map_columns(&columns);
    let (Some(note_col), Some(net_col)) = (map.note, map.net) else {
        return diag;
    };
    log::debug!(
        "sheet '{name}': note column '{}', net column '{}'",
        columns[note_col],
        columns[net_col]
    );

    let relevant = [Some(net_col), map.volume, map.icms, map.pis, map.cofins];

    let mut last_note: Option<Token<'_>> = None;
    let mut loaded = 0;
    for (offset, row) in grid[header_idx + 1..].iter().enumerate() {
        let raw = cell(row, Some(note_col));
        let note_token = if raw.has_content() {
            last_note = Some(raw);
            raw
        } else if relevant.iter().any(|col| col.is_some() && cell(row, *col).has_content()) {
            last_note.unwrap_or(Token::Blank)
        } else {
            Token::Blank
        };

        let note_number = normalize_note_number(note_token);
        if note_number.is_empty() {
            continue;
        }

        out.push(LedgerRecord {
            note_number,
            period_label: name.to_string(),
            volume_ledger: normalize_number(cell(row, map.volume)),
            net_ledger: normalize_number(cell(row, Some(net_col))),
            icms_ledger: normalize_number(cell(row, map.icms)),
            pis_ledger: normalize_number(cell(row, map.pis)),
            cofins_ledger: normalize_number(cell(row, map.cofins)),
            row_number: header_idx + offset + 2,
        });
        loaded += 1;
    }

    diag.outcome = SheetOutcome::Loaded;
    diag.rows_loaded = loaded;
    diag
}
