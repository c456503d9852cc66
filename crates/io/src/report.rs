//! Report writers: a styled workbook for reviewers and JSON for machines.

use std::path::Path;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, Worksheet, XlsxError};

use nfaudit_recon::model::{AuditReport, ReconciliationRow};

use crate::error::IoError;

const MATCHED_FILL: u32 = 0xC6EFCE;
const MISMATCH_FILL: u32 = 0xFFC7CE;
const HEADER_FILL: u32 = 0xD9E1F2;

const MONEY_FORMAT: &str = "#,##0.00";
const VOLUME_FORMAT: &str = "#,##0.000";

pub const RECONCILIATION_SHEET: &str = "Reconciliation";
pub const WARNINGS_SHEET: &str = "Warnings";
pub const DIAGNOSTICS_SHEET: &str = "Diagnostics";

/// Write the full report as pretty-printed JSON.
pub fn write_json(report: &AuditReport, path: &Path) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| IoError::Report(format!("serialize report: {e}")))?;
    std::fs::write(path, json).map_err(|e| IoError::io(path, e))
}

/// Write the reconciliation workbook.
pub fn write_xlsx(report: &AuditReport, path: &Path) -> Result<(), IoError> {
    let mut workbook = Workbook::new();
    let styles = Styles::new();

    let sheet = workbook.add_worksheet().set_name(RECONCILIATION_SHEET).map_err(xlsx_err)?;
    write_reconciliation(sheet, &report.rows, &styles).map_err(xlsx_err)?;

    let sheet = workbook.add_worksheet().set_name(WARNINGS_SHEET).map_err(xlsx_err)?;
    write_warnings(sheet, report, &styles).map_err(xlsx_err)?;

    let sheet = workbook.add_worksheet().set_name(DIAGNOSTICS_SHEET).map_err(xlsx_err)?;
    write_diagnostics(sheet, report, &styles).map_err(xlsx_err)?;

    workbook
        .save(path)
        .map_err(|e| IoError::Report(format!("save {}: {e}", path.display())))?;
    log::info!("report written to {}", path.display());
    Ok(())
}

fn xlsx_err(e: XlsxError) -> IoError {
    IoError::Report(e.to_string())
}

struct RowStyle {
    text: Format,
    money: Format,
    volume: Format,
}

impl RowStyle {
    fn filled(rgb: u32) -> Self {
        let base = Format::new()
            .set_background_color(Color::RGB(rgb))
            .set_border(FormatBorder::Thin);
        Self {
            text: base.clone(),
            money: base.clone().set_num_format(MONEY_FORMAT),
            volume: base.set_num_format(VOLUME_FORMAT),
        }
    }
}

struct Styles {
    header: Format,
    matched: RowStyle,
    mismatch: RowStyle,
    plain: RowStyle,
}

impl Styles {
    fn new() -> Self {
        let plain = Format::new();
        Self {
            header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(HEADER_FILL))
                .set_border(FormatBorder::Thin),
            matched: RowStyle::filled(MATCHED_FILL),
            mismatch: RowStyle::filled(MISMATCH_FILL),
            plain: RowStyle {
                text: plain.clone(),
                money: plain.clone().set_num_format(MONEY_FORMAT),
                volume: plain.set_num_format(VOLUME_FORMAT),
            },
        }
    }
}

fn write_header(sheet: &mut Worksheet, headers: &[&str], styles: &Styles) -> Result<(), XlsxError> {
    for (col, title) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &styles.header)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn num(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

const RECONCILIATION_HEADERS: &[&str] = &[
    "Note",
    "Entity",
    "Kind",
    "Period",
    "Source files",
    "Volume (doc)",
    "Gross (doc)",
    "ICMS (doc)",
    "PIS (doc)",
    "COFINS (doc)",
    "Net (calculated)",
    "Volume (ledger)",
    "Net (ledger)",
    "ICMS (ledger)",
    "PIS (ledger)",
    "COFINS (ledger)",
    "Volume diff",
    "Net diff",
    "Status",
    "Observations",
];

fn write_reconciliation(
    sheet: &mut Worksheet,
    rows: &[ReconciliationRow],
    styles: &Styles,
) -> Result<(), XlsxError> {
    write_header(sheet, RECONCILIATION_HEADERS, styles)?;

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        let style = if row.status.is_matched() {
            &styles.matched
        } else {
            &styles.mismatch
        };

        let texts = [
            row.note_number.clone(),
            row.entity.clone().unwrap_or_default(),
            row.kind.map(|k| k.to_string()).unwrap_or_default(),
            row.period_label.clone().unwrap_or_default(),
            row.source_files.join(", "),
        ];
        for (col, text) in texts.iter().enumerate() {
            sheet.write_string_with_format(r, col as u16, text, &style.text)?;
        }

        let numbers = [
            (row.volume_document, &style.volume),
            (row.gross_document, &style.money),
            (row.icms_document, &style.money),
            (row.pis_document, &style.money),
            (row.cofins_document, &style.money),
            (row.net_amount_calculated, &style.money),
            (row.volume_ledger, &style.volume),
            (row.net_ledger, &style.money),
            (row.icms_ledger, &style.money),
            (row.pis_ledger, &style.money),
            (row.cofins_ledger, &style.money),
        ];
        for (offset, (value, format)) in numbers.iter().enumerate() {
            sheet.write_number_with_format(r, (5 + offset) as u16, num(*value), format)?;
        }

        match row.volume_difference {
            Some(d) => sheet.write_number_with_format(r, 16, num(d), &style.volume)?,
            None => sheet.write_string_with_format(r, 16, "-", &style.text)?,
        };
        sheet.write_number_with_format(r, 17, num(row.net_difference), &style.money)?;
        sheet.write_string_with_format(r, 18, row.status.as_str(), &style.text)?;
        sheet.write_string_with_format(r, 19, row.observations_text(), &style.text)?;
    }

    sheet.set_column_width(0, 12)?;
    sheet.set_column_width(4, 30)?;
    sheet.set_column_range_width(5, 17, 15)?;
    sheet.set_column_width(18, 24)?;
    sheet.set_column_width(19, 60)?;
    Ok(())
}

fn write_warnings(sheet: &mut Worksheet, report: &AuditReport, styles: &Styles) -> Result<(), XlsxError> {
    write_header(
        sheet,
        &["Warning", "Note", "Period", "Ledger row", "Net (ledger)", "Volume (ledger)"],
        styles,
    )?;

    let plain = &styles.plain;
    let mut r: u32 = 1;
    for dup in &report.duplicates {
        sheet.write_string_with_format(r, 0, "Duplicate ledger row", &plain.text)?;
        sheet.write_string_with_format(r, 1, &dup.note_number, &plain.text)?;
        sheet.write_string_with_format(r, 2, &dup.period_label, &plain.text)?;
        sheet.write_number_with_format(r, 3, dup.row_number as f64, &plain.text)?;
        sheet.write_number_with_format(r, 4, num(dup.net_ledger), &plain.money)?;
        sheet.write_number_with_format(r, 5, num(dup.volume_ledger), &plain.volume)?;
        r += 1;
    }
    for missing in &report.missing_documents {
        sheet.write_string_with_format(r, 0, "Missing document", &plain.text)?;
        sheet.write_string_with_format(r, 1, &missing.note_number, &plain.text)?;
        sheet.write_string_with_format(
            r,
            2,
            missing.period_label.as_deref().unwrap_or_default(),
            &plain.text,
        )?;
        sheet.write_number_with_format(r, 4, num(missing.net_ledger), &plain.money)?;
        sheet.write_number_with_format(r, 5, num(missing.volume_ledger), &plain.volume)?;
        r += 1;
    }

    sheet.set_column_width(0, 22)?;
    sheet.set_column_range_width(1, 5, 15)?;
    Ok(())
}

fn write_diagnostics(sheet: &mut Worksheet, report: &AuditReport, styles: &Styles) -> Result<(), XlsxError> {
    write_header(sheet, &["Problem", "Entity", "File", "Detail"], styles)?;

    let text = &styles.plain.text;
    let mut r: u32 = 1;
    for failure in &report.parse_failures {
        sheet.write_string_with_format(r, 0, "Unreadable document", text)?;
        sheet.write_string_with_format(r, 1, &failure.entity, text)?;
        sheet.write_string_with_format(r, 2, &failure.source_file, text)?;
        sheet.write_string_with_format(r, 3, &failure.reason, text)?;
        r += 1;
    }
    for file in &report.unnumbered_documents {
        sheet.write_string_with_format(r, 0, "No note number", text)?;
        sheet.write_string_with_format(r, 2, file, text)?;
        r += 1;
    }

    sheet.set_column_width(0, 22)?;
    sheet.set_column_range_width(1, 2, 28)?;
    sheet.set_column_width(3, 60)?;
    Ok(())
}
