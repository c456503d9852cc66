//! Best-effort normalization of noisy ledger and document tokens.
//!
//! Nothing in here fails: malformed input yields `Decimal::ZERO` or an empty
//! note number, so a single bad cell never blocks a report.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// A raw value as read from a spreadsheet cell or a document field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'a> {
    Blank,
    Number(f64),
    Text(&'a str),
}

impl<'a> From<&'a str> for Token<'a> {
    fn from(s: &'a str) -> Self {
        Token::Text(s)
    }
}

impl<'a> From<&'a String> for Token<'a> {
    fn from(s: &'a String) -> Self {
        Token::Text(s.as_str())
    }
}

impl<'a> From<Option<&'a str>> for Token<'a> {
    fn from(s: Option<&'a str>) -> Self {
        s.map_or(Token::Blank, Token::Text)
    }
}

impl From<f64> for Token<'_> {
    fn from(n: f64) -> Self {
        Token::Number(n)
    }
}

impl From<i64> for Token<'_> {
    fn from(n: i64) -> Self {
        Token::Number(n as f64)
    }
}

impl Token<'_> {
    /// Whether the cell carries anything. Blank strings and a literal `NaN`
    /// (left behind by earlier spreadsheet exports) count as empty.
    pub fn has_content(&self) -> bool {
        match self {
            Token::Blank => false,
            Token::Number(n) => !n.is_nan(),
            Token::Text(s) => {
                let s = s.trim();
                !s.is_empty() && !s.eq_ignore_ascii_case("nan")
            }
        }
    }
}

fn plain_decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?(\d+\.?\d*|\.\d+)$").expect("static regex"))
}

fn digit_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

/// Convert an `f64` to `Decimal` through its shortest round-trip text, so
/// `0.1` becomes `0.1` and not the binary expansion.
pub fn decimal_from_f64(n: f64) -> Decimal {
    if !n.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_str(&n.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(n))
        .unwrap_or(Decimal::ZERO)
}

/// Parse a monetary/quantity token into a decimal.
///
/// Text handling follows the Brazilian convention: `1.234,56` is
/// 1234.56, a lone comma is the decimal point, and repeated commas are all
/// thousands separators except the last.
pub fn normalize_number<'a>(token: impl Into<Token<'a>>) -> Decimal {
    match token.into() {
        Token::Blank => Decimal::ZERO,
        Token::Number(n) => decimal_from_f64(n),
        Token::Text(s) => parse_amount_text(s),
    }
}

fn parse_amount_text(s: &str) -> Decimal {
    let mut clean: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if clean.is_empty() {
        return Decimal::ZERO;
    }

    if clean.matches(',').count() > 1 {
        if let Some((int_part, dec_part)) = clean.rsplit_once(',') {
            clean = format!("{}.{}", int_part.replace(',', ""), dec_part);
        }
    }

    let mut kept: String = clean
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    if kept.contains(',') {
        if kept.contains('.') {
            kept = kept.replace('.', "");
        }
        kept = kept.replace(',', ".");
    }

    if !plain_decimal_re().is_match(&kept) {
        return Decimal::ZERO;
    }

    let (sign, body) = match kept.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", kept.as_str()),
    };
    let body = body.trim_end_matches('.');
    let body = if body.starts_with('.') {
        format!("0{body}")
    } else {
        body.to_string()
    };

    Decimal::from_str(&format!("{sign}{body}"))
        .map(|d| d.normalize())
        .unwrap_or(Decimal::ZERO)
}

/// Strip leading zeros from a digit string; an all-zero string becomes "0".
fn strip_leading_zeros(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Canonical note number of a ledger cell.
///
/// Suffixes after `-` or `/` (series, check digits) are discarded, periods
/// used as thousands separators are ignored and the first run of digits is
/// returned without leading zeros. Returns "" when no digits are present.
pub fn normalize_note_number<'a>(token: impl Into<Token<'a>>) -> String {
    let text = match token.into() {
        Token::Blank => return String::new(),
        Token::Number(n) if !n.is_finite() => return String::new(),
        Token::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        Token::Number(n) => n.to_string(),
        Token::Text(s) => s.to_string(),
    };

    let upper = text.trim().to_uppercase();
    if upper.is_empty() {
        return String::new();
    }
    let head = upper.split('-').next().unwrap_or("");
    let head = head.split('/').next().unwrap_or("");
    let compact = head.replace('.', "");

    digit_run_re()
        .find(&compact)
        .map(|m| strip_leading_zeros(m.as_str()))
        .unwrap_or_default()
}

/// Canonical note number of a document identification field: every digit
/// is kept, leading zeros removed.
pub fn canonical_digits(text: &str) -> String {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        String::new()
    } else {
        strip_leading_zeros(&digits)
    }
}

/// Net amount: gross minus every tax component that lies strictly between
/// zero and gross, floored at zero.
pub fn net_amount(gross: Decimal, taxes: &[Decimal]) -> Decimal {
    let deductible: Decimal = taxes
        .iter()
        .filter(|t| **t > Decimal::ZERO && **t < gross)
        .fold(Decimal::ZERO, |acc, t| acc.saturating_add(*t));
    (gross - deductible).max(Decimal::ZERO)
}
