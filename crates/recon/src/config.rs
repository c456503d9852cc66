use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::model::DocumentKind;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuditConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Restrict the run to ledger sheets whose name contains this token.
    #[serde(default)]
    pub period_filter: Option<String>,
    /// Emit a `PARSE_ERROR` row per unreadable document instead of only
    /// listing it under the report diagnostics.
    #[serde(default)]
    pub surface_parse_errors: bool,
    #[serde(default)]
    pub ledger: LedgerSelection,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
}

fn default_name() -> String {
    "fiscal audit".into()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            period_filter: None,
            surface_parse_errors: false,
            ledger: LedgerSelection::default(),
            tolerance: ToleranceConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger sheet selection
// ---------------------------------------------------------------------------

/// Which ledger sheets are read. A sheet is kept when its name contains the
/// year token and at least one of the period tokens (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LedgerSelection {
    #[serde(default = "default_target_year")]
    pub target_year: String,
    #[serde(default = "default_target_periods")]
    pub target_periods: Vec<String>,
}

fn default_target_year() -> String {
    "25".into()
}

fn default_target_periods() -> Vec<String> {
    vec!["OUT".into(), "NOV".into(), "DEZ".into()]
}

impl Default for LedgerSelection {
    fn default() -> Self {
        Self {
            target_year: default_target_year(),
            target_periods: default_target_periods(),
        }
    }
}

impl LedgerSelection {
    pub fn accepts_sheet(&self, sheet_name: &str) -> bool {
        let upper = sheet_name.to_uppercase();
        upper.contains(&self.target_year.to_uppercase())
            && self
                .target_periods
                .iter()
                .any(|p| upper.contains(&p.to_uppercase()))
    }
}

// ---------------------------------------------------------------------------
// Tolerance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToleranceConfig {
    /// Net value tolerance for freight bills (CT-e).
    #[serde(default = "default_freight")]
    pub freight: Decimal,
    /// Net value tolerance for goods invoices (NF-e).
    #[serde(default = "default_goods")]
    pub goods: Decimal,
    #[serde(default = "default_volume")]
    pub volume: Decimal,
}

fn default_freight() -> Decimal {
    Decimal::from(50)
}

fn default_goods() -> Decimal {
    Decimal::from(5)
}

fn default_volume() -> Decimal {
    Decimal::from(1)
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            freight: default_freight(),
            goods: default_goods(),
            volume: default_volume(),
        }
    }
}

impl ToleranceConfig {
    pub fn value_tolerance(&self, kind: DocumentKind) -> Decimal {
        match kind {
            DocumentKind::Cte => self.freight,
            DocumentKind::Nfe => self.goods,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AuditConfig {
    pub fn from_toml(input: &str) -> Result<Self, AuditError> {
        let config: AuditConfig =
            toml::from_str(input).map_err(|e| AuditError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, AuditError> {
        toml::to_string_pretty(self).map_err(|e| AuditError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        if self.ledger.target_year.trim().is_empty() {
            return Err(AuditError::ConfigValidation(
                "ledger.target_year must not be empty".into(),
            ));
        }

        if self.ledger.target_periods.iter().all(|p| p.trim().is_empty()) {
            return Err(AuditError::ConfigValidation(
                "ledger.target_periods needs at least one non-empty token".into(),
            ));
        }

        if let Some(ref period) = self.period_filter {
            if period.trim().is_empty() {
                return Err(AuditError::ConfigValidation(
                    "period_filter must not be empty when set".into(),
                ));
            }
        }

        for (label, value) in [
            ("freight", self.tolerance.freight),
            ("goods", self.tolerance.goods),
            ("volume", self.tolerance.volume),
        ] {
            if value.is_sign_negative() {
                return Err(AuditError::ConfigValidation(format!(
                    "tolerance.{label} must not be negative, got {value}"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const FULL: &str = r#"
name = "October close"
period_filter = "OUT"

[ledger]
target_year = "25"
target_periods = ["OUT", "NOV"]

[tolerance]
freight = 40.0
goods = 2.5
volume = 0.5
"#;

    #[test]
    fn parse_full() {
        let config = AuditConfig::from_toml(FULL).unwrap();
        assert_eq!(config.name, "October close");
        assert_eq!(config.period_filter.as_deref(), Some("OUT"));
        assert_eq!(config.ledger.target_periods, vec!["OUT", "NOV"]);
        assert_eq!(config.tolerance.freight, Decimal::from(40));
        assert_eq!(config.tolerance.goods, Decimal::from_str("2.5").unwrap());
        assert_eq!(config.tolerance.volume, Decimal::from_str("0.5").unwrap());
        assert!(!config.surface_parse_errors);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = AuditConfig::from_toml("").unwrap();
        assert_eq!(config, AuditConfig::default());
        assert_eq!(config.tolerance.freight, Decimal::from(50));
        assert_eq!(config.tolerance.goods, Decimal::from(5));
        assert_eq!(config.tolerance.volume, Decimal::from(1));
        assert_eq!(config.ledger.target_year, "25");
    }

    #[test]
    fn partial_tolerance_section() {
        let config = AuditConfig::from_toml("[tolerance]\ngoods = 1\n").unwrap();
        assert_eq!(config.tolerance.goods, Decimal::from(1));
        assert_eq!(config.tolerance.freight, Decimal::from(50));
    }

    #[test]
    fn reject_negative_tolerance() {
        let err = AuditConfig::from_toml("[tolerance]\nvolume = -1.0\n").unwrap_err();
        assert!(matches!(err, AuditError::ConfigValidation(_)));
        assert!(err.to_string().contains("tolerance.volume"));
    }

    #[test]
    fn reject_empty_year() {
        let err = AuditConfig::from_toml("[ledger]\ntarget_year = \" \"\n").unwrap_err();
        assert!(matches!(err, AuditError::ConfigValidation(_)));
    }

    #[test]
    fn reject_empty_periods() {
        let err = AuditConfig::from_toml("[ledger]\ntarget_periods = []\n").unwrap_err();
        assert!(matches!(err, AuditError::ConfigValidation(_)));
    }

    #[test]
    fn reject_unparseable() {
        let err = AuditConfig::from_toml("tolerance = [").unwrap_err();
        assert!(matches!(err, AuditError::ConfigParse(_)));
    }

    #[test]
    fn sheet_selection() {
        let sel = LedgerSelection::default();
        assert!(sel.accepts_sheet("25_OUT"));
        assert!(sel.accepts_sheet("nov 2025"));
        assert!(!sel.accepts_sheet("OUT_24"));
        assert!(!sel.accepts_sheet("25_JAN"));
    }

    #[test]
    fn tolerance_by_kind() {
        let tol = ToleranceConfig::default();
        assert_eq!(tol.value_tolerance(DocumentKind::Cte), Decimal::from(50));
        assert_eq!(tol.value_tolerance(DocumentKind::Nfe), Decimal::from(5));
    }

    #[test]
    fn toml_round_trip() {
        let config = AuditConfig::from_toml(FULL).unwrap();
        let text = config.to_toml().unwrap();
        assert_eq!(AuditConfig::from_toml(&text).unwrap(), config);
    }
}
