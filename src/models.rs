use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

/// Asset-class bucket a holding row belongs to, as announced by the
/// section marker preceding it in the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InstrumentType {
    Equity,
    Debt,
    #[serde(rename = "Money Market")]
    MoneyMarket,
    Other,
}

impl InstrumentType {
    pub fn label(&self) -> &'static str {
        match self {
            InstrumentType::Equity => "Equity",
            InstrumentType::Debt => "Debt",
            InstrumentType::MoneyMarket => "Money Market",
            InstrumentType::Other => "Other",
        }
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One instrument position within one scheme.
///
/// Optional numeric fields stay `None` when the source cell is blank or
/// unparseable. A missing quantity is not the same thing as zero units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingRecord {
    pub amc_name: String,
    pub scheme_name: String,
    pub instrument_name: String,
    pub instrument_type: InstrumentType,
    pub isin: Option<String>,
    pub industry_rating: Option<String>,
    pub quantity: Option<f64>,
    pub market_value: Option<f64>,
    pub percentage_of_portfolio: Option<f64>,
    pub reporting_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSheet {
    pub sheet_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToleranceViolation {
    pub scheme_name: String,
    pub summed_percentage: f64,
}

/// Percentage declared by a total/grand-total row, kept so the summed
/// record percentages can be cross-checked against what the sheet claims.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalsCheckpoint {
    pub scheme_name: String,
    pub declared_percentage: Option<f64>,
}

/// Everything that went sideways during extraction, in one inspectable
/// place. Always returned, empty on a clean run, so callers (and tests)
/// can assert the absence of problems.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub skipped_sheets: Vec<SkippedSheet>,
    pub tolerance_violations: Vec<ToleranceViolation>,
    pub per_sheet_counts: BTreeMap<String, usize>,
    pub totals_checkpoints: Vec<TotalsCheckpoint>,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    /// True when nothing was skipped, flagged, or warned about.
    pub fn is_clean(&self) -> bool {
        self.skipped_sheets.is_empty()
            && self.tolerance_violations.is_empty()
            && self.warnings.is_empty()
    }
}

/// Consolidated output of a workbook run: records in sheet-then-row
/// order plus the diagnostics accumulated along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub records: Vec<HoldingRecord>,
    pub diagnostics: Diagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_type_labels() {
        assert_eq!(InstrumentType::Equity.label(), "Equity");
        assert_eq!(InstrumentType::MoneyMarket.label(), "Money Market");
        assert_eq!(InstrumentType::Other.to_string(), "Other");
    }

    #[test]
    fn test_diagnostics_default_is_clean() {
        let diag = Diagnostics::default();
        assert!(diag.is_clean());
    }

    #[test]
    fn test_diagnostics_with_warning_is_not_clean() {
        let mut diag = Diagnostics::default();
        diag.warnings.push("sheet 'X': something odd".to_string());
        assert!(!diag.is_clean());
    }

    #[test]
    fn test_money_market_serializes_with_space() {
        let json = serde_json::to_string(&InstrumentType::MoneyMarket).unwrap();
        assert_eq!(json, "\"Money Market\"");
    }
}
