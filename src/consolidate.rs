use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::NaiveDate;

use crate::models::{
    Diagnostics, ExtractionResult, HoldingRecord, SkippedSheet, ToleranceViolation,
};
use crate::sheet::SheetOutcome;

pub const DEFAULT_PERCENTAGE_TOLERANCE: f64 = 2.0;
pub const DEFAULT_HEADER_MATCH_THRESHOLD: usize = 3;
pub const DEFAULT_SKIP_SHEET_KEYWORDS: &[&str] = &["index", "disclaimer", "summary", "cover"];

/// AMC-agnostic extractor for multi-sheet scheme portfolio workbooks.
///
/// One instance carries the caller-supplied configuration and can be
/// reused across workbooks; per-sheet state lives in the extraction
/// pass, never here.
pub struct PortfolioXlsxParser {
    pub amc_name: String,
    pub reporting_date_hint: NaiveDate,
    pub percentage_tolerance: f64,
    pub header_match_threshold: usize,
    pub skip_sheet_keywords: Vec<String>,
}

impl PortfolioXlsxParser {
    pub fn new(amc_name: impl Into<String>, reporting_date_hint: NaiveDate) -> Self {
        Self {
            amc_name: amc_name.into(),
            reporting_date_hint,
            percentage_tolerance: DEFAULT_PERCENTAGE_TOLERANCE,
            header_match_threshold: DEFAULT_HEADER_MATCH_THRESHOLD,
            skip_sheet_keywords: DEFAULT_SKIP_SHEET_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_percentage_tolerance(mut self, tolerance: f64) -> Self {
        self.percentage_tolerance = tolerance;
        self
    }

    pub fn with_header_match_threshold(mut self, threshold: usize) -> Self {
        self.header_match_threshold = threshold;
        self
    }

    pub fn with_skip_sheet_keywords(mut self, keywords: Vec<String>) -> Self {
        self.skip_sheet_keywords = keywords;
        self
    }

    /// Parse a workbook file. The only hard failure is a file that
    /// cannot be opened or decoded at all; everything else is absorbed
    /// into the diagnostics.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ExtractionResult> {
        let mut workbook: Xlsx<_> = open_workbook(&path)
            .with_context(|| format!("Cannot open {}", path.as_ref().display()))?;
        self.parse_workbook(&mut workbook)
    }

    /// Parse an already-opened workbook, decoding each sheet to a cell
    /// range first. Sheets that fail to decode are skipped with a
    /// diagnostic rather than aborting the run.
    pub fn parse_workbook<R: Read + Seek>(&self, workbook: &mut Xlsx<R>) -> Result<ExtractionResult> {
        let sheet_names = workbook.sheet_names().to_vec();

        let mut sheets: Vec<(String, Range<Data>)> = Vec::new();
        let mut unreadable: Vec<SkippedSheet> = Vec::new();
        for name in sheet_names {
            match workbook.worksheet_range(&name) {
                Ok(range) => sheets.push((name, range)),
                Err(e) => unreadable.push(SkippedSheet {
                    sheet_name: name,
                    reason: format!("unreadable sheet: {}", e),
                }),
            }
        }

        let mut result = self.parse_sheets(&sheets);
        result.diagnostics.skipped_sheets.extend(unreadable);
        Ok(result)
    }

    /// The pure core: run every eligible sheet through the per-sheet
    /// extractor, concatenate records in workbook order, then validate
    /// per-scheme percentage sums. Borrows the decoded sheets, so
    /// running it twice over the same input yields identical output.
    pub fn parse_sheets(&self, sheets: &[(String, Range<Data>)]) -> ExtractionResult {
        let mut records = Vec::new();
        let mut diagnostics = Diagnostics::default();

        for (sheet_name, range) in sheets {
            if self.is_excluded_sheet(sheet_name) {
                diagnostics.skipped_sheets.push(SkippedSheet {
                    sheet_name: sheet_name.clone(),
                    reason: "excluded by name pattern".to_string(),
                });
                continue;
            }

            match self.extract_sheet(sheet_name, range) {
                SheetOutcome::Skipped { reason } => {
                    diagnostics.skipped_sheets.push(SkippedSheet {
                        sheet_name: sheet_name.clone(),
                        reason,
                    });
                }
                SheetOutcome::Extracted {
                    scheme_name,
                    records: sheet_records,
                    totals_checkpoints,
                    warnings,
                } => {
                    *diagnostics.per_sheet_counts.entry(scheme_name).or_insert(0) +=
                        sheet_records.len();
                    diagnostics.totals_checkpoints.extend(totals_checkpoints);
                    diagnostics.warnings.extend(warnings);
                    records.extend(sheet_records);
                }
            }
        }

        self.validate_percentage_sums(&records, &mut diagnostics);

        ExtractionResult {
            records,
            diagnostics,
        }
    }

    fn is_excluded_sheet(&self, sheet_name: &str) -> bool {
        let lower = sheet_name.to_lowercase();
        self.skip_sheet_keywords
            .iter()
            .any(|k| lower.contains(&k.to_lowercase()))
    }

    /// Per-scheme percentage sums against 100, within the configured
    /// tolerance. Schemes whose rows carried no parseable percentages
    /// at all are not flagged here; the per-cell warnings already cover
    /// them.
    fn validate_percentage_sums(&self, records: &[HoldingRecord], diagnostics: &mut Diagnostics) {
        let mut sums: BTreeMap<&str, (f64, bool)> = BTreeMap::new();
        for rec in records {
            let entry = sums.entry(rec.scheme_name.as_str()).or_insert((0.0, false));
            if let Some(p) = rec.percentage_of_portfolio {
                entry.0 += p;
                entry.1 = true;
            }
        }

        let mut cross_check_warnings = Vec::new();
        for (scheme_name, (sum, any)) in &sums {
            if !any {
                continue;
            }
            if (sum - 100.0).abs() > self.percentage_tolerance {
                diagnostics.tolerance_violations.push(ToleranceViolation {
                    scheme_name: scheme_name.to_string(),
                    summed_percentage: *sum,
                });
            }

            // When the sheet itself declared a total, trust it as the
            // cross-check baseline.
            let declared = diagnostics
                .totals_checkpoints
                .iter()
                .filter(|c| c.scheme_name == *scheme_name)
                .filter_map(|c| c.declared_percentage)
                .fold(f64::NEG_INFINITY, f64::max);
            if declared.is_finite() && (declared - sum).abs() > self.percentage_tolerance {
                cross_check_warnings.push(format!(
                    "scheme '{}': extracted percentages sum to {:.2} but the sheet declares {:.2}",
                    scheme_name, sum, declared
                ));
            }
        }
        diagnostics.warnings.extend(cross_check_warnings);
    }
}
