use calamine::{Data, Range};
use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::cells::{cell_str, normalize, parse_date_cell, parse_date_string};
use crate::consolidate::PortfolioXlsxParser;
use crate::header::{find_header_row, ColumnMapping};
use crate::models::{HoldingRecord, InstrumentType, TotalsCheckpoint};
use crate::rows::{classify_row, extract_record, RowKind};

/// Working state for one sheet's extraction pass. Owned by that pass
/// alone and discarded when the sheet ends; nothing here is shared
/// across sheets.
#[derive(Debug, Clone)]
pub struct SheetContext {
    pub sheet_name: String,
    pub scheme_name: String,
    pub reporting_date: NaiveDate,
    pub section: InstrumentType,
    pub section_seen: bool,
    pub mapping: ColumnMapping,
}

/// What one sheet produced: either records plus the bookkeeping that
/// goes with them, or the reason it was skipped.
#[derive(Debug)]
pub enum SheetOutcome {
    Extracted {
        scheme_name: String,
        records: Vec<HoldingRecord>,
        totals_checkpoints: Vec<TotalsCheckpoint>,
        warnings: Vec<String>,
    },
    Skipped {
        reason: String,
    },
}

impl PortfolioXlsxParser {
    /// Run the per-sheet pass: find the header, pull scheme name and
    /// reporting date from the rows above it, then walk the data region
    /// classifying and extracting each row.
    pub(crate) fn extract_sheet(&self, sheet_name: &str, range: &Range<Data>) -> SheetOutcome {
        let Some(header) = find_header_row(range, self.header_match_threshold) else {
            return SheetOutcome::Skipped {
                reason: "header not found".to_string(),
            };
        };

        let mut warnings: Vec<String> = header
            .warnings
            .iter()
            .map(|w| format!("sheet '{}': {}", sheet_name, w))
            .collect();

        let scheme_name = find_scheme_name(range, header.row, sheet_name, &self.amc_name);
        let reporting_date = find_reporting_date(
            range,
            header.row,
            self.reporting_date_hint,
            sheet_name,
            &mut warnings,
        );

        let mut ctx = SheetContext {
            sheet_name: sheet_name.to_string(),
            scheme_name,
            reporting_date,
            section: InstrumentType::Other,
            section_seen: false,
            mapping: header.mapping,
        };

        let mut records = Vec::new();
        let mut totals_checkpoints = Vec::new();

        for (row_idx, row) in range.rows().enumerate().skip(header.row + 1) {
            match classify_row(row, &ctx.mapping) {
                RowKind::Empty | RowKind::Noise => {}
                RowKind::Totals {
                    declared_percentage,
                } => totals_checkpoints.push(TotalsCheckpoint {
                    scheme_name: ctx.scheme_name.clone(),
                    declared_percentage,
                }),
                RowKind::SectionMarker(section) => {
                    ctx.section = section;
                    ctx.section_seen = true;
                }
                RowKind::Candidate => {
                    if let Some(rec) =
                        extract_record(row, &self.amc_name, &ctx, row_idx, &mut warnings)
                    {
                        records.push(rec);
                    }
                }
            }
        }

        if !records.is_empty() && !ctx.section_seen {
            warnings.push(format!(
                "sheet '{}': no section marker found; holdings tagged as Other",
                sheet_name
            ));
        }

        SheetOutcome::Extracted {
            scheme_name: ctx.scheme_name,
            records,
            totals_checkpoints,
            warnings,
        }
    }
}

/// Scheme title from the metadata rows above the header: the last cell
/// mentioning "fund" or "scheme" that is not the AMC's own name line.
/// Falls back to the sheet name.
fn find_scheme_name(
    range: &Range<Data>,
    header_row: usize,
    sheet_name: &str,
    amc_name: &str,
) -> String {
    let amc_norm = normalize(amc_name);
    let mut candidate: Option<String> = None;

    for row in range.rows().take(header_row) {
        for cell in row {
            let Some(s) = cell_str(Some(cell)) else {
                continue;
            };
            let trimmed = s.trim().to_string();
            let norm = normalize(&trimmed);
            if norm.is_empty() || norm == amc_norm {
                continue;
            }
            if norm.contains("fund") || norm.contains("scheme") {
                candidate = Some(trimmed);
            }
        }
    }

    candidate.unwrap_or_else(|| sheet_name.to_string())
}

fn month_from_name(s: &str) -> Option<u32> {
    let m = match s.to_lowercase().get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(m)
}

/// Date candidates embedded in free text, e.g. "Portfolio as on
/// December 31, 2025" or "as at 31/12/2025".
fn dates_in_text(text: &str, hint: NaiveDate) -> Vec<NaiveDate> {
    let numeric = Regex::new(r"\b(\d{1,2})[./-](\d{1,2})[./-](\d{4})\b").expect("static regex");
    let day_month = Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?[ \-]+([A-Za-z]{3,9})[ ,\-]*(\d{4})\b")
        .expect("static regex");
    let month_day =
        Regex::new(r"(?i)\b([A-Za-z]{3,9})[ ]+(\d{1,2})(?:st|nd|rd|th)?[ ,]+(\d{4})\b")
            .expect("static regex");
    let month_year = Regex::new(r"(?i)\b([A-Za-z]{3,9})[ ,\-]+(\d{4})\b").expect("static regex");

    let mut out = Vec::new();

    for cap in numeric.captures_iter(text) {
        if let (Ok(d), Ok(m), Ok(y)) = (cap[1].parse(), cap[2].parse(), cap[3].parse()) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                out.push(date);
            }
        }
    }
    for cap in day_month.captures_iter(text) {
        if let (Ok(d), Some(m), Ok(y)) = (cap[1].parse(), month_from_name(&cap[2]), cap[3].parse())
        {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                out.push(date);
            }
        }
    }
    for cap in month_day.captures_iter(text) {
        if let (Some(m), Ok(d), Ok(y)) = (month_from_name(&cap[1]), cap[2].parse(), cap[3].parse())
        {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                out.push(date);
            }
        }
    }
    // A bare "December 2025" only counts when it names the expected
    // reporting month; it then stands for the hint date itself.
    if out.is_empty() {
        for cap in month_year.captures_iter(text) {
            if let (Some(m), Ok(y)) = (month_from_name(&cap[1]), cap[2].parse::<i32>()) {
                if m == hint.month() && y == hint.year() {
                    out.push(hint);
                }
            }
        }
    }

    out
}

/// Reporting date from the metadata rows above the header, validated
/// against the expected reporting month. Cells that parse to a date in
/// the wrong month are flagged; a sheet with no date text at all
/// silently uses the hint (plenty of layouts put the header first).
fn find_reporting_date(
    range: &Range<Data>,
    header_row: usize,
    hint: NaiveDate,
    sheet_name: &str,
    warnings: &mut Vec<String>,
) -> NaiveDate {
    let mut candidates: Vec<NaiveDate> = Vec::new();

    for row in range.rows().take(header_row) {
        for cell in row {
            match cell {
                Data::DateTime(_) | Data::DateTimeIso(_) => {
                    if let Ok(d) = parse_date_cell(Some(cell)) {
                        candidates.push(d);
                    }
                }
                Data::String(s) => {
                    if let Ok(d) = parse_date_string(s) {
                        candidates.push(d);
                    } else {
                        candidates.extend(dates_in_text(s, hint));
                    }
                }
                _ => {}
            }
        }
    }

    if let Some(d) = candidates
        .iter()
        .find(|d| d.year() == hint.year() && d.month() == hint.month())
    {
        return *d;
    }

    if let Some(first) = candidates.first() {
        warnings.push(format!(
            "sheet '{}': extracted date {} does not match the expected reporting month; using {}",
            sheet_name, first, hint
        ));
    }

    hint
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
    }

    fn sheet_with_metadata() -> Range<Data> {
        let mut range: Range<Data> = Range::new((0, 0), (6, 5));
        range.set_value((0, 0), Data::String("Axis Mutual Fund".into()));
        range.set_value((1, 0), Data::String("Axis Bluechip Fund - Monthly Portfolio".into()));
        range.set_value((2, 0), Data::String("Portfolio as on December 31, 2025".into()));
        range.set_value((3, 0), Data::String("Name".into()));
        range.set_value((3, 1), Data::String("ISIN".into()));
        range.set_value((3, 2), Data::String("Quantity".into()));
        range.set_value((3, 3), Data::String("Market Value (Rs. in Lakhs)".into()));
        range.set_value((3, 4), Data::String("% to NAV".into()));
        range.set_value((4, 0), Data::String("EQUITY & EQUITY RELATED".into()));
        range.set_value((5, 0), Data::String("ITC Limited".into()));
        range.set_value((5, 1), Data::String("INE154A01025".into()));
        range.set_value((5, 2), Data::Float(35851.0));
        range.set_value((5, 3), Data::Float(144.48));
        range.set_value((5, 4), Data::Float(9.92));
        range.set_value((6, 0), Data::String("Grand Total".into()));
        range.set_value((6, 3), Data::Float(144.48));
        range.set_value((6, 4), Data::Float(9.92));
        range
    }

    #[test]
    fn test_scheme_name_from_metadata_rows() {
        let range = sheet_with_metadata();
        let name = find_scheme_name(&range, 3, "Sheet1", "Axis Mutual Fund");
        assert_eq!(name, "Axis Bluechip Fund - Monthly Portfolio");
    }

    #[test]
    fn test_scheme_name_falls_back_to_sheet_name() {
        let mut range: Range<Data> = Range::new((0, 0), (1, 1));
        range.set_value((0, 0), Data::String("Name".into()));
        range.set_value((0, 1), Data::String("ISIN".into()));
        let name = find_scheme_name(&range, 0, "Scheme A", "Axis Mutual Fund");
        assert_eq!(name, "Scheme A");
    }

    #[test]
    fn test_reporting_date_extracted_from_text() {
        let range = sheet_with_metadata();
        let mut warnings = Vec::new();
        let d = find_reporting_date(&range, 3, hint(), "Sheet1", &mut warnings);
        assert_eq!(d, hint());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_reporting_date_mismatch_warns_and_uses_hint() {
        let mut range: Range<Data> = Range::new((0, 0), (1, 1));
        range.set_value((0, 0), Data::String("as on 30/06/2024".into()));
        let mut warnings = Vec::new();
        let d = find_reporting_date(&range, 1, hint(), "Sheet1", &mut warnings);
        assert_eq!(d, hint());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("does not match"));
    }

    #[test]
    fn test_dates_in_text_variants() {
        let h = hint();
        assert_eq!(dates_in_text("as on 31/12/2025", h), vec![h]);
        assert_eq!(dates_in_text("as on 31st December 2025", h), vec![h]);
        assert_eq!(dates_in_text("December 31, 2025", h), vec![h]);
        assert_eq!(dates_in_text("Monthly portfolio for December 2025", h), vec![h]);
        assert!(dates_in_text("no dates here", h).is_empty());
    }
}
