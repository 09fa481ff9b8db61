use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::Serialize;

use crate::models::HoldingRecord;

/// Band for the standalone sum check, looser than the extraction-time
/// tolerance: this report is for human review of already-accepted data.
const SUM_CHECK_LOW: f64 = 95.0;
const SUM_CHECK_HIGH: f64 = 105.0;

const ISIN_PATTERN: &str = r"^[A-Z]{2}[A-Z0-9]{9}[0-9]$";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemeSum {
    pub scheme_name: String,
    pub summed_percentage: f64,
}

/// Data-quality summary over a consolidated record set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    pub total_records: usize,
    pub incomplete_records: usize,
    pub invalid_isins: Vec<String>,
    pub out_of_range_percentages: usize,
    pub negative_market_values: usize,
    pub outlier_schemes: Vec<SchemeSum>,
    pub duplicate_holdings: Vec<(String, String)>,
    pub missing_value_counts: BTreeMap<String, usize>,
    pub issues: Vec<String>,
}

impl QualityReport {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Run every check over the record set.
pub fn run_quality_checks(records: &[HoldingRecord]) -> QualityReport {
    let mut report = QualityReport {
        total_records: records.len(),
        ..QualityReport::default()
    };

    check_required_fields(records, &mut report);
    check_isin_format(records, &mut report);
    check_numeric_ranges(records, &mut report);
    check_scheme_sums(records, &mut report);
    check_duplicates(records, &mut report);
    count_missing_values(records, &mut report);

    report
}

/// The record type guarantees the required fields exist; this catches
/// the ones that made it through as blank strings.
fn check_required_fields(records: &[HoldingRecord], report: &mut QualityReport) {
    report.incomplete_records = records
        .iter()
        .filter(|r| {
            r.amc_name.trim().is_empty()
                || r.scheme_name.trim().is_empty()
                || r.instrument_name.trim().is_empty()
        })
        .count();
    if report.incomplete_records > 0 {
        report.issues.push(format!(
            "{} records with a blank required field",
            report.incomplete_records
        ));
    }
}

fn check_isin_format(records: &[HoldingRecord], report: &mut QualityReport) {
    let isin_re = Regex::new(ISIN_PATTERN).expect("static regex");
    for rec in records {
        if let Some(isin) = &rec.isin {
            if !isin_re.is_match(isin) {
                report.invalid_isins.push(isin.clone());
            }
        }
    }
    if !report.invalid_isins.is_empty() {
        report
            .issues
            .push(format!("{} invalid ISIN codes", report.invalid_isins.len()));
    }
}

fn check_numeric_ranges(records: &[HoldingRecord], report: &mut QualityReport) {
    for rec in records {
        if let Some(p) = rec.percentage_of_portfolio {
            if !(0.0..=100.0).contains(&p) {
                report.out_of_range_percentages += 1;
            }
        }
        if let Some(v) = rec.market_value {
            if v < 0.0 {
                report.negative_market_values += 1;
            }
        }
    }
    if report.out_of_range_percentages > 0 {
        report.issues.push(format!(
            "{} holdings with percentage outside 0-100",
            report.out_of_range_percentages
        ));
    }
    if report.negative_market_values > 0 {
        report.issues.push(format!(
            "{} holdings with negative market value",
            report.negative_market_values
        ));
    }
}

fn check_scheme_sums(records: &[HoldingRecord], report: &mut QualityReport) {
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for rec in records {
        if let Some(p) = rec.percentage_of_portfolio {
            *sums.entry(rec.scheme_name.as_str()).or_insert(0.0) += p;
        }
    }
    for (scheme, sum) in sums {
        if !(SUM_CHECK_LOW..=SUM_CHECK_HIGH).contains(&sum) {
            report.outlier_schemes.push(SchemeSum {
                scheme_name: scheme.to_string(),
                summed_percentage: sum,
            });
        }
    }
    if !report.outlier_schemes.is_empty() {
        report.issues.push(format!(
            "{} schemes with unusual portfolio sum",
            report.outlier_schemes.len()
        ));
    }
}

fn check_duplicates(records: &[HoldingRecord], report: &mut QualityReport) {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut flagged: HashSet<(&str, &str)> = HashSet::new();
    for rec in records {
        let key = (rec.scheme_name.as_str(), rec.instrument_name.as_str());
        if !seen.insert(key) && flagged.insert(key) {
            report
                .duplicate_holdings
                .push((key.0.to_string(), key.1.to_string()));
        }
    }
    if !report.duplicate_holdings.is_empty() {
        report.issues.push(format!(
            "{} duplicated (scheme, instrument) pairs",
            report.duplicate_holdings.len()
        ));
    }
}

fn count_missing_values(records: &[HoldingRecord], report: &mut QualityReport) {
    let mut count = |field: &str, n: usize| {
        if n > 0 {
            report.missing_value_counts.insert(field.to_string(), n);
        }
    };
    count("isin", records.iter().filter(|r| r.isin.is_none()).count());
    count(
        "industry_rating",
        records.iter().filter(|r| r.industry_rating.is_none()).count(),
    );
    count(
        "quantity",
        records.iter().filter(|r| r.quantity.is_none()).count(),
    );
    count(
        "market_value",
        records.iter().filter(|r| r.market_value.is_none()).count(),
    );
    count(
        "percentage_of_portfolio",
        records
            .iter()
            .filter(|r| r.percentage_of_portfolio.is_none())
            .count(),
    );
}

/// Human-readable report, printed by the CLI after extraction.
pub fn print_report(report: &QualityReport) {
    println!("\n📋 Data quality report ({} records)", report.total_records);
    if report.passed() {
        println!("✅ All validation checks passed");
    } else {
        for issue in &report.issues {
            println!("⚠️  {}", issue);
        }
    }
    if !report.missing_value_counts.is_empty() {
        println!("   Missing values:");
        for (field, n) in &report.missing_value_counts {
            println!("   • {}: {}", field, n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstrumentType;
    use chrono::NaiveDate;

    fn record(scheme: &str, name: &str, isin: Option<&str>, pct: Option<f64>) -> HoldingRecord {
        HoldingRecord {
            amc_name: "Axis Mutual Fund".to_string(),
            scheme_name: scheme.to_string(),
            instrument_name: name.to_string(),
            instrument_type: InstrumentType::Equity,
            isin: isin.map(|s| s.to_string()),
            industry_rating: None,
            quantity: Some(10.0),
            market_value: Some(20.0),
            percentage_of_portfolio: pct,
            reporting_date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        }
    }

    #[test]
    fn test_clean_records_pass() {
        let records = vec![
            record("S", "A", Some("INE154A01025"), Some(60.0)),
            record("S", "B", Some("INE062A01020"), Some(40.0)),
        ];
        let report = run_quality_checks(&records);
        assert!(report.passed());
        assert!(report.invalid_isins.is_empty());
        assert!(report.outlier_schemes.is_empty());
        assert!(report.duplicate_holdings.is_empty());
    }

    #[test]
    fn test_blank_required_field_counted() {
        let mut bad = record("S", "A", Some("INE154A01025"), Some(100.0));
        bad.scheme_name = "  ".to_string();
        let report = run_quality_checks(&[bad]);
        assert_eq!(report.incomplete_records, 1);
        assert!(!report.passed());
    }

    #[test]
    fn test_invalid_isin_flagged() {
        let records = vec![record("S", "A", Some("NOT-AN-ISIN"), Some(100.0))];
        let report = run_quality_checks(&records);
        assert_eq!(report.invalid_isins, vec!["NOT-AN-ISIN".to_string()]);
        assert!(!report.passed());
    }

    #[test]
    fn test_out_of_range_percentage_counted() {
        let records = vec![
            record("S", "A", Some("INE154A01025"), Some(104.0)),
            record("S", "B", Some("INE062A01020"), Some(-4.0)),
        ];
        let report = run_quality_checks(&records);
        assert_eq!(report.out_of_range_percentages, 2);
        // 104 - 4 = 100, so the scheme sum itself is fine.
        assert!(report.outlier_schemes.is_empty());
    }

    #[test]
    fn test_outlier_scheme_sum_flagged() {
        let records = vec![record("S", "A", Some("INE154A01025"), Some(50.0))];
        let report = run_quality_checks(&records);
        assert_eq!(report.outlier_schemes.len(), 1);
        assert_eq!(report.outlier_schemes[0].summed_percentage, 50.0);
    }

    #[test]
    fn test_duplicates_reported_once_per_pair() {
        let records = vec![
            record("S", "A", Some("INE154A01025"), Some(40.0)),
            record("S", "A", Some("INE154A01025"), Some(30.0)),
            record("S", "A", Some("INE154A01025"), Some(30.0)),
        ];
        let report = run_quality_checks(&records);
        assert_eq!(
            report.duplicate_holdings,
            vec![("S".to_string(), "A".to_string())]
        );
    }

    #[test]
    fn test_missing_values_counted() {
        let records = vec![
            record("S", "A", None, Some(60.0)),
            record("S", "B", Some("INE062A01020"), None),
        ];
        let report = run_quality_checks(&records);
        assert_eq!(report.missing_value_counts.get("isin"), Some(&1));
        assert_eq!(
            report.missing_value_counts.get("percentage_of_portfolio"),
            Some(&1)
        );
        assert_eq!(report.missing_value_counts.get("quantity"), None);
    }
}
