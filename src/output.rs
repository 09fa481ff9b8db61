use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::{Diagnostics, HoldingRecord, InstrumentType};

const ALL_TYPES: [InstrumentType; 4] = [
    InstrumentType::Equity,
    InstrumentType::Debt,
    InstrumentType::MoneyMarket,
    InstrumentType::Other,
];

/// Column order of the consolidated CSV. The market value column name
/// carries the caller-supplied unit when one is given; the engine
/// itself never assumes one.
fn csv_header(unit: Option<&str>) -> Vec<String> {
    let market_value = match unit {
        Some(u) => format!("market_value_{}", u),
        None => "market_value".to_string(),
    };
    vec![
        "amc_name".to_string(),
        "scheme_name".to_string(),
        "instrument_name".to_string(),
        "instrument_type".to_string(),
        "isin".to_string(),
        "industry_rating".to_string(),
        "quantity".to_string(),
        market_value,
        "percentage_of_portfolio".to_string(),
        "reporting_date".to_string(),
    ]
}

fn opt_num(v: Option<f64>) -> String {
    // Absent stays an empty cell; it must never read back as zero.
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn csv_row(rec: &HoldingRecord) -> Vec<String> {
    vec![
        rec.amc_name.clone(),
        rec.scheme_name.clone(),
        rec.instrument_name.clone(),
        rec.instrument_type.label().to_string(),
        rec.isin.clone().unwrap_or_default(),
        rec.industry_rating.clone().unwrap_or_default(),
        opt_num(rec.quantity),
        opt_num(rec.market_value),
        opt_num(rec.percentage_of_portfolio),
        rec.reporting_date.format("%Y-%m-%d").to_string(),
    ]
}

fn write_records<P: AsRef<Path>>(
    records: &[&HoldingRecord],
    path: P,
    unit: Option<&str>,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating output dir: {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Creating {}", path.display()))?;
    writer.write_record(csv_header(unit))?;
    for rec in records {
        writer.write_record(csv_row(rec))?;
    }
    writer
        .flush()
        .with_context(|| format!("Writing {}", path.display()))?;
    Ok(())
}

/// Write the consolidated CSV.
pub fn write_csv<P: AsRef<Path>>(
    records: &[HoldingRecord],
    path: P,
    unit: Option<&str>,
) -> Result<()> {
    let refs: Vec<&HoldingRecord> = records.iter().collect();
    write_records(&refs, path, unit)
}

fn type_filename(instrument_type: InstrumentType) -> String {
    format!(
        "portfolio_{}.csv",
        instrument_type.label().to_lowercase().replace(' ', "_")
    )
}

/// One CSV per instrument type that actually has records, named
/// portfolio_equity.csv, portfolio_money_market.csv, and so on.
pub fn write_csv_by_type<P: AsRef<Path>>(
    records: &[HoldingRecord],
    dir: P,
    unit: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut written = Vec::new();
    for instrument_type in ALL_TYPES {
        let subset: Vec<&HoldingRecord> = records
            .iter()
            .filter(|r| r.instrument_type == instrument_type)
            .collect();
        if subset.is_empty() {
            continue;
        }
        let path = dir.join(type_filename(instrument_type));
        write_records(&subset, &path, unit)?;
        written.push(path);
    }
    Ok(written)
}

/// Diagnostics as pretty JSON next to the CSV, so a run's anomalies
/// survive the terminal scrollback.
pub fn write_diagnostics_json<P: AsRef<Path>>(diagnostics: &Diagnostics, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating output dir: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(diagnostics)?;
    fs::write(path, json).with_context(|| format!("Writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record() -> HoldingRecord {
        HoldingRecord {
            amc_name: "Axis Mutual Fund".to_string(),
            scheme_name: "Scheme A".to_string(),
            instrument_name: "ITC Limited".to_string(),
            instrument_type: InstrumentType::MoneyMarket,
            isin: Some("INE154A01025".to_string()),
            industry_rating: None,
            quantity: Some(35851.0),
            market_value: Some(144.48),
            percentage_of_portfolio: None,
            reporting_date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        }
    }

    #[test]
    fn test_header_carries_caller_unit() {
        let header = csv_header(Some("lakhs"));
        assert!(header.contains(&"market_value_lakhs".to_string()));
        let bare = csv_header(None);
        assert!(bare.contains(&"market_value".to_string()));
    }

    #[test]
    fn test_row_serialization_keeps_absent_cells_empty() {
        let row = csv_row(&record());
        assert_eq!(row[3], "Money Market");
        assert_eq!(row[5], ""); // industry_rating absent
        assert_eq!(row[6], "35851");
        assert_eq!(row[7], "144.48");
        assert_eq!(row[8], ""); // percentage absent, not zero
        assert_eq!(row[9], "2025-12-31");
    }

    #[test]
    fn test_type_filenames() {
        assert_eq!(type_filename(InstrumentType::Equity), "portfolio_equity.csv");
        assert_eq!(
            type_filename(InstrumentType::MoneyMarket),
            "portfolio_money_market.csv"
        );
    }

    #[test]
    fn test_header_and_row_have_same_arity() {
        assert_eq!(csv_header(None).len(), csv_row(&record()).len());
    }
}
