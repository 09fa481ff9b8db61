use calamine::Data;

use crate::cells::{cell_str, is_blank, normalize, parse_number};
use crate::header::{CanonicalField, ColumnMapping};
use crate::models::{HoldingRecord, InstrumentType};
use crate::section::classify_section;
use crate::sheet::SheetContext;

/// Totals rows are matched by word prefix, not bare containment, so an
/// instrument like "TotalEnergies SE" is never mistaken for a subtotal.
const TOTAL_PATTERNS: &[&str] = &[
    "grand total",
    "sub total",
    "sub-total",
    "subtotal",
    "net assets",
    "total",
];

/// Structural noise the original documents sprinkle between holdings:
/// sub-group captions, receivables lines, footer boilerplate.
const NOISE_PATTERNS: &[&str] = &[
    "net current",
    "net receivable",
    "net payable",
    "awaiting listing",
    "privately placed",
    "unlisted",
    "benchmark",
    "risk-o-meter",
];

#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    Empty,
    Totals { declared_percentage: Option<f64> },
    SectionMarker(InstrumentType),
    Noise,
    Candidate,
}

fn is_totals_name(text: &str) -> bool {
    TOTAL_PATTERNS.iter().any(|p| {
        text.starts_with(p)
            && text[p.len()..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphanumeric())
    })
}

fn is_noise_name(text: &str) -> bool {
    NOISE_PATTERNS.iter().any(|p| text.contains(p))
}

fn name_equivalent_texts(row: &[Data], mapping: &ColumnMapping) -> Vec<String> {
    let mut texts = Vec::new();
    if let Some(idx) = mapping.get(CanonicalField::Name) {
        if let Some(s) = cell_str(row.get(idx)) {
            texts.push(normalize(&s));
        }
    }
    // Some sheets put "Grand Total" left of the name column.
    let first_non_blank = row.iter().find_map(|c| {
        let t = normalize(&cell_str(Some(c))?);
        if t.is_empty() {
            None
        } else {
            Some(t)
        }
    });
    if let Some(t) = first_non_blank {
        if !texts.contains(&t) {
            texts.push(t);
        }
    }
    texts.retain(|t| !t.is_empty());
    texts
}

/// Decide what a data-region row is. Checks run in order: blank,
/// totals, section marker, structural noise, candidate holding.
pub fn classify_row(row: &[Data], mapping: &ColumnMapping) -> RowKind {
    if row.iter().all(|c| is_blank(Some(c))) {
        return RowKind::Empty;
    }

    let names = name_equivalent_texts(row, mapping);
    if names.iter().any(|t| is_totals_name(t)) {
        let declared_percentage = mapping
            .get(CanonicalField::Percentage)
            .and_then(|idx| parse_number(row.get(idx)).ok());
        return RowKind::Totals { declared_percentage };
    }

    if let Some(section) = classify_section(row) {
        return RowKind::SectionMarker(section);
    }

    if names.iter().any(|t| is_noise_name(t)) {
        return RowKind::Noise;
    }

    RowKind::Candidate
}

fn text_field(row: &[Data], idx: Option<usize>) -> Option<String> {
    let s = cell_str(row.get(idx?))?;
    let t = s.trim().to_string();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

fn numeric_field(
    row: &[Data],
    idx: Option<usize>,
    field: &str,
    sheet_name: &str,
    row_idx: usize,
    warnings: &mut Vec<String>,
) -> Option<f64> {
    let idx = idx?;
    let cell = row.get(idx);
    if is_blank(cell) {
        return None;
    }
    match parse_number(cell) {
        Ok(v) => Some(v),
        Err(_) => {
            warnings.push(format!(
                "sheet '{}' row {}: unparseable {} cell {:?}, left absent",
                sheet_name,
                row_idx + 1,
                field,
                cell_str(cell).unwrap_or_default()
            ));
            None
        }
    }
}

/// Turn a candidate row into a holding record. Rows without a usable
/// instrument name, or with nothing but a name, yield no record.
pub fn extract_record(
    row: &[Data],
    amc_name: &str,
    ctx: &SheetContext,
    row_idx: usize,
    warnings: &mut Vec<String>,
) -> Option<HoldingRecord> {
    let mapping = &ctx.mapping;

    let instrument_name = text_field(row, mapping.get(CanonicalField::Name))?;
    if instrument_name.len() < 3 || !instrument_name.chars().any(|c| c.is_alphabetic()) {
        return None;
    }

    let isin = text_field(row, mapping.get(CanonicalField::Isin));
    let industry_rating = text_field(row, mapping.get(CanonicalField::IndustryRating));

    let quantity = numeric_field(
        row,
        mapping.get(CanonicalField::Quantity),
        "quantity",
        &ctx.sheet_name,
        row_idx,
        warnings,
    )
    .and_then(|v| {
        if v < 0.0 {
            warnings.push(format!(
                "sheet '{}' row {}: negative quantity {}, left absent",
                ctx.sheet_name,
                row_idx + 1,
                v
            ));
            None
        } else {
            Some(v)
        }
    });
    let market_value = numeric_field(
        row,
        mapping.get(CanonicalField::MarketValue),
        "market value",
        &ctx.sheet_name,
        row_idx,
        warnings,
    );
    let percentage_of_portfolio = numeric_field(
        row,
        mapping.get(CanonicalField::Percentage),
        "percentage",
        &ctx.sheet_name,
        row_idx,
        warnings,
    );

    // A name with no identifier and no figures is a stray title or
    // footnote line, not a holding.
    if isin.is_none()
        && industry_rating.is_none()
        && quantity.is_none()
        && market_value.is_none()
        && percentage_of_portfolio.is_none()
    {
        return None;
    }

    Some(HoldingRecord {
        amc_name: amc_name.to_string(),
        scheme_name: ctx.scheme_name.clone(),
        instrument_name,
        instrument_type: ctx.section,
        isin,
        industry_rating,
        quantity,
        market_value,
        percentage_of_portfolio,
        reporting_date: ctx.reporting_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::match_header_row;
    use chrono::NaiveDate;

    fn mapping() -> ColumnMapping {
        let header: Vec<Data> = [
            "Name",
            "ISIN",
            "Industry / Rating",
            "Quantity",
            "Market Value (Rs. in Lakhs)",
            "% to NAV",
        ]
        .iter()
        .map(|s| Data::String(s.to_string()))
        .collect();
        match_header_row(&header, 3).unwrap().0
    }

    fn ctx() -> SheetContext {
        SheetContext {
            sheet_name: "Scheme A".to_string(),
            scheme_name: "Scheme A".to_string(),
            reporting_date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            section: InstrumentType::Equity,
            section_seen: true,
            mapping: mapping(),
        }
    }

    fn holding_row() -> Vec<Data> {
        vec![
            Data::String("ITC Limited".into()),
            Data::String("INE154A01025".into()),
            Data::String("Consumer Non Durables".into()),
            Data::Float(35851.0),
            Data::Float(144.48),
            Data::Float(9.92),
        ]
    }

    #[test]
    fn test_blank_row_is_empty() {
        let row = vec![Data::Empty, Data::String("  ".into()), Data::Empty];
        assert_eq!(classify_row(&row, &mapping()), RowKind::Empty);
    }

    #[test]
    fn test_grand_total_row_is_totals_with_checkpoint() {
        let row = vec![
            Data::String("Grand Total".into()),
            Data::Empty,
            Data::Empty,
            Data::Empty,
            Data::Float(1456.2),
            Data::Float(100.0),
        ];
        assert_eq!(
            classify_row(&row, &mapping()),
            RowKind::Totals {
                declared_percentage: Some(100.0)
            }
        );
    }

    #[test]
    fn test_totalenergies_is_not_a_totals_row() {
        let mut row = holding_row();
        row[0] = Data::String("TotalEnergies SE".into());
        row[1] = Data::String("FR0000120271".into());
        assert_eq!(classify_row(&row, &mapping()), RowKind::Candidate);
    }

    #[test]
    fn test_marker_row_classified_as_section() {
        let row = vec![
            Data::String("DEBT INSTRUMENTS".into()),
            Data::Empty,
            Data::Empty,
            Data::Empty,
            Data::Empty,
            Data::Empty,
        ];
        assert_eq!(
            classify_row(&row, &mapping()),
            RowKind::SectionMarker(InstrumentType::Debt)
        );
    }

    #[test]
    fn test_subgroup_caption_is_noise() {
        let row = vec![
            Data::String("Listed / Awaiting listing on Stock Exchanges".into()),
            Data::Empty,
            Data::Empty,
            Data::Empty,
            Data::Empty,
            Data::Empty,
        ];
        assert_eq!(classify_row(&row, &mapping()), RowKind::Noise);
    }

    #[test]
    fn test_extracts_full_record() {
        let mut warnings = Vec::new();
        let rec = extract_record(&holding_row(), "Axis Mutual Fund", &ctx(), 5, &mut warnings)
            .expect("record expected");
        assert_eq!(rec.instrument_name, "ITC Limited");
        assert_eq!(rec.isin.as_deref(), Some("INE154A01025"));
        assert_eq!(rec.industry_rating.as_deref(), Some("Consumer Non Durables"));
        assert_eq!(rec.quantity, Some(35851.0));
        assert_eq!(rec.market_value, Some(144.48));
        assert_eq!(rec.percentage_of_portfolio, Some(9.92));
        assert_eq!(rec.instrument_type, InstrumentType::Equity);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unparseable_quantity_becomes_absent_with_warning() {
        let mut row = holding_row();
        row[3] = Data::String("N.A.".into());
        let mut warnings = Vec::new();
        let rec = extract_record(&row, "Axis Mutual Fund", &ctx(), 5, &mut warnings)
            .expect("record expected");
        assert_eq!(rec.quantity, None);
        assert_eq!(rec.market_value, Some(144.48));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("quantity"));
    }

    #[test]
    fn test_blank_numeric_cell_is_absent_without_warning() {
        let mut row = holding_row();
        row[3] = Data::Empty;
        let mut warnings = Vec::new();
        let rec = extract_record(&row, "Axis Mutual Fund", &ctx(), 5, &mut warnings)
            .expect("record expected");
        assert_eq!(rec.quantity, None);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_row_without_name_is_dropped() {
        let mut row = holding_row();
        row[0] = Data::Empty;
        let mut warnings = Vec::new();
        assert!(extract_record(&row, "Axis Mutual Fund", &ctx(), 5, &mut warnings).is_none());
    }

    #[test]
    fn test_name_only_footnote_is_dropped() {
        let row = vec![
            Data::String("The above portfolio is subject to change.".into()),
            Data::Empty,
            Data::Empty,
            Data::Empty,
            Data::Empty,
            Data::Empty,
        ];
        let mut warnings = Vec::new();
        assert!(extract_record(&row, "Axis Mutual Fund", &ctx(), 20, &mut warnings).is_none());
        assert!(warnings.is_empty());
    }
}
