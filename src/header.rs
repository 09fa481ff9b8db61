use std::collections::HashMap;

use calamine::{Data, Range};

use crate::cells::{cell_str, normalize};

/// Canonical output fields, independent of how the source document words
/// its column headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Name,
    Isin,
    Quantity,
    MarketValue,
    Percentage,
    IndustryRating,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Name => "name",
            CanonicalField::Isin => "isin",
            CanonicalField::Quantity => "quantity",
            CanonicalField::MarketValue => "market_value",
            CanonicalField::Percentage => "percentage_of_portfolio",
            CanonicalField::IndustryRating => "industry_rating",
        }
    }
}

/// Keyword groups per canonical field, in priority order. When two
/// fields would claim the same column, the earlier entry wins.
pub const FIELD_KEYWORDS: &[(CanonicalField, &[&str])] = &[
    (CanonicalField::Name, &["name", "instrument", "security", "particulars"]),
    (CanonicalField::Isin, &["isin"]),
    (CanonicalField::Quantity, &["quantity", "qty", "units", "no. of"]),
    (CanonicalField::MarketValue, &["market value", "mkt value", "value (", "value in"]),
    (CanonicalField::Percentage, &["% to nav", "% of", "weightage"]),
    (CanonicalField::IndustryRating, &["industry", "rating", "sector"]),
];

/// Canonical field -> zero-based column index for one sheet's header
/// row. Built once, immutable afterwards: a sheet is assumed to keep a
/// single consistent header layout.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    columns: HashMap<CanonicalField, usize>,
}

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn resolved_fields(&self) -> usize {
        self.columns.len()
    }
}

#[derive(Debug, Clone)]
pub struct HeaderMatch {
    pub row: usize,
    pub mapping: ColumnMapping,
    pub warnings: Vec<String>,
}

fn matches_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Decide whether one row is a header row. A row qualifies when at
/// least `threshold` cells match some keyword group and at least two
/// canonical fields resolve to distinct columns.
pub fn match_header_row(row: &[Data], threshold: usize) -> Option<(ColumnMapping, Vec<String>)> {
    let texts: Vec<String> = row
        .iter()
        .map(|c| cell_str(Some(c)).map(|s| normalize(&s)).unwrap_or_default())
        .collect();

    let matching_cells = texts
        .iter()
        .filter(|t| !t.is_empty() && FIELD_KEYWORDS.iter().any(|(_, kw)| matches_any(t, kw)))
        .count();
    if matching_cells < threshold {
        return None;
    }

    let mut columns: HashMap<CanonicalField, usize> = HashMap::new();
    let mut claimed: HashMap<usize, CanonicalField> = HashMap::new();
    let mut warnings = Vec::new();

    for (field, keywords) in FIELD_KEYWORDS {
        for (col, text) in texts.iter().enumerate() {
            if text.is_empty() || !matches_any(text, keywords) {
                continue;
            }
            if let Some(owner) = claimed.get(&col) {
                warnings.push(format!(
                    "column {} ({:?}) matched by both '{}' and '{}'; keeping '{}'",
                    col,
                    text,
                    owner.as_str(),
                    field.as_str(),
                    owner.as_str()
                ));
                continue;
            }
            columns.insert(*field, col);
            claimed.insert(col, *field);
            break;
        }
    }

    if columns.len() < 2 {
        return None;
    }

    Some((ColumnMapping { columns }, warnings))
}

/// Scan a sheet top to bottom for its header row. The first qualifying
/// row wins and the scan stops there.
pub fn find_header_row(range: &Range<Data>, threshold: usize) -> Option<HeaderMatch> {
    for (row_idx, row) in range.rows().enumerate() {
        if let Some((mapping, warnings)) = match_header_row(row, threshold) {
            return Some(HeaderMatch {
                row: row_idx,
                mapping,
                warnings,
            });
        }
    }
    None
}
