use calamine::Data;

use crate::cells::{cell_str, looks_like_isin, normalize, parse_number};
use crate::models::InstrumentType;

/// Marker labels in match order. Specific labels sit above generic ones
/// so "DEBT INSTRUMENTS" never falls through to "other"; the first
/// matching label decides the section.
pub const SECTION_LABELS: &[(&str, InstrumentType)] = &[
    ("equity & equity related", InstrumentType::Equity),
    ("equity and equity related", InstrumentType::Equity),
    ("equity shares", InstrumentType::Equity),
    ("equity", InstrumentType::Equity),
    ("debt instrument", InstrumentType::Debt),
    ("government securities", InstrumentType::Debt),
    ("government security", InstrumentType::Debt),
    ("corporate bond", InstrumentType::Debt),
    ("debenture", InstrumentType::Debt),
    ("money market instrument", InstrumentType::MoneyMarket),
    ("money market", InstrumentType::MoneyMarket),
    ("treps", InstrumentType::MoneyMarket),
    ("reverse repo", InstrumentType::MoneyMarket),
    ("treasury bill", InstrumentType::MoneyMarket),
    ("certificate of deposit", InstrumentType::MoneyMarket),
    ("commercial paper", InstrumentType::MoneyMarket),
    ("other instrument", InstrumentType::Other),
    ("others", InstrumentType::Other),
    ("other", InstrumentType::Other),
];

/// Leading cell text with trailing parentheticals and punctuation
/// dropped, so "EQUITY & EQUITY RELATED (Listed / Awaiting listing)"
/// still matches its label.
fn marker_text(s: &str) -> String {
    let cut = s.find('(').map(|i| &s[..i]).unwrap_or(s);
    normalize(cut.trim_end_matches([':', '-', '.', '*', '^', ' ']))
}

/// Classify a row as a section marker, or return None.
///
/// A marker announces the asset class for the rows that follow: its
/// first non-empty cell carries a known label, and the rest of the row
/// holds no ISIN and no figures.
pub fn classify_section(row: &[Data]) -> Option<InstrumentType> {
    let (lead_idx, lead_text) = row.iter().enumerate().find_map(|(i, c)| {
        let s = cell_str(Some(c))?;
        let t = s.trim().to_string();
        if t.is_empty() {
            None
        } else {
            Some((i, t))
        }
    })?;

    let text = marker_text(&lead_text);
    if text.is_empty() {
        return None;
    }

    let section = SECTION_LABELS
        .iter()
        .find(|(label, _)| text.contains(label))
        .map(|(_, t)| *t)?;

    // Holding rows that merely mention a label ("182 Days Treasury
    // Bill") carry identifiers and figures; real markers do not.
    for (i, cell) in row.iter().enumerate() {
        if i == lead_idx {
            continue;
        }
        if let Some(s) = cell_str(Some(cell)) {
            if looks_like_isin(&s) {
                return None;
            }
        }
        if parse_number(Some(cell)).is_ok() {
            return None;
        }
    }

    Some(section)
}
