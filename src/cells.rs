use anyhow::{anyhow, Result};
use calamine::Data;
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Text content of a cell, if it has any.
pub fn cell_str(cell: Option<&Data>) -> Option<String> {
    let c = cell?;
    match c {
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::Empty => None,
        _ => Some(c.to_string()),
    }
}

/// Lower-cased, NBSP-free, whitespace-collapsed text used for all
/// keyword matching. Punctuation is left alone: several header keywords
/// ("% to nav", "no. of", "value (") rely on it.
pub fn normalize(s: &str) -> String {
    s.replace('\u{00a0}', " ")
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_blank(cell: Option<&Data>) -> bool {
    match cell_str(cell) {
        Some(s) => s.trim().is_empty(),
        None => true,
    }
}

/// Numeric value of a cell. String cells get thousands separators,
/// currency prefixes, and a trailing percent sign stripped; accountancy
/// negatives like "(144.48)" are honoured.
pub fn parse_number(cell: Option<&Data>) -> Result<f64> {
    let Some(c) = cell else {
        return Err(anyhow!("empty cell"));
    };

    match c {
        Data::Float(f) => Ok(*f),
        Data::Int(i) => Ok(*i as f64),
        Data::String(s) => parse_number_str(s),
        Data::Empty => Err(anyhow!("empty cell")),
        _ => parse_number_str(&c.to_string()),
    }
}

fn parse_number_str(s: &str) -> Result<f64> {
    let mut s = s.trim().to_string();
    if s.is_empty() || s == "-" || s == "\u{2013}" {
        return Err(anyhow!("empty cell"));
    }

    let lower = s.to_lowercase();
    for prefix in ["rs.", "rs", "inr", "\u{20b9}", "$"] {
        if lower.starts_with(prefix) {
            s = s[prefix.len()..].trim_start().to_string();
            break;
        }
    }

    s = s.replace(',', "");
    if let Some(stripped) = s.strip_suffix('%') {
        s = stripped.trim_end().to_string();
    }

    let negative = s.starts_with('(') && s.ends_with(')');
    if negative {
        s = s[1..s.len() - 1].trim().to_string();
    }

    let v: f64 = s
        .parse()
        .map_err(|_| anyhow!("not a number: {:?}", s))?;
    Ok(if negative { -v } else { v })
}

/// Dates arrive as Excel serials, ISO strings, Indian dd/mm/yyyy
/// strings, or spelled-out forms like "December 31, 2025".
pub fn parse_date_cell(cell: Option<&Data>) -> Result<NaiveDate> {
    let Some(c) = cell else {
        return Err(anyhow!("empty date"));
    };

    match c {
        Data::Float(f) => excel_serial_to_date(*f),
        Data::Int(i) => excel_serial_to_date(*i as f64),
        Data::String(s) => parse_date_string(s),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => parse_date_string(s),
        _ => parse_date_string(&c.to_string()),
    }
}

pub fn parse_date_string(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return Err(anyhow!("empty date string"));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.date());
    }
    // Ordinals ("31st December 2025") trip chrono's %d.
    let cleaned = strip_ordinals(s);
    for fmt in [
        "%Y-%m-%d",
        "%d/%m/%Y",
        "%d-%m-%Y",
        "%d.%m.%Y",
        "%d-%b-%Y",
        "%d %b %Y",
        "%d %B %Y",
        "%d %B, %Y",
        "%B %d, %Y",
        "%b %d, %Y",
    ] {
        if let Ok(d) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return Ok(d);
        }
    }
    Err(anyhow!("unsupported date format: {}", s))
}

fn strip_ordinals(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        out.push(chars[i]);
        // Drop a st/nd/rd/th glued onto a digit.
        if chars[i].is_ascii_digit() {
            let suffix: String = chars[i + 1..].iter().take(2).collect::<String>().to_lowercase();
            let followed_ok = chars.get(i + 3).map_or(true, |c| !c.is_ascii_alphanumeric());
            if ["st", "nd", "rd", "th"].contains(&suffix.as_str()) && followed_ok {
                i += 2;
            }
        }
        i += 1;
    }
    out
}

/// Excel serial date conversion using the 1899-12-30 base.
pub fn excel_serial_to_date(v: f64) -> Result<NaiveDate> {
    if !v.is_finite() || v < 1.0 || v > 200_000.0 {
        return Err(anyhow!("not an excel date serial: {}", v));
    }
    let days = v.floor() as i64;
    let base = NaiveDate::from_ymd_opt(1899, 12, 30).ok_or_else(|| anyhow!("bad base date"))?;
    Ok(base + Duration::days(days))
}

/// Shape check for a 12-character ISIN: two letters, nine alphanumerics,
/// one check digit.
pub fn looks_like_isin(s: &str) -> bool {
    let s = s.trim();
    if s.len() != 12 {
        return false;
    }
    let bytes = s.as_bytes();
    bytes[..2].iter().all(|b| b.is_ascii_uppercase())
        && bytes[2..11]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        && bytes[11].is_ascii_digit()
}
