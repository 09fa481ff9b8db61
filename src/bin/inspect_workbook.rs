use anyhow::{Context, Result};
use calamine::{open_workbook, Reader, Xlsx};

use fund_portfolio_parser::cells::cell_str;
use fund_portfolio_parser::header::{find_header_row, CanonicalField};
use fund_portfolio_parser::section::classify_section;

/// Dump what the extractor sees in a workbook: sheet sizes, the leading
/// rows, the header row the matcher lands on, and any section markers.
/// Handy when a new AMC's layout refuses to parse.
fn main() -> Result<()> {
    let xlsx_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "portfolio.xlsx".to_string());

    let mut workbook: Xlsx<_> =
        open_workbook(&xlsx_path).with_context(|| format!("Cannot open {}", xlsx_path))?;

    let sheet_names = workbook.sheet_names().to_vec();
    println!("Sheets ({}):", sheet_names.len());

    for sheet_name in sheet_names {
        println!("\n== {} ==", sheet_name);

        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(r) => r,
            Err(e) => {
                println!("  (cannot read: {e})");
                continue;
            }
        };

        let (h, w) = range.get_size();
        println!("  size: rows={h}, cols={w}");

        // First 15 non-empty rows, up to 10 columns each.
        let mut printed = 0usize;
        for (r_idx, row) in range.rows().enumerate() {
            if printed >= 15 {
                break;
            }

            let mut cells: Vec<String> = row
                .iter()
                .take(10)
                .map(|c| cell_str(Some(c)).unwrap_or_default())
                .map(|s| s.trim().to_string())
                .collect();

            if cells.iter().all(|s| s.is_empty()) {
                continue;
            }
            while matches!(cells.last(), Some(s) if s.is_empty()) {
                cells.pop();
            }

            println!("  row {:>4}: {}", r_idx + 1, cells.join(" | "));
            printed += 1;
        }

        match find_header_row(&range, 3) {
            Some(m) => {
                println!("  header row: {}", m.row + 1);
                for field in [
                    CanonicalField::Name,
                    CanonicalField::Isin,
                    CanonicalField::IndustryRating,
                    CanonicalField::Quantity,
                    CanonicalField::MarketValue,
                    CanonicalField::Percentage,
                ] {
                    if let Some(col) = m.mapping.get(field) {
                        println!("    {} -> column {}", field.as_str(), col);
                    }
                }
                for warning in &m.warnings {
                    println!("    ! {}", warning);
                }

                let mut markers = 0usize;
                for (r_idx, row) in range.rows().enumerate().skip(m.row + 1) {
                    if let Some(section) = classify_section(row) {
                        println!("    section at row {}: {}", r_idx + 1, section);
                        markers += 1;
                    }
                }
                if markers == 0 {
                    println!("    (no section markers; rows would default to Other)");
                }
            }
            None => println!("  header row: (none found)"),
        }
    }

    Ok(())
}
