use std::collections::BTreeMap;
use std::path::PathBuf;
use std::{env, fs};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;

use fund_portfolio_parser::{fetch, output, validate, PortfolioXlsxParser};

struct CliArgs {
    xlsx_paths: Vec<String>,
    output_dir: PathBuf,
    amc_name: String,
    reporting_date: NaiveDate,
    unit: Option<String>,
    fetch_url: Option<String>,
    month: String,
    year: String,
}

fn parse_args() -> Result<CliArgs> {
    // Usage:
    //   fund_portfolio_parser portfolio.xlsx ... [output_dir]
    //     --amc "Axis Mutual Fund"
    //     --date 2025-12-31
    //     --unit lakhs
    //     --fetch https://example.com/statutory-disclosures --month December --year 2025
    //
    // If no .xlsx files are provided and --fetch is given, the file is
    // located on the disclosure page and downloaded first.
    let mut args = env::args().skip(1);

    let mut cli = CliArgs {
        xlsx_paths: Vec::new(),
        output_dir: PathBuf::from("output"),
        amc_name: "Axis Mutual Fund".to_string(),
        reporting_date: NaiveDate::from_ymd_opt(2025, 12, 31).ok_or_else(|| anyhow!("bad default date"))?,
        unit: Some("lakhs".to_string()),
        fetch_url: None,
        month: "December".to_string(),
        year: "2025".to_string(),
    };

    while let Some(a) = args.next() {
        match a.as_str() {
            "--amc" => cli.amc_name = args.next().ok_or_else(|| anyhow!("--amc needs a value"))?,
            "--date" => {
                let v = args.next().ok_or_else(|| anyhow!("--date needs a value"))?;
                cli.reporting_date = NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                    .with_context(|| format!("--date must be YYYY-MM-DD, got {}", v))?;
            }
            "--unit" => {
                let v = args.next().ok_or_else(|| anyhow!("--unit needs a value"))?;
                cli.unit = if v.is_empty() { None } else { Some(v) };
            }
            "--fetch" => {
                cli.fetch_url = Some(args.next().ok_or_else(|| anyhow!("--fetch needs a URL"))?)
            }
            "--month" => cli.month = args.next().ok_or_else(|| anyhow!("--month needs a value"))?,
            "--year" => cli.year = args.next().ok_or_else(|| anyhow!("--year needs a value"))?,
            other if other.to_lowercase().ends_with(".xlsx") || other.to_lowercase().ends_with(".xls") => {
                cli.xlsx_paths.push(other.to_string())
            }
            other => cli.output_dir = PathBuf::from(other),
        }
    }

    Ok(cli)
}

fn main() -> Result<()> {
    let mut cli = parse_args()?;

    if cli.xlsx_paths.is_empty() {
        if let Some(page_url) = &cli.fetch_url {
            println!("🌐 Looking for the {} {} portfolio on {}", cli.month, cli.year, page_url);
            let client = fetch::build_client()?;
            match fetch::find_portfolio_file_url(&client, page_url, &cli.month, &cli.year)? {
                Some(file_url) => {
                    println!("⬇️  Downloading {}", file_url);
                    let saved =
                        fetch::download_file(&client, &file_url, cli.output_dir.join("downloads"))?;
                    println!("✓ Saved to {}", saved.display());
                    cli.xlsx_paths.push(saved.to_string_lossy().to_string());
                }
                None => {
                    println!("❌ No matching portfolio link found on the page.");
                    println!("   The file may sit behind a script or dropdown; download it manually.");
                    return Ok(());
                }
            }
        }
    }

    if cli.xlsx_paths.is_empty() {
        println!("❌ No .xlsx input files given (and no --fetch URL).");
        return Ok(());
    }

    let parser = PortfolioXlsxParser::new(&cli.amc_name, cli.reporting_date);

    println!(
        "📖 Parsing {} file(s) for {}",
        cli.xlsx_paths.len(),
        cli.amc_name
    );

    let mut all_records = Vec::new();
    let mut all_diagnostics = fund_portfolio_parser::Diagnostics::default();

    for path in &cli.xlsx_paths {
        println!("  • {}", path);
        let result = parser
            .parse_file(path)
            .with_context(|| format!("Failed parsing {}", path))?;
        println!(
            "    {} records, {} sheets skipped, {} warnings",
            result.records.len(),
            result.diagnostics.skipped_sheets.len(),
            result.diagnostics.warnings.len()
        );
        all_records.extend(result.records);
        merge_diagnostics(&mut all_diagnostics, result.diagnostics);
    }

    if all_records.is_empty() {
        println!("❌ No holdings extracted.");
    }

    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("Creating {}", cli.output_dir.display()))?;

    let csv_path = cli.output_dir.join("consolidated_portfolio.csv");
    output::write_csv(&all_records, &csv_path, cli.unit.as_deref())?;
    println!("\n✅ Consolidated CSV written to {}", csv_path.display());

    let per_type = output::write_csv_by_type(&all_records, &cli.output_dir, cli.unit.as_deref())?;
    for p in &per_type {
        println!("✓ {}", p.display());
    }

    let diag_path = cli.output_dir.join("diagnostics.json");
    output::write_diagnostics_json(&all_diagnostics, &diag_path)?;
    println!("✓ Diagnostics written to {}", diag_path.display());

    print_summary(&all_records, &all_diagnostics);

    let report = validate::run_quality_checks(&all_records);
    validate::print_report(&report);

    Ok(())
}

fn merge_diagnostics(
    into: &mut fund_portfolio_parser::Diagnostics,
    from: fund_portfolio_parser::Diagnostics,
) {
    into.skipped_sheets.extend(from.skipped_sheets);
    into.tolerance_violations.extend(from.tolerance_violations);
    into.totals_checkpoints.extend(from.totals_checkpoints);
    into.warnings.extend(from.warnings);
    for (scheme, count) in from.per_sheet_counts {
        *into.per_sheet_counts.entry(scheme).or_insert(0) += count;
    }
}

fn print_summary(
    records: &[fund_portfolio_parser::HoldingRecord],
    diagnostics: &fund_portfolio_parser::Diagnostics,
) {
    let schemes: std::collections::BTreeSet<&str> =
        records.iter().map(|r| r.scheme_name.as_str()).collect();

    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for rec in records {
        *by_type.entry(rec.instrument_type.label()).or_insert(0) += 1;
    }

    println!("\n📊 Summary:");
    println!("✓ Schemes processed: {}", schemes.len());
    println!("✓ Total holdings: {}", records.len());
    for (label, count) in &by_type {
        println!("  • {}: {}", label, count);
    }
    if !diagnostics.skipped_sheets.is_empty() {
        println!("⚠️  Skipped sheets:");
        for s in &diagnostics.skipped_sheets {
            println!("  • {} ({})", s.sheet_name, s.reason);
        }
    }
    if !diagnostics.tolerance_violations.is_empty() {
        println!("⚠️  Schemes with percentage sums away from 100:");
        for v in &diagnostics.tolerance_violations {
            println!("  • {}: {:.2}", v.scheme_name, v.summed_percentage);
        }
    }
}
