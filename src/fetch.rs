use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use url::Url;

pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .timeout(Duration::from_secs(60))
        .build()
        .context("Building HTTP client")
}

/// Link-text patterns a monthly consolidated portfolio file tends to be
/// published under, e.g. "Consolidated Scheme Portfolio - December 2025".
fn month_year_patterns(month: &str, year: &str) -> Result<Vec<Regex>> {
    let m = regex::escape(&month.to_lowercase());
    let y = regex::escape(year);
    [
        format!("{}.*{}.*consolidated", m, y),
        format!("consolidated.*{}.*{}", m, y),
        format!("monthly.*portfolio.*{}.*{}", m, y),
        format!("{}.*{}.*portfolio", m, y),
    ]
    .iter()
    .map(|p| Regex::new(p).map_err(|e| anyhow!("Invalid pattern {}: {}", p, e)))
    .collect()
}

fn matches_portfolio_link(combined: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|p| p.is_match(combined))
}

/// Scan a disclosure page for the spreadsheet link of the requested
/// reporting month. Returns None when no link matches; dropdown- or
/// script-driven pages need a manual download instead.
pub fn find_portfolio_file_url(
    client: &Client,
    page_url: &str,
    month: &str,
    year: &str,
) -> Result<Option<String>> {
    let body = client
        .get(page_url)
        .send()
        .with_context(|| format!("Fetching {}", page_url))?
        .error_for_status()?
        .text()?;

    let base = Url::parse(page_url).with_context(|| format!("Invalid page URL {}", page_url))?;
    let document = Html::parse_document(&body);
    let selector = Selector::parse("a[href]").map_err(|e| anyhow!("Invalid selector: {:?}", e))?;
    let patterns = month_year_patterns(month, year)?;

    for link in document.select(&selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let href_lower = href.to_lowercase();
        if !href_lower.contains(".xlsx") && !href_lower.contains(".xls") {
            continue;
        }
        let text: String = link.text().collect();
        let combined = format!("{} {}", text.trim().to_lowercase(), href_lower);
        if matches_portfolio_link(&combined, &patterns) {
            let absolute = base
                .join(href)
                .with_context(|| format!("Joining link {}", href))?;
            return Ok(Some(absolute.into()));
        }
    }

    Ok(None)
}

fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .unwrap_or("portfolio_data.xlsx")
        .to_string()
}

/// Download the file and save it under `dest_dir` using the original
/// filename. Returns the full path of the saved file.
pub fn download_file(client: &Client, url_str: &str, dest_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid file URL {}", url_str))?;
    let dest_path = dest_dir.as_ref().join(filename_from_url(&url));

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating {}", parent.display()))?;
    }

    let resp = client
        .get(url.as_str())
        .send()
        .with_context(|| format!("Downloading {}", url_str))?
        .error_for_status()?;
    let bytes = resp.bytes()?;
    fs::write(&dest_path, &bytes)
        .with_context(|| format!("Writing {}", dest_path.display()))?;

    Ok(dest_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_year_patterns_match_common_wordings() {
        let patterns = month_year_patterns("December", "2025").unwrap();
        assert!(matches_portfolio_link(
            "consolidated scheme portfolio december 2025 /docs/dec.xlsx",
            &patterns
        ));
        assert!(matches_portfolio_link(
            "monthly portfolio disclosure december 2025",
            &patterns
        ));
        assert!(!matches_portfolio_link(
            "consolidated scheme portfolio november 2025",
            &patterns
        ));
    }

    #[test]
    fn test_filename_from_url() {
        let url = Url::parse("https://example.com/docs/Dec2025_Consolidated.xlsx").unwrap();
        assert_eq!(filename_from_url(&url), "Dec2025_Consolidated.xlsx");
        let bare = Url::parse("https://example.com/").unwrap();
        assert_eq!(filename_from_url(&bare), "portfolio_data.xlsx");
    }
}
