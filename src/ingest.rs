//! Site source feed: mine coordinates from CSV.
//!
//! Expected headers (any order, extra columns ignored): `Lat_DD`,
//! `Long_DD`, `Name`, `Location`, `County`, `Status`. Rows without a
//! parseable coordinate pair are skipped. Missing or placeholder text
//! fields (`""`, `NULL`) are normalized once here and never reach the
//! engine as errors.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::models::SiteRecord;

// ---

const UNKNOWN: &str = "Unknown";

/// Read and parse a site feed file.
pub fn load_sites(path: &Path) -> Result<Vec<SiteRecord>> {
    // ---
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read site feed '{}'", path.display()))?;
    let records = parse_sites(&text)?;

    tracing::info!("Loaded {} sites from {}", records.len(), path.display());
    Ok(records)
}

/// Parse site feed CSV text.
///
/// Site ids are the 1-based data row numbers, so they stay stable for a
/// given file even when some rows are skipped.
pub fn parse_sites(text: &str) -> Result<Vec<SiteRecord>> {
    // ---
    let mut lines = text.lines();
    let header = lines.next().ok_or_else(|| anyhow!("Site feed is empty"))?;
    let headers = split_row(header);

    let column = |name: &str| headers.iter().position(|h| h == name);
    let lat_idx = column("Lat_DD").ok_or_else(|| anyhow!("Site feed missing Lat_DD column"))?;
    let lng_idx = column("Long_DD").ok_or_else(|| anyhow!("Site feed missing Long_DD column"))?;
    let name_idx = column("Name");
    let location_idx = column("Location");
    let county_idx = column("County");
    let status_idx = column("Status");

    let mut records = Vec::new();
    for (i, line) in lines.enumerate() {
        let row_number = i + 1;
        if line.trim().is_empty() {
            continue;
        }
        let row = split_row(line);

        let coords = parse_coord(&row, lat_idx).zip(parse_coord(&row, lng_idx));
        let Some((lat, lng)) = coords else {
            tracing::debug!("Skipping row {}: unparseable coordinates", row_number);
            continue;
        };

        let name = field(&row, name_idx).unwrap_or_else(|| UNKNOWN.to_string());
        let location = field(&row, location_idx).unwrap_or_else(|| name.clone());

        records.push(SiteRecord {
            id: u32::try_from(row_number).context("Site feed has too many rows")?,
            location,
            county: field(&row, county_idx).unwrap_or_else(|| UNKNOWN.to_string()),
            status: field(&row, status_idx).unwrap_or_else(|| UNKNOWN.to_string()),
            name,
            coordinates: [lng, lat],
        });
    }

    Ok(records)
}

/// Split one CSV line, honouring double-quoted fields.
fn split_row(line: &str) -> Vec<String> {
    // ---
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn field(row: &[String], idx: Option<usize>) -> Option<String> {
    let value = row.get(idx?)?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("NULL") {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_coord(row: &[String], idx: usize) -> Option<f64> {
    row.get(idx)?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    const FEED: &str = "\
Name,Lat_DD,Long_DD,Location,County,Status,Commodity_Code
Copper Ridge,46.49,-80.99,North Pit,Sudbury,Active,CU
,48.47,-81.33,NULL,Timmins,,AU
Bad Row,not-a-number,-79.0,Somewhere,York,Active,
\"Smith, Jones & Co\",45.1,-78.2,,,Abandoned,NI
";

    #[test]
    fn test_parse_normalizes_placeholders() {
        // ---
        let sites = parse_sites(FEED).unwrap();
        assert_eq!(sites.len(), 3);

        let first = &sites[0];
        assert_eq!(first.id, 1);
        assert_eq!(first.name, "Copper Ridge");
        assert_eq!(first.coordinates, [-80.99, 46.49]);

        let second = &sites[1];
        assert_eq!(second.id, 2);
        assert_eq!(second.name, "Unknown");
        assert_eq!(second.location, "Unknown");
        assert_eq!(second.county, "Timmins");
        assert_eq!(second.status, "Unknown");
    }

    #[test]
    fn test_skipped_rows_keep_ids_stable() {
        // ---
        let sites = parse_sites(FEED).unwrap();
        let last = sites.last().unwrap();
        assert_eq!(last.id, 4);
        assert_eq!(last.name, "Smith, Jones & Co");
        // location falls back to the site name
        assert_eq!(last.location, "Smith, Jones & Co");
        assert_eq!(last.county, "Unknown");
        assert_eq!(last.status, "Abandoned");
    }

    #[test]
    fn test_missing_coordinate_columns_is_error() {
        // ---
        assert!(parse_sites("Name,Status\nA,Active\n").is_err());
        assert!(parse_sites("").is_err());
    }

    #[test]
    fn test_split_row_handles_escaped_quotes() {
        // ---
        assert_eq!(
            split_row(r#"a,"b ""c"", d",e"#),
            vec!["a".to_string(), "b \"c\", d".to_string(), "e".to_string()]
        );
    }
}
