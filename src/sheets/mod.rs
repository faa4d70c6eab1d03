//! Spreadsheet-as-table access.
//!
//! A worksheet is a grid of strings whose first row holds column names. Rows
//! are exposed as [`Record`]s keyed by the standardized column name, and typed
//! models convert to and from records through [`Row`].

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;

pub mod google;
pub mod memory;

pub use google::GoogleSheets;
pub use memory::MemorySheets;

/// One data row keyed by standardized column name.
pub type Record = BTreeMap<String, String>;

#[async_trait]
pub trait SheetStore: Send + Sync {
    async fn sheet_titles(&self) -> Result<Vec<String>>;

    /// Creates the worksheet and writes its header row.
    async fn add_sheet(&self, title: &str, headers: &[&str]) -> Result<()>;

    /// Whole grid, header row included. Missing trailing cells are not padded.
    async fn read_grid(&self, title: &str) -> Result<Vec<Vec<String>>>;

    /// Replaces the whole content of the worksheet.
    async fn write_grid(&self, title: &str, grid: Vec<Vec<String>>) -> Result<()>;
}

/// Typed view of a worksheet row.
pub trait Row: Sized {
    const SHEET: &'static str;
    const HEADERS: &'static [&'static str];

    fn from_record(record: &Record) -> Option<Self>;
    fn to_record(&self) -> Record;
}

/// "Service ID " -> "service_id"
pub fn normalize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }
    out
}

/// Ids come back from the sheet as text, sometimes with a float suffix ("12.0").
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_suffix(".0") {
        Some(int) if !int.is_empty() && int.chars().all(|c| c.is_ascii_digit() || c == '-') => {
            int.to_string()
        }
        _ => trimmed.to_string(),
    }
}

pub fn same_id(a: &str, b: &str) -> bool {
    normalize_id(a) == normalize_id(b)
}

/// Next free numeric id: max + 1, "1" for an empty table.
pub fn next_id<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let max = ids
        .into_iter()
        .filter_map(|id| normalize_id(id).parse::<i64>().ok())
        .max()
        .unwrap_or(0);
    (max.max(0) + 1).to_string()
}

pub fn records_from_grid(grid: &[Vec<String>]) -> Vec<Record> {
    let Some((header, rows)) = grid.split_first() else {
        return Vec::new();
    };
    let keys: Vec<String> = header.iter().map(|h| normalize_key(h)).collect();

    rows.iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|row| {
            keys.iter()
                .enumerate()
                .filter(|(_, key)| !key.is_empty())
                .map(|(i, key)| {
                    let value = row.get(i).map(|v| v.trim().to_string()).unwrap_or_default();
                    (key.clone(), value)
                })
                .collect()
        })
        .collect()
}

pub fn grid_from_records(headers: &[&str], records: &[Record]) -> Vec<Vec<String>> {
    let mut grid = Vec::with_capacity(records.len() + 1);
    grid.push(headers.iter().map(|h| h.to_string()).collect());
    for record in records {
        grid.push(
            headers
                .iter()
                .map(|h| record.get(*h).cloned().unwrap_or_default())
                .collect(),
        );
    }
    grid
}

/// Reads a field, treating blank cells as absent.
pub fn field(record: &Record, key: &str) -> Option<String> {
    record
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn field_or_default(record: &Record, key: &str) -> String {
    field(record, key).unwrap_or_default()
}

/// Telegram ids and other integer columns.
pub fn field_i64(record: &Record, key: &str) -> Option<i64> {
    field(record, key).and_then(|v| normalize_id(&v).parse().ok())
}

/// Accepts "1500", "1500.5" and "1 500,5".
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn field_number(record: &Record, key: &str) -> f64 {
    field(record, key).and_then(|v| parse_number(&v)).unwrap_or(0.0)
}

/// Formats money without a trailing ".0".
pub fn format_amount(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

pub fn record<const N: usize>(pairs: [(&str, String); N]) -> Record {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Service ID "), "service_id");
        assert_eq!(normalize_key("  full-name"), "full_name");
        assert_eq!(normalize_key("Total   Income"), "total_income");
        assert_eq!(normalize_key("user_id"), "user_id");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn test_normalize_id_strips_float_suffix() {
        assert_eq!(normalize_id(" 12.0 "), "12");
        assert_eq!(normalize_id("12"), "12");
        assert_eq!(normalize_id("abc.0"), "abc.0");
        assert!(same_id("7", "7.0"));
        assert!(!same_id("7", "17"));
    }

    #[test]
    fn test_next_id() {
        assert_eq!(next_id(Vec::<&str>::new()), "1");
        assert_eq!(next_id(vec!["1", "5", "3"]), "6");
        assert_eq!(next_id(vec!["x", "2.0", ""]), "3");
    }

    #[test]
    fn test_records_from_grid_standardizes_headers_and_skips_blank_rows() {
        let grid = vec![
            vec!["ID".to_string(), "Full Name".to_string()],
            vec!["1".to_string(), " Anna ".to_string()],
            vec!["".to_string(), "  ".to_string()],
            vec!["2".to_string()],
        ];
        let records = records_from_grid(&grid);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["full_name"], "Anna");
        assert_eq!(records[1]["id"], "2");
        assert_eq!(records[1]["full_name"], "");
    }

    #[test]
    fn test_grid_from_records_follows_header_order() {
        let rec = record([("name", "A".to_string()), ("id", "1".to_string())]);
        let grid = grid_from_records(&["id", "name", "price"], &[rec]);
        assert_eq!(grid[0], vec!["id", "name", "price"]);
        assert_eq!(grid[1], vec!["1", "A", ""]);
    }

    #[test]
    fn test_field_i64_accepts_float_text() {
        let rec = record([("user_id", "123.0".to_string()), ("bad", "x".to_string())]);
        assert_eq!(field_i64(&rec, "user_id"), Some(123));
        assert_eq!(field_i64(&rec, "bad"), None);
        assert_eq!(field_i64(&rec, "missing"), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1500"), Some(1500.0));
        assert_eq!(parse_number("350,50"), Some(350.5));
        assert_eq!(parse_number("1 500"), Some(1500.0));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1500.0), "1500");
        assert_eq!(format_amount(12.346), "12.35");
        assert_eq!(format_amount(-3.0), "-3");
    }
}
