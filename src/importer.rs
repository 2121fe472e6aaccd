use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, SpendwiseError};
use crate::models::{Amount, TransactionRecord};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parses amounts typed for the ledger: `-1,234.56`, `$42`, `(18.00)` for
/// negatives. Returns `None` when nothing numeric is left.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    if let Some(rest) = s.strip_prefix('-') {
        // "-$5" has already lost its "$"; tolerate a space after the sign.
        return rest.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}

/// Reads the longest decimal number at the start of `raw`, after leading
/// whitespace: `"12 USD"` is 12, `"42abc"` is 42, `"$42"` is NaN.
/// This is how record amounts are read for categorization.
pub fn leading_number(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    if s[end..].starts_with("Infinity") {
        return if bytes[0] == b'-' { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let int_end = digits_from(end);
    let mut digits = int_end - end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        digits += frac_end - (end + 1);
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

/// Normalizes `YYYY-MM-DD` or `MM/DD/YYYY` to `YYYY-MM-DD`.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d.format("%Y-%m-%d").to_string());
    }
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let m: u32 = parts[0].parse().ok()?;
    let d: u32 = parts[1].parse().ok()?;
    let y: i32 = parts[2].parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(y, m, d).map(|dt| dt.format("%Y-%m-%d").to_string())
}

// ---------------------------------------------------------------------------
// File formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(SpendwiseError::UnknownFormat(path.display().to_string())),
        }
    }
}

/// Reads a CSV (header row required) or JSON (array of objects) file of
/// transaction records.
pub fn read_records(path: &Path) -> Result<Vec<TransactionRecord>> {
    let records = match FileFormat::detect(path)? {
        FileFormat::Csv => read_csv(path)?,
        FileFormat::Json => read_json(path)?,
    };
    debug!(path = %path.display(), count = records.len(), "read transaction records");
    Ok(records)
}

fn read_csv(path: &Path) -> Result<Vec<TransactionRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = rdr.headers()?.clone();

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let mut record = TransactionRecord::default();
        for (header, value) in headers.iter().zip(row.iter()) {
            match header.to_lowercase().as_str() {
                "description" => record.description = Some(value.to_string()),
                "amount" => record.amount = Some(Amount::Text(value.to_string())),
                _ => {
                    record.extra.insert(header.to_string(), Value::from(value));
                }
            }
        }
        records.push(record);
    }
    Ok(records)
}

fn read_json(path: &Path) -> Result<Vec<TransactionRecord>> {
    let content = std::fs::read_to_string(path)?;
    let values: Vec<Map<String, Value>> = serde_json::from_str(&content)?;
    let mut records = Vec::with_capacity(values.len());
    for mut obj in values {
        // Same case-insensitive key handling as CSV headers.
        for key in ["description", "amount"] {
            if !obj.contains_key(key) {
                if let Some(found) = obj.keys().find(|k| k.eq_ignore_ascii_case(key)).cloned() {
                    if let Some(v) = obj.remove(&found) {
                        obj.insert(key.to_string(), v);
                    }
                }
            }
        }
        records.push(serde_json::from_value(Value::Object(obj))?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tmp(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("\"-50.00\""), Some(-50.0));
        assert_eq!(parse_amount("$42.10"), Some(42.10));
        assert_eq!(parse_amount("-$5.25"), Some(-5.25));
        assert_eq!(parse_amount("(18.00)"), Some(-18.0));
        assert_eq!(parse_amount("  7 "), Some(7.0));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_leading_number_reads_numeric_prefix() {
        assert_eq!(leading_number("12 USD"), 12.0);
        assert_eq!(leading_number("42abc"), 42.0);
        assert_eq!(leading_number("  -82.10"), -82.10);
        assert_eq!(leading_number("-.5"), -0.5);
        assert_eq!(leading_number("5."), 5.0);
        assert_eq!(leading_number("1e3 fee"), 1000.0);
        assert_eq!(leading_number("2e"), 2.0);
        assert_eq!(leading_number("1,234.56"), 1.0);
        assert_eq!(leading_number("Infinity"), f64::INFINITY);
        assert!(leading_number("$42").is_nan());
        assert!(leading_number("-$5").is_nan());
        assert!(leading_number(".").is_nan());
        assert!(leading_number("").is_nan());
        assert!(leading_number("abc").is_nan());
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("2025-01-15").as_deref(), Some("2025-01-15"));
        assert_eq!(normalize_date("1/5/2025").as_deref(), Some("2025-01-05"));
        assert_eq!(normalize_date("2025-02-30"), None);
        assert_eq!(normalize_date("yesterday"), None);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(FileFormat::detect(Path::new("a.CSV")).unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::detect(Path::new("a.json")).unwrap(), FileFormat::Json);
        assert!(matches!(
            FileFormat::detect(Path::new("a.xlsx")),
            Err(SpendwiseError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_read_csv_keeps_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(
            &dir,
            "t.csv",
            "Date,Description,Amount,Category\n\
             2025-01-15,SAFEWAY GROCERY,\"-82.10\",Misc\n\
             2025-01-16,ACME PAYROLL,2500.00 USD,\n",
        );
        let recs = read_records(&path).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].description.as_deref(), Some("SAFEWAY GROCERY"));
        assert_eq!(recs[0].amount_value(), -82.10);
        assert_eq!(recs[0].extra_text("Date").as_deref(), Some("2025-01-15"));
        assert_eq!(recs[0].extra_text("Category").as_deref(), Some("Misc"));
        assert_eq!(recs[1].amount_value(), 2500.0);
    }

    #[test]
    fn test_read_json_case_insensitive_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(
            &dir,
            "t.json",
            r#"[{"Description": "Netflix", "Amount": -15.99, "date": "2025-02-01"},
                {"amount": "12"}]"#,
        );
        let recs = read_records(&path).unwrap();
        assert_eq!(recs[0].description.as_deref(), Some("Netflix"));
        assert_eq!(recs[0].amount_value(), -15.99);
        assert_eq!(recs[1].description, None);
        assert_eq!(recs[1].amount_value(), 12.0);
    }

    #[test]
    fn test_read_json_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(&dir, "t.json", r#"{"description": "x"}"#);
        assert!(matches!(read_records(&path), Err(SpendwiseError::Json(_))));
    }

    #[test]
    fn test_mixed_type_json_still_categorizes_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tmp(
            &dir,
            "mixed.json",
            r#"[{"description": "bus", "amount": true},
                {"description": 5, "amount": -1},
                {"description": "payroll", "amount": "12 USD"},
                {"description": "xyzzy", "amount": "$42"}]"#,
        );
        let recs = read_records(&path).unwrap();
        let labels: Vec<String> = crate::categorizer::Categorizer::new()
            .categorize_transactions(&recs)
            .into_iter()
            .map(|t| t.category)
            .collect();
        assert_eq!(labels, ["Transportation", "Other", "Income", "Other"]);
    }
}
