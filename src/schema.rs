//! Turns an untyped player table into normalized `PlayerRecord`s.
//!
//! Normalization never fails: absent attribute columns are synthesized as 0 and any
//! cell that is not a finite, non-negative number becomes 0. Rows are never dropped.

use std::io::Read;

use anyhow::{Context, Result};

use crate::state::{Attribute, Attributes, PlayerRecord};

/// Raw delimited table, every cell kept as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_csv_str(raw: &str) -> Result<Self> {
        Self::from_csv_reader(raw.as_bytes())
    }

    /// Parse comma-separated text with a header row. Ragged rows are accepted and
    /// invalid UTF-8 is replaced rather than rejected.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers = rdr
            .byte_headers()
            .context("read csv header")?
            .iter()
            .map(|h| clean_header(&String::from_utf8_lossy(h)))
            .collect();

        let mut rows = Vec::new();
        for record in rdr.byte_records() {
            let record = record.context("read csv row")?;
            rows.push(
                record
                    .iter()
                    .map(|cell| String::from_utf8_lossy(cell).into_owned())
                    .collect(),
            );
        }

        Ok(Self { headers, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column whose trimmed header equals `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub rows: usize,
    pub synthesized_columns: Vec<Attribute>,
    /// Cells in present attribute columns that were replaced with 0.
    pub coerced_cells: usize,
}

impl NormalizeReport {
    pub fn is_clean(&self) -> bool {
        self.synthesized_columns.is_empty() && self.coerced_cells == 0
    }
}

pub fn normalize(raw: &RawTable) -> Vec<PlayerRecord> {
    normalize_with_report(raw).0
}

pub fn normalize_with_report(raw: &RawTable) -> (Vec<PlayerRecord>, NormalizeReport) {
    let mut report = NormalizeReport {
        rows: raw.rows.len(),
        ..NormalizeReport::default()
    };

    let attr_cols: Vec<(Attribute, Option<usize>)> = Attribute::ALL
        .into_iter()
        .map(|attr| (attr, raw.column_index(attr.column())))
        .collect();
    report.synthesized_columns = attr_cols
        .iter()
        .filter(|(_, col)| col.is_none())
        .map(|(attr, _)| *attr)
        .collect();

    let name_col = raw.column_index("Name");
    let pos_col = raw.column_index("Pos");
    let nationality_col = raw.column_index("Nationality");
    let rarity_col = raw.column_index("Rarity");
    let season_col = raw.column_index("Season");

    let text = |row: usize, col: Option<usize>| -> String {
        col.map(|c| raw.cell(row, c).trim().to_string())
            .unwrap_or_default()
    };

    let mut records = Vec::with_capacity(raw.rows.len());
    for row in 0..raw.rows.len() {
        let mut attributes = Attributes::default();
        for (attr, col) in &attr_cols {
            let Some(col) = col else {
                continue;
            };
            let value = match coerce_attribute(raw.cell(row, *col)) {
                Some(v) => v,
                None => {
                    report.coerced_cells += 1;
                    0.0
                }
            };
            attributes.set(*attr, value);
        }
        records.push(PlayerRecord {
            name: text(row, name_col),
            pos: text(row, pos_col),
            nationality: text(row, nationality_col),
            rarity: text(row, rarity_col),
            season: text(row, season_col),
            attributes,
        });
    }

    (records, report)
}

/// Table-to-table form of normalization.
///
/// Attribute cells are rewritten in canonical numeric text and missing attribute
/// columns are appended. Rows are padded or cut to the header width, so cells past
/// the last header are dropped. Other headed columns pass through untouched.
pub fn normalize_table(raw: &RawTable) -> RawTable {
    let mut headers: Vec<String> = raw.headers.iter().map(|h| clean_header(h)).collect();
    let width = headers.len();
    let mut rows: Vec<Vec<String>> = raw
        .rows
        .iter()
        .map(|r| {
            let mut r = r.clone();
            r.resize(width, String::new());
            r
        })
        .collect();

    for attr in Attribute::ALL {
        match headers.iter().position(|h| h == attr.column()) {
            Some(col) => {
                for row in &mut rows {
                    let value = coerce_attribute(&row[col]).unwrap_or(0.0);
                    row[col] = format_attribute(value);
                }
            }
            None => {
                headers.push(attr.column().to_string());
                for row in &mut rows {
                    row.push(format_attribute(0.0));
                }
            }
        }
    }

    RawTable { headers, rows }
}

/// Numeric value of an attribute cell, or `None` when it must fall back to 0.
pub fn coerce_attribute(cell: &str) -> Option<f64> {
    let value = cell.trim().parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    // Fold -0.0 into 0.0.
    Some(if value == 0.0 { 0.0 } else { value })
}

/// Shortest text that parses back to exactly `value`.
pub fn format_attribute(value: f64) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_rejects_junk_and_negatives() {
        assert_eq!(coerce_attribute(" 97 "), Some(97.0));
        assert_eq!(coerce_attribute("88.5"), Some(88.5));
        assert_eq!(coerce_attribute(""), None);
        assert_eq!(coerce_attribute("n/a"), None);
        assert_eq!(coerce_attribute("-3"), None);
        assert_eq!(coerce_attribute("inf"), None);
        assert_eq!(coerce_attribute("NaN"), None);
        assert_eq!(coerce_attribute("-0"), Some(0.0));
    }

    #[test]
    fn format_attribute_parses_back() {
        for v in [0.0, 97.0, 88.5, 0.1 + 0.2] {
            assert_eq!(coerce_attribute(&format_attribute(v)), Some(v));
        }
    }

    #[test]
    fn table_rows_fit_header_width() {
        let raw = RawTable::new(
            vec!["Name".to_string(), "PWR".to_string()],
            vec![
                vec!["Long".to_string(), "91".to_string(), "extra".to_string()],
                vec!["Short".to_string()],
            ],
        );
        let table = normalize_table(&raw);
        let width = table.headers.len();
        assert_eq!(width, 2 + Attribute::ALL.len() - 1);
        assert!(table.rows.iter().all(|r| r.len() == width));
        assert_eq!(table.rows[0][..2], ["Long", "91"]);
        assert!(!table.rows[0].iter().any(|c| c == "extra"));
        assert_eq!(table.rows[1][1], "0");
    }

    #[test]
    fn header_bom_is_stripped() {
        let table = RawTable::from_csv_str("\u{feff}Name, PWR \nA,90\n").unwrap();
        assert_eq!(table.headers, vec!["Name", "PWR"]);
        assert_eq!(table.column_index("PWR"), Some(1));
    }
}
