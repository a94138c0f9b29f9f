use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One spreadsheet row as an ordered header → value mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SheetRow {
    cells: Vec<(String, String)>,
}

impl SheetRow {
    pub fn new(cells: Vec<(String, String)>) -> Self {
        Self { cells }
    }

    /// Value for the first column named `header`
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    pub fn cells(&self) -> &[(String, String)] {
        &self.cells
    }
}

/// Rows of a sheet range with the first returned row used as headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

impl SheetTable {
    /// Build a table from raw range values.
    ///
    /// Returns `None` when there is no header row or no data row beneath it.
    /// Sheets omits trailing empty cells, so short rows are padded with empty
    /// strings; cells past the last header are dropped.
    pub fn from_values(values: Vec<Vec<String>>) -> Option<Self> {
        let mut iter = values.into_iter();
        let headers = iter.next()?;

        let rows: Vec<SheetRow> = iter
            .enumerate()
            .map(|(i, mut raw)| {
                if raw.len() > headers.len() {
                    debug!(row = i + 2, extra = raw.len() - headers.len(), "Dropping cells without a header");
                    raw.truncate(headers.len());
                }
                let mut raw = raw.into_iter();
                let cells = headers
                    .iter()
                    .map(|h| (h.clone(), raw.next().unwrap_or_default()))
                    .collect();
                SheetRow::new(cells)
            })
            .collect();

        if rows.is_empty() {
            return None;
        }

        Some(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, header: &str) -> bool {
        self.headers.iter().any(|h| h == header)
    }

    /// Names from `required` that are not headers of this table
    pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required.iter().copied().filter(|h| !self.has_column(h)).collect()
    }

    pub fn column<'a>(&'a self, header: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rows.iter().filter_map(move |r| r.get(header))
    }

    /// Distinct trimmed, non-empty values of a column in first-seen order
    pub fn unique_values(&self, header: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.column(header)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .filter(|v| seen.insert(v.to_string()))
            .map(String::from)
            .collect()
    }
}

// Sheets v4 spreadsheets.values.get response
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ValueRange {
    pub range: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

impl ValueRange {
    /// Cell values as display strings
    pub fn into_strings(self) -> Vec<Vec<String>> {
        self.values
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_from_values_uses_first_row_as_headers() {
        let table = SheetTable::from_values(strings(&[
            &["Student Number", "First Name"],
            &["A1", "Ada"],
            &["B2"],
            &["C3", "Cy", "overflow"],
        ]))
        .unwrap();

        assert_eq!(table.headers, vec!["Student Number", "First Name"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0].get("First Name"), Some("Ada"));
        assert_eq!(table.rows[1].get("First Name"), Some(""));
        assert_eq!(table.rows[2].cells().len(), 2);
        assert_eq!(table.rows[2].get("Last Name"), None);
    }

    #[test]
    fn test_from_values_without_data_rows_is_none() {
        assert!(SheetTable::from_values(vec![]).is_none());
        assert!(SheetTable::from_values(strings(&[&["Student Number"]])).is_none());
    }

    #[test]
    fn test_unique_values_and_missing_columns() {
        let table = SheetTable::from_values(strings(&[
            &["Student Number"],
            &[" A1 "],
            &["A1"],
            &[""],
            &["B2"],
        ]))
        .unwrap();

        assert_eq!(table.unique_values("Student Number"), vec!["A1", "B2"]);
        assert_eq!(table.missing_columns(&["Student Number", "Position"]), vec!["Position"]);
        assert!(!table.has_column("Position"));
    }

    #[test]
    fn test_value_range_into_strings() {
        let json = r#"{"range":"Data!A1:Z3","majorDimension":"ROWS","values":[["Student Number","Score"],["A1",12],["B2",true]]}"#;
        let range: ValueRange = serde_json::from_str(json).unwrap();
        let values = range.into_strings();
        assert_eq!(values[1], vec!["A1", "12"]);
        assert_eq!(values[2], vec!["B2", "true"]);
    }
}
