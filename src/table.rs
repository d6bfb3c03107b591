// 📋 Table Model - row-oriented sales records
// One shape for every source: ordered column names + rows of typed cells.

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::fmt;

// ============================================================================
// CELL VALUE
// ============================================================================

/// Spellings of "missing" that spreadsheet exports commonly write out
const NULL_MARKERS: &[&str] = &["NA", "N/A", "#N/A", "NaN", "nan", "null", "NULL", "None"];

/// A single cell. Sources decide the variant; the consolidator only ever
/// rewrites date cells and appends month columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    /// Infer a typed value from raw delimited text
    ///
    /// Order matters: "12" must stay an integer, "12.5" a number,
    /// and only then fall back to booleans and text.
    pub fn infer(raw: &str) -> Value {
        let trimmed = raw.trim();

        if trimmed.is_empty() || NULL_MARKERS.contains(&trimmed) {
            return Value::Null;
        }

        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Integer(i);
        }

        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Value::Number(n);
            }
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }

        Value::Text(raw.to_string())
    }

    /// Empty strings are missing values, same as empty cells
    pub fn text(s: impl Into<String>) -> Value {
        let s = s.into();
        if s.is_empty() {
            Value::Null
        } else {
            Value::Text(s)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Grouping key form of a value (None for missing keys)
    pub fn key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
        }
    }
}

// ============================================================================
// TABLE
// ============================================================================

/// Cells of one record, aligned with the owning table's columns
pub type Row = Vec<Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row; short rows are padded with nulls
    pub fn push_row(&mut self, mut row: Row) {
        debug_assert!(row.len() <= self.columns.len());
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Iterate over one column, top to bottom
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Replace a column's values, appending the column if it doesn't exist yet
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.rows.len());

        let idx = match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(Value::Null);
                }
                self.columns.len() - 1
            }
        };

        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
    }

    /// Same value in every row (used to stamp the origin branch)
    pub fn fill_column(&mut self, name: &str, value: Value) {
        let values = vec![value; self.rows.len()];
        self.set_column(name, values);
    }

    /// (column, value) pairs of one row, in column order
    pub fn record(&self, row: usize) -> Option<Vec<(&str, &Value)>> {
        let cells = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .map(String::as_str)
                .zip(cells.iter())
                .collect(),
        )
    }

    /// Rows whose `column` holds exactly `value`
    pub fn filter_eq(&self, column: &str, value: &Value) -> Table {
        let mut filtered = Table::new(self.columns.clone());
        if let Some(idx) = self.column_index(column) {
            filtered.rows = self
                .rows
                .iter()
                .filter(|r| &r[idx] == value)
                .cloned()
                .collect();
        }
        filtered
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<Row>) {
        (self.columns, self.rows)
    }
}
