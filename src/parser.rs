// 🏗️ Parser Framework - one parser per export format
// Spreadsheet, delimited text and JSON all land in the same Table shape.

use crate::error::{PipelineError, Result};
use crate::table::{Table, Value};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceFormat - which kind of export a branch sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Spreadsheet workbook (xlsx, xlsm, xlsb, xls, ods)
    Excel,
    /// Comma-separated text with a header row
    Csv,
    /// Array of flat JSON records
    Json,
}

impl SourceFormat {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceFormat::Excel => "Excel",
            SourceFormat::Csv => "CSV",
            SourceFormat::Json => "JSON",
        }
    }

    /// File extensions this format is recognised by
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SourceFormat::Excel => &["xlsx", "xlsm", "xlsb", "xls", "ods"],
            SourceFormat::Csv => &["csv"],
            SourceFormat::Json => &["json"],
        }
    }
}

// ============================================================================
// PARSER TRAIT
// ============================================================================

/// SourceParser - turns one export into a Table
///
/// `parse` is the only method a format has to provide; `load` adds the
/// branch stamp every table needs before consolidation.
pub trait SourceParser: Send + Sync {
    /// Decode the stream into a table, exactly as the source declares it
    ///
    /// `source_name` only shows up in error messages.
    fn parse(&self, reader: &mut dyn Read, source_name: &str) -> Result<Table>;

    /// Format this parser handles
    fn format(&self) -> SourceFormat;

    /// Parse and stamp every row with the branch label
    ///
    /// A column already named like the origin column is overwritten.
    fn load(
        &self,
        reader: &mut dyn Read,
        source_name: &str,
        branch: &str,
        origin_column: &str,
    ) -> Result<Table> {
        let mut table = self.parse(reader, source_name)?;
        table.fill_column(origin_column, Value::text(branch));
        Ok(table)
    }

    /// Same as `load`, reading from a file
    fn load_file(&self, path: &Path, branch: &str, origin_column: &str) -> Result<Table> {
        let source_name = path.display().to_string();
        let file = File::open(path).map_err(|e| {
            PipelineError::parse(&source_name, format!("Failed to open file: {}", e))
        })?;
        let mut reader = BufReader::new(file);

        self.load(&mut reader, &source_name, branch, origin_column)
    }

    /// Check the file extension against this parser's format
    fn can_parse(&self, path: &Path) -> bool {
        detect_format(path).map_or(false, |f| f == self.format())
    }
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Detect the format from the file extension
///
/// # Examples:
/// ```
/// use sales_dashboard::parser::{detect_format, SourceFormat};
/// use std::path::Path;
///
/// assert_eq!(detect_format(Path::new("douala.xlsx")).unwrap(), SourceFormat::Excel);
/// assert_eq!(detect_format(Path::new("yaounde.CSV")).unwrap(), SourceFormat::Csv);
/// ```
pub fn detect_format(path: &Path) -> Result<SourceFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    [SourceFormat::Excel, SourceFormat::Csv, SourceFormat::Json]
        .into_iter()
        .find(|f| f.extensions().contains(&ext.as_str()))
        .ok_or_else(|| {
            PipelineError::parse(
                path.display().to_string(),
                format!("Could not detect source format from extension '{}'", ext),
            )
        })
}

/// Get the parser for a format
pub fn get_parser(format: SourceFormat) -> Box<dyn SourceParser> {
    match format {
        SourceFormat::Excel => Box::new(ExcelParser::new()),
        SourceFormat::Csv => Box::new(CsvParser::new()),
        SourceFormat::Json => Box::new(JsonParser::new()),
    }
}

// ============================================================================
// HEADER HELPERS
// ============================================================================

/// Column names from raw header cells
///
/// Blank headers become `Unnamed: {index}`; repeats get `.1`, `.2`, ...
fn header_names<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::new();

    for (idx, header) in raw.into_iter().enumerate() {
        let header = header.as_ref();
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            header.to_string()
        };

        let count = seen.entry(base.clone()).or_insert(0);
        let name = if *count == 0 {
            base
        } else {
            format!("{}.{}", base, count)
        };
        *count += 1;

        names.push(name);
    }

    names
}

// ============================================================================
// EXCEL
// ============================================================================

/// Spreadsheet parser: first worksheet, first row is the header
pub struct ExcelParser;

impl ExcelParser {
    pub fn new() -> Self {
        ExcelParser
    }

    /// Map a spreadsheet cell, keeping the type the sheet declares
    fn cell_value(cell: &Data) -> Value {
        match cell {
            Data::Empty | Data::Error(_) => Value::Null,
            Data::Int(i) => Value::Integer(*i),
            Data::Float(f) => Value::Number(*f),
            Data::Bool(b) => Value::Bool(*b),
            Data::String(s) => Value::text(s.clone()),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(|d| Value::Date(d.date()))
                .unwrap_or(Value::Null),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Value::text(s.clone()),
        }
    }
}

impl Default for ExcelParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for ExcelParser {
    fn parse(&self, reader: &mut dyn Read, source_name: &str) -> Result<Table> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| PipelineError::parse(source_name, e))?;

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| PipelineError::parse(source_name, e))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| PipelineError::parse(source_name, "Workbook has no worksheet"))?
            .map_err(|e| PipelineError::parse(source_name, e))?;

        let mut rows = range.rows();
        let columns = match rows.next() {
            Some(header) => header_names(header.iter().map(|c| match c {
                Data::Empty => String::new(),
                other => other.to_string(),
            })),
            None => Vec::new(),
        };

        let mut table = Table::new(columns);
        for row in rows {
            table.push_row(row.iter().map(Self::cell_value).collect());
        }

        Ok(table)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Excel
    }
}

// ============================================================================
// CSV
// ============================================================================

/// Delimited text parser: header row required, cell types inferred
pub struct CsvParser {
    delimiter: u8,
}

impl CsvParser {
    pub fn new() -> Self {
        CsvParser { delimiter: b',' }
    }

    /// Builder pattern: other separators (`;` is common in French locales)
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for CsvParser {
    fn parse(&self, reader: &mut dyn Read, source_name: &str) -> Result<Table> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::parse(source_name, e))?
            .clone();

        if headers.is_empty() {
            return Err(PipelineError::parse(source_name, "No columns to parse"));
        }

        let mut table = Table::new(header_names(headers.iter()));

        for (line_num, result) in reader.records().enumerate() {
            // +2 because: 1-indexed + header row
            let record = result.map_err(|e| {
                PipelineError::parse(source_name, format!("line {}: {}", line_num + 2, e))
            })?;

            table.push_row(record.iter().map(Value::infer).collect());
        }

        Ok(table)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Structured document parser: an array of records, columns = union of keys
pub struct JsonParser;

impl JsonParser {
    pub fn new() -> Self {
        JsonParser
    }

    fn json_value(value: &serde_json::Value) -> Value {
        use serde_json::Value as Json;

        match value {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            },
            Json::String(s) => Value::text(s.clone()),
            // Nested structures pass through untouched, as compact JSON
            nested => Value::Text(nested.to_string()),
        }
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for JsonParser {
    fn parse(&self, reader: &mut dyn Read, source_name: &str) -> Result<Table> {
        let json: serde_json::Value = serde_json::from_reader(reader)
            .map_err(|e| PipelineError::parse(source_name, e))?;

        let records = json.as_array().ok_or_else(|| {
            PipelineError::parse(source_name, "Expected a top-level array of records")
        })?;

        let mut objects = Vec::with_capacity(records.len());
        let mut columns: Vec<String> = Vec::new();

        for (idx, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or_else(|| {
                PipelineError::parse(source_name, format!("Record {} is not an object", idx + 1))
            })?;

            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
            objects.push(object);
        }

        let mut table = Table::new(columns.clone());
        for object in objects {
            table.push_row(
                columns
                    .iter()
                    .map(|c| object.get(c).map(Self::json_value).unwrap_or(Value::Null))
                    .collect(),
            );
        }

        Ok(table)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Json
    }
}
