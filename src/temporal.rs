// ⏰ Temporal Fields - date coercion and calendar month naming
//
// Sources disagree on how dates look: spreadsheets carry real date cells,
// CSV and JSON carry text. Everything is coerced to a calendar date once,
// during consolidation.

use crate::error::{PipelineError, Result};
use crate::table::Value;
use chrono::{DateTime, Datelike, Month, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// DATE PARSING
// ============================================================================

/// Plain calendar dates, tried in order (first match wins)
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Timestamps whose time part is dropped (`%.f` also accepts no fraction)
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a textual date in any accepted format
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    let naive = s.strip_suffix('Z').unwrap_or(s);
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.date());
        }
    }

    // "2024-01-15T10:00:00+01:00" keeps the local calendar date
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

/// Coerce one cell of the date column
///
/// Missing dates stay missing; anything that is present but not a date
/// aborts consolidation.
pub fn coerce_date(row: usize, value: &Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Date(d) => Ok(Value::Date(*d)),
        Value::Text(s) => parse_date(s)
            .map(Value::Date)
            .ok_or_else(|| PipelineError::DateParse {
                row,
                value: s.clone(),
            }),
        other => Err(PipelineError::DateParse {
            row,
            value: other.to_string(),
        }),
    }
}

// ============================================================================
// MONTH NAMES
// ============================================================================

const FRENCH_MONTHS: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

/// Language used for the derived month-name column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonthLocale {
    #[default]
    En,
    Fr,
}

impl MonthLocale {
    /// Full month name for month 1-12
    pub fn month_name(&self, month: u32) -> Option<&'static str> {
        let m = u8::try_from(month).ok()?;
        let month = Month::try_from(m).ok()?;
        Some(match self {
            MonthLocale::En => month.name(),
            MonthLocale::Fr => FRENCH_MONTHS[month.number_from_month() as usize - 1],
        })
    }

    /// (Month, MonthName) cells derived from a coerced date cell
    pub fn month_fields(&self, date: &Value) -> (Value, Value) {
        match date.as_date() {
            Some(d) => {
                let name = self
                    .month_name(d.month())
                    .map(Value::text)
                    .unwrap_or(Value::Null);
                (Value::Integer(i64::from(d.month())), name)
            }
            None => (Value::Null, Value::Null),
        }
    }
}

impl FromStr for MonthLocale {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "en" => Ok(MonthLocale::En),
            "fr" => Ok(MonthLocale::Fr),
            other => Err(PipelineError::Config(format!(
                "Unknown locale '{}' (expected 'en' or 'fr')",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-01-15"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024/01/15"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("01/15/2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("15.01.2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15T08:30:00"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15 08:30:00.250"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15T08:30:00Z"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15T23:30:00-05:00"), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_parse_date_month_first() {
        // Ambiguous slashed dates read month first
        assert_eq!(parse_date("02/03/2024"), Some(ymd(2024, 2, 3)));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2024-13-01"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_coerce_date() {
        assert_eq!(coerce_date(0, &Value::Null).unwrap(), Value::Null);
        assert_eq!(
            coerce_date(0, &Value::text("2024-03-01")).unwrap(),
            Value::Date(ymd(2024, 3, 1))
        );

        let err = coerce_date(4, &Value::text("yesterday")).unwrap_err();
        assert_eq!(
            err,
            PipelineError::DateParse {
                row: 4,
                value: "yesterday".to_string()
            }
        );

        assert!(coerce_date(1, &Value::Integer(45000)).is_err());
    }

    #[test]
    fn test_month_names() {
        assert_eq!(MonthLocale::En.month_name(1), Some("January"));
        assert_eq!(MonthLocale::Fr.month_name(8), Some("août"));
        assert_eq!(MonthLocale::En.month_name(0), None);
        assert_eq!(MonthLocale::En.month_name(13), None);
    }

    #[test]
    fn test_month_fields() {
        let (month, name) = MonthLocale::Fr.month_fields(&Value::Date(ymd(2024, 12, 24)));
        assert_eq!(month, Value::Integer(12));
        assert_eq!(name, Value::text("décembre"));

        assert_eq!(
            MonthLocale::En.month_fields(&Value::Null),
            (Value::Null, Value::Null)
        );
    }

    #[test]
    fn test_locale_from_str() {
        assert_eq!("FR".parse::<MonthLocale>().unwrap(), MonthLocale::Fr);
        assert!("de".parse::<MonthLocale>().is_err());
    }
}
