// 🔗 Consolidation - one global table from every branch
//
// Rows are concatenated in branch order, never deduplicated. The column
// set is the union of all sources; a source that lacks a column
// contributes nulls for it.

use crate::config::ColumnNames;
use crate::error::{PipelineError, Result};
use crate::table::{Table, Value};
use crate::temporal::{coerce_date, MonthLocale};
use std::collections::HashMap;

/// Merge per-branch tables into the global table
///
/// Expects one table per configured branch, in branch order; callers
/// check that every source was loaded. When the date column exists, its
/// cells are coerced to dates and the month columns are derived.
pub fn consolidate(
    sources: Vec<Table>,
    columns: &ColumnNames,
    locale: MonthLocale,
) -> Result<Table> {
    let mut union: Vec<String> = Vec::new();
    for source in &sources {
        for column in source.columns() {
            if !union.contains(column) {
                union.push(column.clone());
            }
        }
    }

    let index: HashMap<String, usize> = union
        .iter()
        .enumerate()
        .map(|(i, c)| (c.clone(), i))
        .collect();

    let mut global = Table::new(union.clone());
    for source in sources {
        let (source_columns, rows) = source.into_parts();
        let positions: Vec<Option<usize>> = source_columns
            .iter()
            .map(|c| index.get(c).copied())
            .collect();

        for row in rows {
            let mut cells = vec![Value::Null; union.len()];
            for (cell, position) in row.into_iter().zip(&positions) {
                if let Some(idx) = position {
                    cells[*idx] = cell;
                }
            }
            global.push_row(cells);
        }
    }

    if global.has_column(&columns.date) {
        derive_calendar_fields(&mut global, columns, locale)?;
    }

    Ok(global)
}

/// Coerce the date column in place and append the month columns
///
/// Row numbers in `DateParse` errors are 0-based positions in the
/// global table.
pub fn derive_calendar_fields(
    table: &mut Table,
    columns: &ColumnNames,
    locale: MonthLocale,
) -> Result<()> {
    let dates = table
        .column(&columns.date)
        .ok_or_else(|| PipelineError::missing_column(&columns.date))?
        .enumerate()
        .map(|(row, value)| coerce_date(row, value))
        .collect::<Result<Vec<Value>>>()?;

    let (months, names): (Vec<Value>, Vec<Value>) =
        dates.iter().map(|d| locale.month_fields(d)).unzip();

    table.set_column(&columns.date, dates);
    table.set_column(&columns.month, months);
    table.set_column(&columns.month_name, names);

    Ok(())
}
