// Sales Dashboard - Core Library
// Branch exports → one global table → KPIs, shared by the CLI, TUI and API server

pub mod error;
pub mod table;
pub mod temporal;
pub mod config;
pub mod parser;
pub mod consolidate;
pub mod kpi;
pub mod report;
pub mod pipeline;
pub mod logging;

#[cfg(feature = "tui")]
pub mod ui;
#[cfg(feature = "server")]
pub mod server;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use error::{PipelineError, Result};
pub use table::{Row, Table, Value};
pub use temporal::{coerce_date, parse_date, MonthLocale};
pub use config::{BranchConfig, ColumnNames, Config};
pub use parser::{
    detect_format, get_parser, CsvParser, ExcelParser, JsonParser, SourceFormat, SourceParser,
};
pub use consolidate::{consolidate, derive_calendar_fields};
pub use kpi::{aggregate, KpiBundle, MonthKey, SellerKey};
pub use report::{format_amount, BranchStat, DashboardSummary, DateRange, MonthStat, SellerStat};
pub use pipeline::{check_inputs, load_sources, run, run_tables, Dashboard};
pub use logging::init_logging;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
