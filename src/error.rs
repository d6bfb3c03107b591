// ⚠️ Pipeline Errors
// Every stage returns these unmodified; only the presentation layer renders them.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Malformed source file (any format) or a file that could not be read
    #[error("Failed to parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// A date cell that matches none of the accepted formats
    #[error("Unparseable date at row {row}: {value:?}")]
    DateParse { row: usize, value: String },

    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    /// Not every configured branch has a source yet
    #[error("Waiting for input from: {}", missing.join(", "))]
    IncompleteInput { missing: Vec<String> },

    #[error("Non-numeric amount at row {row}: {value:?}")]
    InvalidAmount { row: usize, value: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn parse(source_name: impl Into<String>, message: impl ToString) -> Self {
        PipelineError::Parse {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn missing_column(column: &str) -> Self {
        PipelineError::MissingColumn {
            column: column.to_string(),
        }
    }

    /// Incomplete input is a wait-state, not a failure
    pub fn is_waiting(&self) -> bool {
        matches!(self, PipelineError::IncompleteInput { .. })
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
