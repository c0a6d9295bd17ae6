// src/error.rs
use thiserror::Error;

/// Failures a report build can surface to its caller.
///
/// Dirty cells (a number or date that does not parse) are not errors: the
/// derivers absorb them and log a count instead.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("source unavailable: {location}: {reason}")]
    SourceUnavailable { location: String, reason: String },

    #[error("table `{table}` is missing required column `{column}`")]
    InsufficientColumns { table: String, column: String },

    #[error("could not write artifact {path}: {reason}")]
    ArtifactWriteFailure { path: String, reason: String },

    #[error("render error: {0}")]
    Render(String),

    #[error("table error: {0}")]
    Table(#[from] arrow::error::ArrowError),
}

impl ReportError {
    pub fn unavailable(location: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        ReportError::SourceUnavailable {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_column(table: &str, column: &str) -> Self {
        ReportError::InsufficientColumns {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
