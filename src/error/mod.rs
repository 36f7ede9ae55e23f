//! Error handling for the cohort engine.
//!
//! Configuration problems and I/O failures surface as [`Error`]. Problems with
//! individual records never do: they are counted by the loader or modifier
//! that met them and the record is skipped.

pub mod util;

use std::io;
use std::path::{Path, PathBuf};

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Specialized error type for Jerboa
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error opening, reading or writing a file
    #[error("IO error: {message}{}", path_suffix(.path))]
    Io {
        /// Description of the failed operation
        message: String,
        /// File the operation was working on, if any
        path: Option<PathBuf>,
        /// Underlying error
        #[source]
        source: Option<io::Error>,
    },

    /// Error while building or reading Arrow record batches
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Malformed workflow file
    #[error("Workflow file error: {0}")]
    Json(#[from] serde_json::Error),

    /// A modifier rejected its settings while initialising
    #[error("Invalid configuration for {modifier}: {message}")]
    Config {
        /// Name of the modifier being configured
        modifier: String,
        /// What was wrong with the settings
        message: String,
    },

    /// Required column missing from an input table
    #[error("Column '{column}' not found in {table}")]
    ColumnNotFound {
        /// Column name
        column: String,
        /// Input table name
        table: String,
    },

    /// The run was stopped before all patients were processed
    #[error("Run cancelled after {processed} patients")]
    Cancelled {
        /// Patients fully processed before the stop was observed
        processed: usize,
    },

    /// Anything else
    #[error("{0}")]
    Other(String),
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

impl Error {
    /// I/O error without an underlying source
    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// I/O error wrapping the error that caused it
    pub fn io_error_with_source(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            path: None,
            source: Some(source),
        }
    }

    /// Configuration error raised by a modifier's settings parser
    pub fn config(modifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            modifier: modifier.into(),
            message: message.into(),
        }
    }

    /// Attach the path the failing operation worked on
    #[must_use]
    pub fn with_path(mut self, file: &Path) -> Self {
        if let Self::Io { path, .. } = &mut self {
            *path = Some(file.to_path_buf());
        }
        self
    }

    /// Append context to the error message
    #[must_use]
    pub fn context(self, context: impl AsRef<str>) -> Self {
        match self {
            Self::Io {
                message,
                path,
                source,
            } => Self::Io {
                message: format!("{message} - {}", context.as_ref()),
                path,
                source,
            },
            Self::Config { modifier, message } => Self::Config {
                modifier,
                message: format!("{message} - {}", context.as_ref()),
            },
            Self::Other(message) => Self::Other(format!("{message} - {}", context.as_ref())),
            other => other,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
            path: None,
            source: Some(error),
        }
    }
}

/// Result type for Jerboa operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_includes_path() {
        let err = Error::io_error("File not found").with_path(Path::new("/tmp/patients.csv"));
        assert_eq!(err.to_string(), "IO error: File not found (/tmp/patients.csv)");
    }

    #[test]
    fn test_context_appends_to_config_message() {
        let err = Error::config("PopulationDefinition", "bad run-in").context("entry 2");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for PopulationDefinition: bad run-in - entry 2"
        );
    }
}
