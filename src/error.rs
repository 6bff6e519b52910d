//! Error types for table ingest, aggregation and rendering.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a heatmap run.
#[derive(Debug, Error)]
pub enum HeatmapError {
    /// Invalid command-line usage (wrong number of columns, bad flags)
    #[error("Usage error: {0}")]
    Usage(String),

    /// A record lacks one of the pivot or value fields
    #[error("Row {row}: missing field '{field}'")]
    FieldMissing { row: usize, field: String },

    /// The value field is not a finite number
    #[error("Row {row}: value '{value}' in field '{field}' is not a finite number")]
    Parse {
        row: usize,
        field: String,
        value: String,
    },

    /// No data rows were read, so there is nothing to normalize against
    #[error("Input contains no data rows")]
    EmptyDataset,

    /// Every value was zero, so normalization would divide by zero
    #[error("Maximum value in field '{0}' is zero; cannot normalize")]
    ZeroMaximum(String),

    /// The input table itself is malformed (bad header, bad delimiter)
    #[error("Malformed table: {0}")]
    Table(String),

    /// Reading input or writing output failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Delimited reader error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The drawing backend failed
    #[error("Render error: {0}")]
    Render(String),
}

impl HeatmapError {
    /// Wrap an I/O error together with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HeatmapError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error stems from how the tool was invoked.
    pub fn is_usage(&self) -> bool {
        matches!(self, HeatmapError::Usage(_))
    }
}

/// Type alias for Results using HeatmapError
pub type Result<T> = std::result::Result<T, HeatmapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_missing_message() {
        let err = HeatmapError::FieldMissing {
            row: 3,
            field: "x".to_string(),
        };
        assert_eq!(err.to_string(), "Row 3: missing field 'x'");
        assert!(!err.is_usage());
    }

    #[test]
    fn test_io_message_names_path() {
        let err = HeatmapError::io(
            "/no/such/file.fsdb",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert!(err.to_string().contains("/no/such/file.fsdb"));
    }

    #[test]
    fn test_usage_flag() {
        assert!(HeatmapError::Usage("bad".to_string()).is_usage());
    }
}
