//! Data models for the heatmap tool.
//!
//! This module contains the core data structures shared between
//! table ingest, aggregation, rendering and export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One input record: field name to raw string value.
pub type Record = HashMap<String, String>;

/// Format of the input table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// FSDB if the first line starts with `#fsdb`, otherwise delimited text
    #[default]
    Auto,
    /// FSDB with a `#fsdb -F <sep> ...` header
    Fsdb,
    /// Comma (or `--delimiter`) separated values with a header line
    Csv,
    /// Tab separated values with a header line
    Tsv,
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Auto => write!(f, "auto"),
            InputFormat::Fsdb => write!(f, "fsdb"),
            InputFormat::Csv => write!(f, "csv"),
            InputFormat::Tsv => write!(f, "tsv"),
        }
    }
}

/// Names of the fields used to pivot the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotFields {
    /// Field whose values become matrix rows.
    pub x: String,
    /// Field whose values become matrix columns.
    pub y: String,
    /// Numeric field whose values fill the cells.
    pub value: String,
}

impl PivotFields {
    pub fn new(x: impl Into<String>, y: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            value: value.into(),
        }
    }
}

/// Dense row-major matrix of normalized cell values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Matrix {
    rows: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// (row count, column count)
    pub fn dims(&self) -> (usize, usize) {
        let cols = self.rows.first().map(|r| r.len()).unwrap_or(0);
        (self.rows.len(), cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Returns a copy with every cell replaced by `1 - cell`.
    pub fn inverted(&self) -> Matrix {
        Matrix {
            rows: self
                .rows
                .iter()
                .map(|r| r.iter().map(|v| 1.0 - v).collect())
                .collect(),
        }
    }
}

/// Which text, if any, is drawn inside each cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Annotation {
    #[default]
    None,
    /// Normalized fraction, one decimal place
    Fractions,
    /// Raw value truncated to an integer
    Raw,
}

impl Annotation {
    /// Fractions take precedence when both flags are set.
    pub fn from_flags(fractions: bool, raw: bool) -> Self {
        if fractions {
            Annotation::Fractions
        } else if raw {
            Annotation::Raw
        } else {
            Annotation::None
        }
    }
}

/// Metadata attached to a matrix export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// When the export was produced.
    pub generated_at: DateTime<Utc>,
    /// Field used for matrix rows.
    pub x_field: String,
    /// Field used for matrix columns.
    pub y_field: String,
    /// Field holding the plotted values.
    pub value_field: String,
    /// Number of data rows consumed.
    pub rows_read: usize,
    /// Normalization divisor.
    pub max_value: f64,
}

/// JSON document written by `--matrix-out`.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixExport {
    pub metadata: ExportMetadata,
    pub x_labels: Vec<String>,
    pub y_labels: Vec<String>,
    pub matrix: Matrix,
    /// Raw values; `None` where no row supplied the pair.
    pub raw: Vec<Vec<Option<f64>>>,
}
