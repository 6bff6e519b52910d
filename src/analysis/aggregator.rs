//! Pivot aggregation.
//!
//! Rows are scanned once into a [`PivotAccumulator`], which tracks the raw
//! value for every (x, y) pair, the label sets for both axes and the running
//! maximum. Only after the scan does [`PivotAccumulator::finish`] produce a
//! [`Pivot`], from which the dense normalized [`Matrix`] is materialized.

use crate::error::{HeatmapError, Result};
use crate::models::{Matrix, PivotFields, Record};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Scan-phase state. Owns everything accumulated from the rows seen so far.
#[derive(Debug, Default)]
pub struct PivotAccumulator {
    cells: HashMap<(String, String), f64>,
    x_labels: BTreeSet<String>,
    y_labels: BTreeSet<String>,
    max_value: Option<f64>,
    rows_read: usize,
}

impl PivotAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one record. `row` is the 1-based data row number, used in errors.
    pub fn push(&mut self, row: usize, record: &Record, fields: &PivotFields) -> Result<()> {
        let value = parse_value(row, record, &fields.value)?;
        let x = field(row, record, &fields.x)?;
        let y = field(row, record, &fields.y)?;

        self.max_value = Some(match self.max_value {
            Some(max) => max.max(value),
            None => value,
        });

        // Duplicate pairs overwrite; earlier values are discarded.
        if let Some(previous) = self.cells.insert((x.to_string(), y.to_string()), value) {
            debug!(
                "Row {}: ({}, {}) overwrites earlier value {} with {}",
                row, x, y, previous, value
            );
        }

        self.x_labels.insert(x.to_string());
        self.y_labels.insert(y.to_string());
        self.rows_read += 1;

        Ok(())
    }

    /// End the scan. Fails if nothing was read or the maximum is zero.
    pub fn finish(self, fields: &PivotFields) -> Result<Pivot> {
        let max_value = self.max_value.ok_or(HeatmapError::EmptyDataset)?;
        if max_value == 0.0 {
            return Err(HeatmapError::ZeroMaximum(fields.value.clone()));
        }

        Ok(Pivot {
            x_labels: self.x_labels.into_iter().collect(),
            y_labels: self.y_labels.into_iter().collect(),
            cells: self.cells,
            max_value,
            rows_read: self.rows_read,
        })
    }
}

/// Finalized scan result with sorted labels.
#[derive(Debug, Clone)]
pub struct Pivot {
    x_labels: Vec<String>,
    y_labels: Vec<String>,
    cells: HashMap<(String, String), f64>,
    max_value: f64,
    rows_read: usize,
}

impl Pivot {
    /// Sorted, distinct X labels (matrix rows).
    pub fn x_labels(&self) -> &[String] {
        &self.x_labels
    }

    /// Sorted, distinct Y labels (matrix columns).
    pub fn y_labels(&self) -> &[String] {
        &self.y_labels
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Raw (un-normalized) value for a pair, if any row supplied it.
    pub fn raw_value(&self, x: &str, y: &str) -> Option<f64> {
        self.cells.get(&(x.to_string(), y.to_string())).copied()
    }

    /// Raw value at matrix coordinates.
    pub fn raw_at(&self, row: usize, col: usize) -> Option<f64> {
        let x = self.x_labels.get(row)?;
        let y = self.y_labels.get(col)?;
        self.raw_value(x, y)
    }

    /// Dense |X| x |Y| matrix; absent pairs are 0.0.
    pub fn normalized_matrix(&self) -> Matrix {
        let rows = self
            .x_labels
            .iter()
            .map(|x| {
                self.y_labels
                    .iter()
                    .map(|y| {
                        self.raw_value(x, y)
                            .map(|v| v / self.max_value)
                            .unwrap_or(0.0)
                    })
                    .collect()
            })
            .collect();

        Matrix::from_rows(rows)
    }

    /// Raw values laid out like the matrix, `None` where absent.
    pub fn raw_matrix(&self) -> Vec<Vec<Option<f64>>> {
        self.x_labels
            .iter()
            .map(|x| self.y_labels.iter().map(|y| self.raw_value(x, y)).collect())
            .collect()
    }
}

/// Scan all rows and return the finalized pivot.
pub fn pivot(rows: &[Record], fields: &PivotFields) -> Result<Pivot> {
    let mut acc = PivotAccumulator::new();
    for (i, record) in rows.iter().enumerate() {
        acc.push(i + 1, record, fields)?;
    }
    let pivot = acc.finish(fields)?;

    debug!(
        "Pivoted {} rows into {}x{} cells, max {}",
        pivot.rows_read,
        pivot.x_labels.len(),
        pivot.y_labels.len(),
        pivot.max_value
    );

    Ok(pivot)
}

/// Aggregate rows into `(matrix, x_labels, y_labels)`.
///
/// Discards the raw values; callers that annotate raw values use [`pivot`].
#[allow(dead_code)]
pub fn aggregate(
    rows: &[Record],
    fields: &PivotFields,
) -> Result<(Matrix, Vec<String>, Vec<String>)> {
    let pivot = pivot(rows, fields)?;
    let matrix = pivot.normalized_matrix();
    Ok((matrix, pivot.x_labels, pivot.y_labels))
}

fn field<'a>(row: usize, record: &'a Record, name: &str) -> Result<&'a str> {
    record
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| HeatmapError::FieldMissing {
            row,
            field: name.to_string(),
        })
}

fn parse_value(row: usize, record: &Record, name: &str) -> Result<f64> {
    let raw = field(row, record, name)?;
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(HeatmapError::Parse {
            row,
            field: name.to_string(),
            value: raw.to_string(),
        }),
    }
}
