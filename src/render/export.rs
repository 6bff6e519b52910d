//! JSON export of the pivoted matrix.

use crate::analysis::Pivot;
use crate::error::{HeatmapError, Result};
use crate::models::{ExportMetadata, MatrixExport, PivotFields};
use chrono::Utc;
use std::io::Write;
use std::path::Path;

/// Build the export document for a pivot.
pub fn build_export(pivot: &Pivot, fields: &PivotFields) -> MatrixExport {
    MatrixExport {
        metadata: ExportMetadata {
            generated_at: Utc::now(),
            x_field: fields.x.clone(),
            y_field: fields.y.clone(),
            value_field: fields.value.clone(),
            rows_read: pivot.rows_read(),
            max_value: pivot.max_value(),
        },
        x_labels: pivot.x_labels().to_vec(),
        y_labels: pivot.y_labels().to_vec(),
        matrix: pivot.normalized_matrix(),
        raw: pivot.raw_matrix(),
    }
}

/// Generate the pretty-printed JSON document.
pub fn generate_json_export(export: &MatrixExport) -> Result<String> {
    serde_json::to_string_pretty(export)
        .map_err(|e| HeatmapError::Render(format!("failed to serialize matrix: {}", e)))
}

/// Write the JSON export to a file.
pub fn write_json_export(export: &MatrixExport, path: &Path) -> Result<()> {
    let content = generate_json_export(export)?;

    let mut file = std::fs::File::create(path).map_err(|e| HeatmapError::io(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| HeatmapError::io(path, e))?;

    Ok(())
}
