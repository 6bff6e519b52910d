//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.dbheatmap.toml` files.

use crate::models::InputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".dbheatmap.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Render settings.
    #[serde(default)]
    pub render: RenderConfig,
}

/// Input table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Input format (auto, fsdb, csv, tsv).
    #[serde(default)]
    pub format: InputFormat,

    /// Delimiter for CSV input.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Numeric column plotted when `--value-column` is not given.
    #[serde(default = "default_value_column")]
    pub value_column: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            format: InputFormat::default(),
            delimiter: default_delimiter(),
            value_column: default_value_column(),
        }
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_value_column() -> String {
    "count".to_string()
}

/// Image rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Edge length of one heatmap cell in pixels.
    #[serde(default = "default_cell_size")]
    pub cell_size: u32,

    /// Font size for cell annotations and axis labels.
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Font family used for all text.
    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Color of cell annotations, as `#rrggbb`.
    #[serde(default = "default_annotation_color")]
    pub annotation_color: String,

    /// Space reserved for tick labels, in pixels.
    #[serde(default = "default_label_margin")]
    pub label_margin: u32,

    /// Draw the field names as axis titles.
    #[serde(default = "default_true")]
    pub axis_titles: bool,

    /// Upper bound on image width and height; cells shrink to fit.
    #[serde(default = "default_max_image_size")]
    pub max_image_size: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            font_size: default_font_size(),
            font_family: default_font_family(),
            annotation_color: default_annotation_color(),
            label_margin: default_label_margin(),
            axis_titles: true,
            max_image_size: default_max_image_size(),
        }
    }
}

fn default_cell_size() -> u32 {
    40
}

fn default_font_size() -> u32 {
    12
}

fn default_font_family() -> String {
    "sans-serif".to_string()
}

fn default_annotation_color() -> String {
    "#ff0000".to_string()
}

fn default_label_margin() -> u32 {
    120
}

fn default_max_image_size() -> u32 {
    4096
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// where the CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref value_column) = args.value_column {
            self.input.value_column = value_column.clone();
        }
        if let Some(format) = args.input_format {
            self.input.format = format;
        }
        if let Some(ref delimiter) = args.delimiter {
            self.input.delimiter = delimiter.clone();
        }
        if let Some(font_size) = args.font_size {
            self.render.font_size = font_size;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.input.value_column, "count");
        assert_eq!(config.input.format, InputFormat::Auto);
        assert_eq!(config.render.cell_size, 40);
        assert!(config.render.axis_titles);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r##"
[input]
format = "tsv"
value_column = "bytes"

[render]
cell_size = 16
annotation_color = "#0000ff"
axis_titles = false
"##;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.format, InputFormat::Tsv);
        assert_eq!(config.input.value_column, "bytes");
        assert_eq!(config.input.delimiter, ",");
        assert_eq!(config.render.cell_size, 16);
        assert_eq!(config.render.font_size, 12);
        assert_eq!(config.render.annotation_color, "#0000ff");
        assert!(!config.render.axis_titles);
        assert_eq!(config.render.max_image_size, 4096);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[render]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.render.label_margin, 120);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load(Path::new("/nonexistent/.dbheatmap.toml")).is_err());
    }
}
