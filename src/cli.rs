//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{Annotation, InputFormat};
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// dbheatmap - render a grayscale heatmap from two columns of a table
///
/// Pivots the table on two categorical columns, normalizes a numeric
/// column against its maximum and writes the grid as a PNG.
///
/// Examples:
///   dbheatmap -c src dst input.fsdb out.png
///   dbheatmap -c hour weekday -v requests -F -L traffic.fsdb
///   cat data.csv | dbheatmap -c x y -v total --input-format csv - grid.png
///   dbheatmap --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The two columns to pivot on: X (rows) then Y (columns)
    #[arg(short, long, num_args = 2, value_names = ["X", "Y"])]
    pub columns: Vec<String>,

    /// The value column to plot as the heat map [default: count]
    #[arg(short = 'v', long, value_name = "NAME")]
    pub value_column: Option<String>,

    /// Invert the foreground/background colors
    #[arg(short, long)]
    pub invert: bool,

    /// Add text fraction labels to the grid
    #[arg(short = 'F', long)]
    pub add_fractions: bool,

    /// Add text raw-value labels to the grid
    ///
    /// Ignored when --add-fractions is also given.
    #[arg(short = 'R', long)]
    pub add_raw: bool,

    /// Add x/y axis labels
    #[arg(short = 'L', long)]
    pub add_labels: bool,

    /// Set the font size for labels (also accepted as -fs)
    #[arg(long, value_name = "N")]
    pub font_size: Option<u32>,

    /// Input table to read (`-` or omitted for standard input)
    #[arg(value_name = "INPUT_FILE")]
    pub input_file: Option<PathBuf>,

    /// Where to write the png file to
    #[arg(value_name = "OUTPUT_FILE", default_value = "out.png")]
    pub output_file: PathBuf,

    /// Input table format
    #[arg(long, value_name = "FORMAT")]
    pub input_format: Option<InputFormat>,

    /// Field delimiter for csv input
    #[arg(short, long, value_name = "CHAR")]
    pub delimiter: Option<String>,

    /// Also write the normalized matrix and labels as JSON
    #[arg(long, value_name = "FILE")]
    pub matrix_out: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .dbheatmap.toml in the current directory
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .dbheatmap.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_legacy_flags(std::env::args_os()))
    }

    /// The X and Y pivot columns. Only meaningful after `validate`.
    pub fn pivot_columns(&self) -> (&str, &str) {
        match self.columns.as_slice() {
            [x, y] => (x.as_str(), y.as_str()),
            _ => ("", ""),
        }
    }

    /// Which cell annotation to draw.
    pub fn annotation(&self) -> Annotation {
        Annotation::from_flags(self.add_fractions, self.add_raw)
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.columns.len() != 2 {
            return Err("exactly 2 columns must be passed to -c".to_string());
        }

        if self.columns.iter().any(|c| c.is_empty()) {
            return Err("column names passed to -c must not be empty".to_string());
        }

        if let Some(ref value) = self.value_column {
            if value.is_empty() {
                return Err("value column name must not be empty".to_string());
            }
        }

        if self.font_size == Some(0) {
            return Err("Font size must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

/// Rewrite the two-letter `-fs` flag into `--font-size`, which clap can parse.
pub fn normalize_legacy_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-fs") => OsString::from("--font-size"),
            Some(s) if s.starts_with("-fs=") => OsString::from(format!("--font-size={}", &s[4..])),
            _ => arg,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        let argv = std::iter::once("dbheatmap")
            .chain(args.iter().copied())
            .map(OsString::from);
        Args::try_parse_from(normalize_legacy_flags(argv))
    }

    #[test]
    fn test_full_command_line() {
        let args = parse(&[
            "-c", "src", "dst", "-v", "bytes", "-i", "-F", "-L", "-fs", "9", "in.fsdb", "grid.png",
        ])
        .unwrap();

        assert_eq!(args.pivot_columns(), ("src", "dst"));
        assert_eq!(args.value_column.as_deref(), Some("bytes"));
        assert!(args.invert);
        assert!(args.add_labels);
        assert_eq!(args.font_size, Some(9));
        assert_eq!(args.input_file, Some(PathBuf::from("in.fsdb")));
        assert_eq!(args.output_file, PathBuf::from("grid.png"));
        assert_eq!(args.annotation(), Annotation::Fractions);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["-c", "a", "b"]).unwrap();
        assert_eq!(args.input_file, None);
        assert_eq!(args.output_file, PathBuf::from("out.png"));
        assert_eq!(args.value_column, None);
        assert_eq!(args.annotation(), Annotation::None);
    }

    #[test]
    fn test_long_flags() {
        let args = parse(&[
            "--columns",
            "a",
            "b",
            "--add-raw",
            "--font-size=14",
            "--input-format",
            "tsv",
        ])
        .unwrap();
        assert_eq!(args.annotation(), Annotation::Raw);
        assert_eq!(args.font_size, Some(14));
        assert_eq!(args.input_format, Some(InputFormat::Tsv));
    }

    #[test]
    fn test_one_column_rejected_by_parser() {
        assert!(parse(&["-c", "a"]).is_err());
    }

    #[test]
    fn test_missing_columns_rejected_by_validate() {
        let args = parse(&["in.fsdb"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_column_check() {
        let args = parse(&["--init-config"]).unwrap();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = parse(&["-c", "a", "b", "--verbose", "-q"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_font_size() {
        let args = parse(&["-c", "a", "b", "-fs=0"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&["-c", "a", "b"]).unwrap();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
