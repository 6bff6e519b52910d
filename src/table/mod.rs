//! Table ingest.
//!
//! Reads a whole delimited table from a file or standard input and returns
//! its rows as field-name to string mappings. FSDB input (a first line of
//! the form `#fsdb -F t col1 col2 ...`) is recognized automatically; anything
//! else is treated as delimited text whose first line names the columns.

use crate::error::{HeatmapError, Result};
use crate::models::{InputFormat, Record};
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};

/// Configuration for table reading.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Input format, or `Auto` to sniff the first line
    pub format: InputFormat,
    /// Field delimiter for CSV input
    pub delimiter: u8,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            format: InputFormat::Auto,
            delimiter: b',',
        }
    }
}

impl TryFrom<&crate::config::InputConfig> for TableConfig {
    type Error = HeatmapError;

    fn try_from(config: &crate::config::InputConfig) -> Result<Self> {
        Ok(Self {
            format: config.format,
            delimiter: parse_delimiter(&config.delimiter)?,
        })
    }
}

/// Where the table comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Stdin,
    Path(PathBuf),
}

impl Source {
    /// `None` and `-` both mean standard input.
    pub fn from_arg(path: Option<&PathBuf>) -> Self {
        match path {
            Some(p) if p.as_os_str() != "-" => Source::Path(p.clone()),
            _ => Source::Stdin,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Source::Stdin => "<stdin>".to_string(),
            Source::Path(p) => p.display().to_string(),
        }
    }
}

/// Column separator declared by an FSDB header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// A single literal byte (`-F t`, `-F C,`)
    Char(u8),
    /// Runs of whitespace (`-F s`, `-F D`, or no `-F`)
    Whitespace,
    /// Two or more spaces (`-F S`)
    DoubleSpace,
}

/// Parsed `#fsdb` header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsdbHeader {
    pub separator: Separator,
    pub columns: Vec<String>,
}

impl FsdbHeader {
    /// Parse a header such as `#fsdb -F t name count:l`.
    pub fn parse(line: &str) -> Result<Self> {
        let rest = line
            .trim_end()
            .strip_prefix("#fsdb")
            .ok_or_else(|| HeatmapError::Table("FSDB header must start with #fsdb".to_string()))?;

        let mut separator = Separator::Whitespace;
        let mut columns = Vec::new();
        let mut tokens = rest.split_whitespace();

        while let Some(token) = tokens.next() {
            match token {
                "-F" => {
                    let code = tokens.next().ok_or_else(|| {
                        HeatmapError::Table("-F in FSDB header needs a separator code".to_string())
                    })?;
                    separator = separator_from_code(code)?;
                }
                "-R" => {
                    // row layout option; value unused
                    tokens.next();
                }
                t if t.starts_with("-F") => separator = separator_from_code(&t[2..])?,
                t if t.starts_with('-') => debug!("Ignoring FSDB header option {}", t),
                t => {
                    let name = t.split(':').next().unwrap_or(t);
                    columns.push(name.to_string());
                }
            }
        }

        if columns.is_empty() {
            return Err(HeatmapError::Table(
                "FSDB header declares no columns".to_string(),
            ));
        }

        Ok(Self { separator, columns })
    }
}

fn separator_from_code(code: &str) -> Result<Separator> {
    match code {
        "t" => Ok(Separator::Char(b'\t')),
        "s" | "D" => Ok(Separator::Whitespace),
        "S" => Ok(Separator::DoubleSpace),
        c if c.len() == 2 && c.starts_with('C') => Ok(Separator::Char(c.as_bytes()[1])),
        other => Err(HeatmapError::Table(format!(
            "unsupported FSDB separator code '{}'",
            other
        ))),
    }
}

/// Accepts a single byte, or the names `\t` / `tab`.
pub fn parse_delimiter(s: &str) -> Result<u8> {
    match s {
        "\\t" | "tab" => Ok(b'\t'),
        _ if s.len() == 1 => Ok(s.as_bytes()[0]),
        _ => Err(HeatmapError::Usage(format!(
            "delimiter must be a single character, got '{}'",
            s
        ))),
    }
}

/// Reads whole tables into memory.
pub struct TableReader {
    config: TableConfig,
}

impl TableReader {
    pub fn new(config: TableConfig) -> Self {
        Self { config }
    }

    /// Read every row from the source.
    pub fn read_source(&self, source: &Source) -> Result<Vec<Record>> {
        let text = match source {
            Source::Stdin => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|e| HeatmapError::io("<stdin>", e))?;
                buf
            }
            Source::Path(path) => {
                std::fs::read_to_string(path).map_err(|e| HeatmapError::io(path, e))?
            }
        };

        let rows = self.parse_str(&text)?;
        info!("Read {} rows from {}", rows.len(), source.describe());
        Ok(rows)
    }

    /// Parse an in-memory table.
    pub fn parse_str(&self, text: &str) -> Result<Vec<Record>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let format = match self.config.format {
            InputFormat::Auto => sniff_format(text),
            other => other,
        };
        debug!("Parsing input as {}", format);

        match format {
            InputFormat::Fsdb => parse_fsdb(text),
            InputFormat::Tsv => parse_delimited(text, b'\t', false),
            InputFormat::Csv | InputFormat::Auto => {
                parse_delimited(text, self.config.delimiter, true)
            }
        }
    }
}

fn sniff_format(text: &str) -> InputFormat {
    let first = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if first.starts_with("#fsdb") {
        InputFormat::Fsdb
    } else {
        InputFormat::Csv
    }
}

fn parse_fsdb(text: &str) -> Result<Vec<Record>> {
    let mut lines = text.lines().skip_while(|l| l.trim().is_empty());
    let header_line = lines
        .next()
        .ok_or_else(|| HeatmapError::Table("input is empty; expected #fsdb header".to_string()))?;
    let header = FsdbHeader::parse(header_line)?;
    debug!(
        "FSDB header: {:?} separator, columns {:?}",
        header.separator, header.columns
    );

    match header.separator {
        Separator::Char(sep) => {
            let body = data_lines(lines);
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .delimiter(sep)
                .quoting(false)
                .flexible(true)
                .from_reader(body.as_bytes());

            let mut rows = Vec::new();
            for result in reader.records() {
                let record = result?;
                rows.push(build_record(&header.columns, record.iter(), rows.len() + 1));
            }
            Ok(rows)
        }
        Separator::Whitespace | Separator::DoubleSpace => {
            let rows = lines
                .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
                .enumerate()
                .map(|(i, line)| {
                    let fields: Vec<&str> = if header.separator == Separator::Whitespace {
                        line.split_whitespace().collect()
                    } else {
                        line.split("  ")
                            .map(str::trim)
                            .filter(|f| !f.is_empty())
                            .collect()
                    };
                    build_record(&header.columns, fields.into_iter(), i + 1)
                })
                .collect();
            Ok(rows)
        }
    }
}

fn parse_delimited(text: &str, delimiter: u8, quoting: bool) -> Result<Vec<Record>> {
    let body = data_lines(text.lines());
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .quoting(quoting)
        .flexible(true)
        .from_reader(body.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    if columns.iter().all(|c| c.is_empty()) {
        return Err(HeatmapError::Table("header line names no columns".to_string()));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(build_record(&columns, record.iter(), rows.len() + 1));
    }
    Ok(rows)
}

/// Drop blank and `#` comment lines, newline-terminating each kept line.
fn data_lines<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    let mut body = String::new();
    for line in lines.filter(|l| !l.trim().is_empty() && !l.starts_with('#')) {
        body.push_str(line);
        body.push('\n');
    }
    body
}

/// Zip header names with field values. Short rows lack the trailing fields.
fn build_record<'a>(
    columns: &[String],
    fields: impl Iterator<Item = &'a str>,
    row: usize,
) -> Record {
    let mut record = Record::with_capacity(columns.len());
    let mut extra = 0;

    for (i, value) in fields.enumerate() {
        match columns.get(i) {
            Some(name) => {
                record.insert(name.clone(), value.to_string());
            }
            None => extra += 1,
        }
    }

    if extra > 0 {
        debug!("Row {}: ignoring {} fields beyond the header", row, extra);
    }

    record
}
