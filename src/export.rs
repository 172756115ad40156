// src/export.rs
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

use crate::error::ExtractError;
use crate::table::Table;

/// Delimited output flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Comma-separated, `.csv`.
    Csv,
    /// Tab-separated, `.txt`.
    Txt,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Txt => "txt",
        }
    }

    pub fn delimiter(&self) -> u8 {
        match self {
            ExportFormat::Csv => b',',
            ExportFormat::Txt => b'\t',
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "txt" => Ok(ExportFormat::Txt),
            other => Err(ExtractError::InvalidFormat(other.to_string())),
        }
    }
}

/// Validate requested formats, dropping duplicates but keeping order.
pub fn normalize_formats<S: AsRef<str>>(requested: &[S]) -> Result<Vec<ExportFormat>, ExtractError> {
    if requested.is_empty() {
        return Err(ExtractError::InvalidFormat(String::new()));
    }
    let mut formats = Vec::with_capacity(requested.len());
    for raw in requested {
        let format: ExportFormat = raw.as_ref().parse()?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    Ok(formats)
}

/// File stem for a table label: spaces become underscores, lower-cased.
pub fn file_stem(label: &str) -> String {
    label.replace(' ', "_").to_lowercase()
}

/// Write `table` into `dir` as `<stem>.<ext>`, returning the path written.
pub fn write_table(
    table: &Table,
    label: &str,
    dir: &Path,
    format: ExportFormat,
) -> Result<PathBuf, ExtractError> {
    let path = dir.join(format!("{}.{}", file_stem(label), format.extension()));
    let csv_err = |source| ExtractError::Csv {
        path: path.clone(),
        source,
    };

    let mut wtr = WriterBuilder::new()
        .delimiter(format.delimiter())
        .from_path(&path)
        .map_err(csv_err)?;
    wtr.write_record(&table.columns).map_err(csv_err)?;
    for row in &table.rows {
        wtr.write_record(row).map_err(csv_err)?;
    }
    wtr.flush().map_err(|e| ExtractError::io(&path, e))?;

    debug!(path = %path.display(), rows = table.len(), %format, "table written");
    Ok(path)
}

/// Write `table` once per format.
pub fn export_table(
    table: &Table,
    label: &str,
    dir: &Path,
    formats: &[ExportFormat],
) -> Result<Vec<PathBuf>, ExtractError> {
    let written = formats
        .iter()
        .map(|f| write_table(table, label, dir, *f))
        .collect::<Result<Vec<_>, _>>()?;
    info!(table = label, files = written.len(), "table exported");
    Ok(written)
}

/// Load a file previously written by [`write_table`]. The delimiter follows
/// the extension; anything unrecognised is read as comma-separated.
pub fn read_table_file(path: &Path) -> Result<Table, ExtractError> {
    let format = ExportFormat::from_path(path).unwrap_or(ExportFormat::Csv);
    let csv_err = |source| ExtractError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = ReaderBuilder::new()
        .delimiter(format.delimiter())
        .has_headers(true)
        .from_path(path)
        .map_err(csv_err)?;
    let columns: Vec<String> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Table::new(columns, rows))
}
