// src/debug_log.rs
//! Append-only diagnostic log of raw host responses.
//!
//! Writing is best effort: a failure to log is reported through `tracing`
//! and never interrupts an extraction.

use chrono::Local;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::host::Value;

pub const FILE_NAME: &str = "debug_tables.log";

/// How many raw data values an entry keeps.
pub const DATA_SAMPLE: usize = 50;

/// One diagnostic record.
#[derive(Debug, Default)]
pub struct DebugEntry<'a> {
    pub table: &'a str,
    pub reason: String,
    pub raw: Option<&'a Value>,
    pub headings: Option<&'a Value>,
    pub data: Option<&'a Value>,
    pub preview: Option<String>,
}

impl<'a> DebugEntry<'a> {
    pub fn new(table: &'a str, reason: impl Into<String>) -> Self {
        Self {
            table,
            reason: reason.into(),
            ..Self::default()
        }
    }

    fn render(&self) -> String {
        let mut out = format!(
            "=== {} | {} ===\nReason: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.table,
            self.reason
        );
        if let Some(raw) = self.raw {
            out.push_str(&format!("Raw response: {}\n", raw));
        }
        if let Some(headings) = self.headings {
            out.push_str(&format!("Raw headings: {}\n", headings));
        }
        if let Some(data) = self.data {
            let sample: Vec<Value> = data.flatten_cells().into_iter().take(DATA_SAMPLE).collect();
            out.push_str(&format!(
                "Raw data (first {}): {}\n",
                DATA_SAMPLE,
                Value::List(sample)
            ));
        }
        if let Some(preview) = &self.preview {
            out.push_str("Preview:\n");
            out.push_str(preview);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// Target file plus whether optional entries are wanted.
#[derive(Debug, Clone)]
pub struct DebugLog {
    path: PathBuf,
    verbose: bool,
}

impl DebugLog {
    /// Log in `dir`, or in the current directory when none is given.
    pub fn in_dir(dir: Option<&Path>, verbose: bool) -> Self {
        let dir = dir.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: dir.join(FILE_NAME),
            verbose,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether entries beyond the mandatory empty-table record are wanted.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn append(&self, entry: &DebugEntry<'_>) -> Result<(), ExtractError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtractError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ExtractError::io(&self.path, e))?;
        file.write_all(entry.render().as_bytes())
            .map_err(|e| ExtractError::io(&self.path, e))?;
        debug!(path = %self.path.display(), table = entry.table, "debug entry written");
        Ok(())
    }

    /// [`append`](Self::append), swallowing failures.
    pub fn record(&self, entry: &DebugEntry<'_>) {
        if let Err(e) = self.append(entry) {
            warn!(error = %e, table = entry.table, "could not write debug log entry");
        }
    }
}
